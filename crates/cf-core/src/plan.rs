//! Sequential plan execution with a fail-fast policy.

use std::io::Write;
use std::path::PathBuf;

use cf_backend::ModelClient;

use crate::error::CoreError;
use crate::executor::{CommandExecutor, ExecutionResult};
use crate::prompts::truncate_chars;
use crate::response::PlanStep;
use crate::state::{directory_change_target, SessionState};
use crate::style::Console;

const PREVIEW_CHARS: usize = 100;

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    ChangedDir(PathBuf),
    Ran(ExecutionResult),
    Wrote { path: PathBuf, chars: usize },
    Read { path: PathBuf, content: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanReport {
    pub total: usize,
    /// Outcomes of the steps that ran, in order. The failing step, if any, is
    /// not included.
    pub outcomes: Vec<StepOutcome>,
    /// 1-based index of the step that stopped the plan.
    pub failed_step: Option<usize>,
}

impl PlanReport {
    pub fn completed(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// Print every step so the user can decide whether to run the plan.
pub fn render_preview<W: Write>(steps: &[PlanStep], console: &mut Console<W>) {
    let style = console.style();
    let (bold, reset) = (style.bold_start(), style.reset());

    console.info(&format!("Plan detected with {} steps:", steps.len()));
    for (i, step) in steps.iter().enumerate() {
        let n = i + 1;
        match step {
            PlanStep::Command { command, .. } => {
                console.line(&format!("  {n}. {bold}Command:{reset} {command}"));
            }
            PlanStep::WriteFile { path, .. } => {
                console.line(&format!("  {n}. {bold}Write file:{reset} {path}"));
            }
            PlanStep::ReadFile { path, .. } => {
                console.line(&format!("  {n}. {bold}Read file:{reset} {path}"));
            }
            PlanStep::Unknown { raw } => {
                console.line(&format!("  {n}. {bold}Unknown step:{reset} {raw}"));
                continue;
            }
        }
        let explanation = step.explanation().unwrap_or("No explanation");
        console.dim(&format!("     {explanation}"));
        if let PlanStep::WriteFile { content, .. } = step {
            console.dim(&format!("     Content preview: {}", content_preview(content)));
        }
    }
}

fn content_preview(content: &str) -> String {
    let head = truncate_chars(content, PREVIEW_CHARS);
    if head.len() < content.len() {
        format!("{head}...")
    } else {
        content.to_string()
    }
}

/// Run `steps` in order against the session directory. A failing command or
/// any file or directory error stops the plan; later steps never run.
pub async fn run_plan<W: Write>(
    steps: &[PlanStep],
    user_request: &str,
    state: &mut SessionState,
    executor: &CommandExecutor,
    model: &dyn ModelClient,
    console: &mut Console<W>,
) -> PlanReport {
    let total = steps.len();
    let mut report = PlanReport {
        total,
        ..Default::default()
    };

    if steps.is_empty() {
        console.error("No valid plan generated.");
        return report;
    }

    console.info(&format!("Executing {total} steps..."));
    console.blank();

    for (i, step) in steps.iter().enumerate() {
        let n = i + 1;
        match run_step(n, total, step, user_request, state, executor, model, console).await {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(message) => {
                console.error(&message);
                console.error(&format!("Step {n} failed, stopping execution."));
                report.failed_step = Some(n);
                break;
            }
        }
    }

    console.blank();
    let (bold, green, reset) = {
        let s = console.style();
        (s.bold_start(), s.green_start(), s.reset())
    };
    console.line(&format!("{bold}{green}✅ Flow completed.{reset}"));
    console.blank();
    report
}

/// Err carries the message describing why the plan must stop.
#[allow(clippy::too_many_arguments)]
async fn run_step<W: Write>(
    n: usize,
    total: usize,
    step: &PlanStep,
    user_request: &str,
    state: &mut SessionState,
    executor: &CommandExecutor,
    model: &dyn ModelClient,
    console: &mut Console<W>,
) -> Result<StepOutcome, String> {
    let header = |console: &mut Console<W>, what: &str| {
        let style = console.style();
        let (bold, cyan, reset) = (style.bold_start(), style.cyan_start(), style.reset());
        console.line(&format!("{bold}{cyan}Step {n}/{total}:{reset} {what}"));
    };

    match step {
        PlanStep::Command {
            command,
            explanation,
        } => {
            let fallback = format!("Step {n}");
            header(console, explanation.as_deref().unwrap_or(&fallback));

            if let Some(target) = directory_change_target(command) {
                return match state.change_dir(target) {
                    Ok(dir) => {
                        let dir = dir.to_path_buf();
                        console.success(&format!("Changed directory to: {}", dir.display()));
                        Ok(StepOutcome::ChangedDir(dir))
                    }
                    Err(e) => Err(format!("Error: {e}")),
                };
            }

            let result = executor
                .run(command, state.cwd(), Some(user_request), model, console)
                .await;
            if result.success() {
                Ok(StepOutcome::Ran(result))
            } else {
                Err(format!(
                    "Command exited with code {}: {}",
                    result.return_code, result.command
                ))
            }
        }
        PlanStep::WriteFile {
            path,
            content,
            explanation,
        } => {
            header(console, &format!("Writing file {path}"));
            if let Some(explanation) = explanation {
                console.dim(explanation);
            }
            let resolved = state.resolve(path);
            match write_file(&resolved, content).await {
                Ok(()) => {
                    let chars = content.chars().count();
                    console.success(&format!(
                        "✅ File {} written successfully ({chars} characters).",
                        resolved.display()
                    ));
                    console.blank();
                    Ok(StepOutcome::Wrote {
                        path: resolved,
                        chars,
                    })
                }
                Err(e) => Err(format!(
                    "❌ Failed to write file {}: {e}",
                    resolved.display()
                )),
            }
        }
        PlanStep::ReadFile { path, explanation } => {
            header(console, &format!("Reading file {path}"));
            if let Some(explanation) = explanation {
                console.dim(explanation);
            }
            let resolved = state.resolve(path);
            match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => {
                    console.success(&format!(
                        "✅ File {} read successfully ({} characters).",
                        resolved.display(),
                        content.chars().count()
                    ));
                    console.blank();
                    Ok(StepOutcome::Read {
                        path: resolved,
                        content,
                    })
                }
                Err(e) => Err(format!("❌ Failed to read file {}: {e}", resolved.display())),
            }
        }
        PlanStep::Unknown { raw } => {
            header(console, "Skipping unrecognized step.");
            console.dim(&raw.to_string());
            Ok(StepOutcome::Skipped)
        }
    }
}

async fn write_file(path: &std::path::Path, content: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
