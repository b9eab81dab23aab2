//! Running one shell command: spawn, capture, time out, summarize.

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use cf_backend::ModelClient;
use cf_protocol::ChatRequest;
use tokio::process::Command;

use crate::config::{BackendConfig, ExecutionConfig};
use crate::prompts::{build_summary_prompt, SUMMARY_SYSTEM_PROMPT};
use crate::style::Console;

pub const TIMEOUT_MESSAGE: &str = "The command took too long and was stopped.";
pub const NO_OUTPUT_SUMMARY: &str = "The command finished with no visible output.";

/// Which interpreter family commands are written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Unix if cfg!(unix) => std::env::consts::OS,
            Platform::Unix => "unix",
        }
    }

    fn default_shell(&self) -> &'static str {
        match self {
            Platform::Windows => "powershell",
            Platform::Unix => "sh",
        }
    }

    fn command_flag(&self) -> &'static str {
        match self {
            Platform::Windows => "-Command",
            Platform::Unix => "-c",
        }
    }
}

/// Rewrite Unix idioms that have no PowerShell equivalent. Only the
/// single-argument `touch FILE` is handled.
pub fn rewrite_for_platform(command: &str, platform: Platform) -> Cow<'_, str> {
    if platform != Platform::Windows {
        return Cow::Borrowed(command);
    }
    match command.strip_prefix("touch ").map(str::trim) {
        Some(file) if !file.is_empty() && !file.contains(char::is_whitespace) => {
            Cow::Owned(format!("New-Item {file} -ItemType File"))
        }
        _ => Cow::Borrowed(command),
    }
}

/// The outcome of one command. `return_code` is -1 on timeout or when the
/// interpreter could not be launched.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub summary: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.return_code == 0
    }
}

enum Capture {
    Finished {
        stdout: String,
        stderr: String,
        code: i32,
    },
    TimedOut,
    LaunchFailed(io::Error),
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    platform: Platform,
    shell: String,
    timeout: Duration,
    preview_chars: usize,
    summary_temperature: f32,
}

impl CommandExecutor {
    pub fn new(platform: Platform, execution: &ExecutionConfig, backend: &BackendConfig) -> Self {
        let shell = match (platform, &execution.shell) {
            (Platform::Unix, Some(shell)) => shell.clone(),
            _ => platform.default_shell().to_string(),
        };
        Self {
            platform,
            shell,
            timeout: execution.timeout(),
            preview_chars: execution.output_preview_chars,
            summary_temperature: backend.summary_temperature,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `command` in `cwd`, printing the command, its output and a
    /// summary. Never fails: every failure becomes part of the result.
    pub async fn run<W: Write>(
        &self,
        command: &str,
        cwd: &Path,
        user_request: Option<&str>,
        model: &dyn ModelClient,
        console: &mut Console<W>,
    ) -> ExecutionResult {
        let command = rewrite_for_platform(command, self.platform).into_owned();
        let cyan = console.style().cyan_start();
        console.labeled(cyan, "Running:", &command);

        match self.capture(&command, cwd).await {
            Capture::Finished {
                stdout,
                stderr,
                code,
            } => {
                if !stdout.is_empty() {
                    let green = console.style().green_start();
                    console.block(green, "Output:", stdout.trim());
                }
                if !stderr.is_empty() {
                    let red = console.style().red_start();
                    console.block(red, "Error:", stderr.trim());
                }

                let summary = self
                    .summarize(model, &command, &stdout, &stderr, code, user_request)
                    .await;
                console.blank();
                console.warn(&summary);
                console.blank();

                ExecutionResult {
                    command,
                    stdout,
                    stderr,
                    return_code: code,
                    summary,
                }
            }
            Capture::TimedOut => {
                console.error(TIMEOUT_MESSAGE);
                ExecutionResult {
                    command,
                    stdout: String::new(),
                    stderr: TIMEOUT_MESSAGE.to_string(),
                    return_code: -1,
                    summary: TIMEOUT_MESSAGE.to_string(),
                }
            }
            Capture::LaunchFailed(e) => {
                console.error(&format!("Failed to execute: {e}"));
                ExecutionResult {
                    command,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    return_code: -1,
                    summary: e.to_string(),
                }
            }
        }
    }

    async fn capture(&self, command: &str, cwd: &Path) -> Capture {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(self.platform.command_flag())
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Capture::LaunchFailed(e),
        };
        let mut group = ProcessGroup::new(child.id());

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                group.disarm();
                Capture::Finished {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    code: output.status.code().unwrap_or(-1),
                }
            }
            Ok(Err(e)) => Capture::LaunchFailed(e),
            Err(_) => {
                tracing::debug!(command, timeout = ?self.timeout, "command timed out");
                Capture::TimedOut
            }
        }
    }

    /// One plain sentence describing the outcome. Output-less commands are
    /// described without a model call; a failed call yields a diagnostic.
    pub async fn summarize(
        &self,
        model: &dyn ModelClient,
        command: &str,
        stdout: &str,
        stderr: &str,
        return_code: i32,
        user_request: Option<&str>,
    ) -> String {
        if stdout.is_empty() && stderr.is_empty() {
            return NO_OUTPUT_SUMMARY.to_string();
        }

        let prompt = build_summary_prompt(
            command,
            stdout,
            stderr,
            return_code,
            user_request,
            self.preview_chars,
        );
        let request = ChatRequest::new(SUMMARY_SYSTEM_PROMPT, prompt)
            .with_temperature(self.summary_temperature);

        match model.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => format!("(Could not generate result: {e})"),
        }
    }
}

/// Kills the child's whole process group when dropped while armed, so
/// grandchildren of a timed-out or cancelled command do not linger.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // SAFETY: killpg has no memory-safety preconditions. The group leader is
    // not yet reaped, so the id still names our group.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    tracing::debug!(pgid, rc, "killed process group");
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
