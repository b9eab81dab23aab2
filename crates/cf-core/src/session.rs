//! One interactive session: built-in commands, model turns, dispatch of
//! parsed replies, and the troubleshoot loop.

use std::io::Write;

use cf_backend::{BackendError, ModelClient};
use cf_protocol::{ChatRequest, Role};

use crate::config::{Config, SearchConfig};
use crate::context::ContextStore;
use crate::error::CoreError;
use crate::executor::{CommandExecutor, ExecutionResult, Platform};
use crate::plan::{render_preview, run_plan};
use crate::prompts::{build_system_prompt, build_troubleshoot_prompt, PromptEnv};
use crate::response::Action;
use crate::state::{directory_change_target, SessionState};
use crate::style::Console;
use crate::terminal::UserInput;

/// Whether the shell keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Session<M, I, W: Write> {
    model: M,
    input: I,
    console: Console<W>,
    state: SessionState,
    store: ContextStore,
    executor: CommandExecutor,
    search: SearchConfig,
    temperature: f32,
    max_tokens: u32,
    max_troubleshoot_rounds: Option<u32>,
}

impl<M, I, W> Session<M, I, W>
where
    M: ModelClient,
    I: UserInput,
    W: Write,
{
    pub fn new(
        model: M,
        input: I,
        console: Console<W>,
        state: SessionState,
        store: ContextStore,
        config: &Config,
    ) -> Self {
        Self {
            model,
            input,
            console,
            state,
            store,
            executor: CommandExecutor::new(Platform::detect(), &config.execution, &config.backend),
            search: config.search.clone(),
            temperature: config.backend.temperature,
            max_tokens: config.backend.max_tokens,
            max_troubleshoot_rounds: config.execution.max_troubleshoot_rounds,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn console(&self) -> &Console<W> {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console<W> {
        &mut self.console
    }

    /// Show the prompt and read the next line. `Ok(None)` at end of input.
    pub fn read_prompt(&mut self) -> Result<Option<String>, CoreError> {
        let prompt = format!("coffee ({})> ", self.state.display_path());
        self.input.read_line(&prompt)
    }

    /// Handle one line typed at the prompt.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow, CoreError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        match line.to_lowercase().as_str() {
            "exit" | "quit" => return Ok(Flow::Exit),
            "clear" | "cls" => {
                self.console.clear_screen();
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        if let Some(command) = line.strip_prefix('/') {
            self.run_direct(command.trim(), line).await?;
        } else if let Some(target) = directory_change_target(line) {
            self.change_dir(target);
        } else if let Some(reply) = self.ask_model(line).await {
            self.process_reply(reply, line).await?;
        }
        Ok(Flow::Continue)
    }

    /// Run a literal command, bypassing the model. Nothing is recorded and
    /// failures are not troubleshot.
    async fn run_direct(&mut self, command: &str, line: &str) -> Result<(), CoreError> {
        if command.is_empty() {
            return Ok(());
        }
        if self
            .input
            .confirm(&format!("Run command: {command}?"), false)?
        {
            self.executor
                .run(
                    command,
                    self.state.cwd(),
                    Some(line),
                    &self.model,
                    &mut self.console,
                )
                .await;
        }
        Ok(())
    }

    fn change_dir(&mut self, target: &str) {
        match self.state.change_dir(target) {
            Ok(dir) => {
                let message = format!("Changed directory to: {}", dir.display());
                self.console.success(&message);
            }
            Err(e) => self.console.error(&format!("Error: {e}")),
        }
    }

    fn system_prompt(&self) -> String {
        let cwd = self.state.cwd().display().to_string();
        build_system_prompt(&PromptEnv {
            cwd: &cwd,
            platform: self.executor.platform(),
            shell: self.executor.shell(),
            search: &self.search,
        })
    }

    /// Send `prompt` with the stored chat history. On success the prompt is
    /// recorded as a user turn; on failure the error is printed and there is
    /// no reply.
    pub async fn ask_model(&mut self, prompt: &str) -> Option<String> {
        let request = ChatRequest::new(self.system_prompt(), prompt)
            .with_history(self.store.chat_history())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        match self.model.complete(&request).await {
            Ok(reply) => {
                self.store.add_message(Role::User, prompt);
                Some(reply)
            }
            Err(e @ BackendError::MissingApiKey(_)) => {
                self.console.error(&e.to_string());
                None
            }
            Err(e) => {
                tracing::debug!("model call failed: {e:?}");
                self.console.error(&format!("Model API error: {e}"));
                None
            }
        }
    }

    /// Dispatch `reply`, then keep troubleshooting for as long as a directly
    /// run command fails and the model offers a fix.
    pub async fn process_reply(&mut self, mut reply: String, query: &str) -> Result<(), CoreError> {
        let mut rounds = 0u32;

        while let Some(failed) = self.dispatch(&reply, query).await? {
            if let Some(max) = self.max_troubleshoot_rounds {
                if rounds >= max {
                    self.console
                        .warn(&format!("Giving up after {max} troubleshooting attempts."));
                    break;
                }
            }
            rounds += 1;

            self.console.blank();
            self.console
                .warn("The command failed. Attempting to troubleshoot...");
            let prompt = build_troubleshoot_prompt(&failed, query);
            match self.ask_model(&prompt).await {
                Some(suggestion) => {
                    self.console.blank();
                    self.console.heading("I have a suggestion for a fix:");
                    reply = suggestion;
                }
                None => {
                    self.console
                        .error("Sorry, I couldn't figure out how to fix the command.");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Act on one reply. Returns the result of a directly dispatched command
    /// that failed, which is what the troubleshoot loop feeds on.
    async fn dispatch(
        &mut self,
        reply: &str,
        query: &str,
    ) -> Result<Option<ExecutionResult>, CoreError> {
        match Action::parse(reply) {
            Action::PlainText { text } => {
                self.console.warn(&text);
                self.store.add_message(Role::Assistant, &text);
                Ok(None)
            }
            Action::Unrecognized { raw, payload } => {
                self.console
                    .error(&format!("Unrecognized response format: {payload}"));
                self.console.warn(&raw);
                self.store.add_message(Role::Assistant, &raw);
                Ok(None)
            }
            Action::Done { explanation } => {
                let explanation = explanation.as_deref().unwrap_or("Task completed");
                self.console.success(&format!("✅ {explanation}"));
                self.store.add_message(Role::Assistant, explanation);
                Ok(None)
            }
            Action::Plan { steps } => {
                if steps.is_empty() {
                    self.console.error("No valid plan generated.");
                    return Ok(None);
                }
                render_preview(&steps, &mut self.console);
                self.console.blank();
                if self.input.confirm("Execute this plan?", true)? {
                    run_plan(
                        &steps,
                        query,
                        &mut self.state,
                        &self.executor,
                        &self.model,
                        &mut self.console,
                    )
                    .await;
                    self.store.add_message(
                        Role::Assistant,
                        &format!("Executed plan with {} steps for: {query}", steps.len()),
                    );
                } else {
                    self.console.warn("Plan execution cancelled.");
                }
                Ok(None)
            }
            Action::RunCommand {
                command,
                explanation,
            } => {
                if let Some(explanation) = &explanation {
                    self.console.info(explanation);
                }

                if let Some(target) = directory_change_target(&command) {
                    self.change_dir(target);
                    return Ok(None);
                }

                if !self.input.confirm("Run this command?", false)? {
                    self.console.warn("Command not executed.");
                    return Ok(None);
                }

                let result = self
                    .executor
                    .run(
                        &command,
                        self.state.cwd(),
                        Some(query),
                        &self.model,
                        &mut self.console,
                    )
                    .await;
                self.store
                    .add_command(query, &command, explanation.as_deref());
                self.store.add_message(Role::Assistant, &result.summary);

                Ok((!result.success()).then_some(result))
            }
        }
    }
}
