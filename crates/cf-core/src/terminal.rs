//! Reading user input: the prompt line and yes/no confirmations.

use std::collections::VecDeque;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::CoreError;

/// Source of user input.
///
/// `Ok(None)` means end of input. Ctrl-C surfaces as
/// [`CoreError::Interrupted`].
pub trait UserInput {
    /// Read one line at the main prompt.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, CoreError>;

    /// Read an answer to a question. Defaults to [`UserInput::read_line`].
    fn read_answer(&mut self, prompt: &str) -> Result<Option<String>, CoreError> {
        self.read_line(prompt)
    }

    /// Ask a yes/no question, re-asking until the answer is understood.
    /// An empty answer takes `default`; end of input is an interrupt.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, CoreError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let prompt = format!("{question} {hint}: ");
        loop {
            let answer = self.read_answer(&prompt)?.ok_or(CoreError::Interrupted)?;
            if let Some(choice) = parse_confirmation(&answer, default) {
                return Ok(choice);
            }
        }
    }
}

/// Interpret a confirmation answer. `None` for anything unrecognized.
pub fn parse_confirmation(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Interactive line editor with in-memory history.
pub struct LineEditor {
    editor: DefaultEditor,
}

impl LineEditor {
    pub fn new() -> Result<Self, CoreError> {
        let editor = DefaultEditor::new().map_err(|e| CoreError::Readline(e.to_string()))?;
        Ok(Self { editor })
    }

    fn read(&mut self, prompt: &str) -> Result<Option<String>, CoreError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) => Err(CoreError::Interrupted),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(CoreError::Readline(e.to_string())),
        }
    }
}

impl UserInput for LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, CoreError> {
        let line = self.read(prompt)?;
        if let Some(line) = &line {
            if !line.trim().is_empty() {
                let _ = self.editor.add_history_entry(line.as_str());
            }
        }
        Ok(line)
    }

    fn read_answer(&mut self, prompt: &str) -> Result<Option<String>, CoreError> {
        self.read(prompt)
    }
}

/// Replays a fixed script of lines and answers, in order. Used to drive a
/// session without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Every prompt shown so far, including confirmation questions.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl UserInput for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, CoreError> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_answers() {
        assert_eq!(parse_confirmation("y", false), Some(true));
        assert_eq!(parse_confirmation(" YES ", false), Some(true));
        assert_eq!(parse_confirmation("n", true), Some(false));
        assert_eq!(parse_confirmation("No", true), Some(false));
        assert_eq!(parse_confirmation("", true), Some(true));
        assert_eq!(parse_confirmation("  ", false), Some(false));
        assert_eq!(parse_confirmation("maybe", true), None);
    }

    #[test]
    fn scripted_lines_in_order() {
        let mut input = ScriptedInput::new(["first", "second"]);
        assert_eq!(input.read_line("> ").unwrap().as_deref(), Some("first"));
        assert_eq!(input.read_line("> ").unwrap().as_deref(), Some("second"));
        assert_eq!(input.read_line("> ").unwrap(), None);
        assert_eq!(input.prompts().len(), 3);
    }

    #[test]
    fn confirm_shows_default_hint() {
        let mut input = ScriptedInput::new(["", ""]);
        assert!(input.confirm("Execute this plan?", true).unwrap());
        assert!(!input.confirm("Run this command?", false).unwrap());
        assert_eq!(
            input.prompts(),
            ["Execute this plan? [Y/n]: ", "Run this command? [y/N]: "]
        );
    }

    #[test]
    fn confirm_reasks_on_unclear_answer() {
        let mut input = ScriptedInput::new(["sure", "what", "y"]);
        assert!(input.confirm("Run this command?", false).unwrap());
        assert_eq!(input.prompts().len(), 3);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn confirm_at_end_of_input_is_interrupt() {
        let mut input = ScriptedInput::new(Vec::<String>::new());
        assert!(matches!(
            input.confirm("Run this command?", false),
            Err(CoreError::Interrupted)
        ));
    }
}
