//! Prompt text sent to the model.

use crate::config::SearchConfig;
use crate::executor::{ExecutionResult, Platform};

/// What the assistant knows about the machine it is driving.
#[derive(Debug, Clone)]
pub struct PromptEnv<'a> {
    pub cwd: &'a str,
    pub platform: Platform,
    pub shell: &'a str,
    pub search: &'a SearchConfig,
}

/// Build the primary system instruction.
pub fn build_system_prompt(env: &PromptEnv<'_>) -> String {
    let mut prompt = String::from(
        "You are Coffee, a friendly terminal assistant. You help people inspect \
         and fix their system by suggesting shell commands and running them \
         once the user confirms. Keep a warm, conversational tone and explain \
         things so that someone with no technical background can follow.\n\
         \n\
         OUTPUT FORMAT:\n\
         1. One command: reply with JSON only: \
         {\"command\": \"SHELL COMMAND\", \"explanation\": \"short explanation\"}\n\
         2. Several steps: reply with JSON only: {\"plan\": [\
         {\"command\": \"...\", \"explanation\": \"...\"}, \
         {\"write_file\": {\"path\": \"...\", \"content\": \"...\"}, \"explanation\": \"...\"}, \
         {\"read_file\": {\"path\": \"...\"}, \"explanation\": \"...\"}]}\n\
         3. Nothing left to do: reply with JSON only: \
         {\"done\": true, \"explanation\": \"what was accomplished\"}\n\
         4. Ordinary conversation: plain text, no JSON.\n\
         \n\
         RULES:\n\
         - To create files, use write_file steps inside a plan, never echo or heredocs. \
         Put the real file content in each step, not placeholders.\n\
         - Related files go in one plan, one write_file step per file.\n\
         - Use `cd` steps in a plan to move between directories.\n\
         - Prefer safe, minimal commands. Never default to anything destructive.\n\
         - Only bring up earlier messages when the user asks about them.\n\
         - When you get stdout, stderr and a return code back and no further \
         action is needed, reply with the done format.",
    );

    prompt.push_str(&format!(
        "\n\nWorking directory: {}\nPlatform: {}\nShell: {}",
        env.cwd,
        env.platform.name(),
        env.shell
    ));

    let search = env.search;
    prompt.push_str(&format!(
        "\n\nSEARCHING:\n\
         - Show at most {} results.\n\
         - Skip these directories: {}.",
        search.search_max_results,
        search.exclude_dirs.join(", ")
    ));
    if search.use_native_tools {
        prompt.push_str("\n- Use tools that ship with the platform; do not install new ones.");
    }

    prompt
}

/// Ask for a corrected command after `failed` exited non-zero.
pub fn build_troubleshoot_prompt(failed: &ExecutionResult, user_request: &str) -> String {
    format!(
        "The user wanted to: \"{user_request}\"\n\
         To do that, this command was run: `{}`\n\
         \n\
         It failed with this error:\n\
         ---\n\
         {}\n\
         ---\n\
         \n\
         Work out what went wrong and suggest a corrected command as JSON:\n\
         {{\"command\": \"CORRECTED SHELL COMMAND\", \"explanation\": \"what was wrong and how this fixes it\"}}\n\
         If there is no fix, reply in plain text explaining the problem.",
        failed.command, failed.stderr
    )
}

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You explain terminal results in plain, concise sentences. Always user-friendly, no meta labels.";

/// Ask for a one-sentence description of a command's outcome.
pub fn build_summary_prompt(
    command: &str,
    stdout: &str,
    stderr: &str,
    return_code: i32,
    user_request: Option<&str>,
    preview_chars: usize,
) -> String {
    let status = if return_code == 0 { "succeeded" } else { "failed" };
    let request = user_request.unwrap_or("No specific request provided");
    format!(
        "The user asked: \"{request}\"\n\
         The command `{command}` was run and {status}.\n\
         \n\
         STDOUT (first {preview_chars} chars):\n\
         ---\n\
         {}\n\
         ---\n\
         \n\
         STDERR (first {preview_chars} chars):\n\
         ---\n\
         {}\n\
         ---\n\
         \n\
         In one short, natural sentence, tell the user what happened as it relates \
         to their request. Do not mention AI and do not call it a summary or an \
         explanation.",
        truncate_chars(stdout, preview_chars),
        truncate_chars(stderr, preview_chars),
    )
}

/// The first `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
