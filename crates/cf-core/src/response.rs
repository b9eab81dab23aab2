//! Interpretation of free-text model replies.
//!
//! A reply may be bare JSON, JSON inside a fenced block, or JSON buried in
//! prose. Extraction strategies are tried in a fixed order and the first one
//! that yields a JSON object wins; the object is then classified into an
//! [`Action`]. Anything that yields no object is plain chat.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// A structured payload pulled out of a reply.
pub type Payload = Map<String, Value>;

/// Top-level keys that mark an object as an action payload.
const RECOGNIZED_KEYS: [&str; 3] = ["plan", "command", "done"];

/// The parsed intent of one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RunCommand {
        command: String,
        explanation: Option<String>,
    },
    Plan {
        steps: Vec<PlanStep>,
    },
    Done {
        explanation: Option<String>,
    },
    PlainText {
        text: String,
    },
    /// Structured, but not a shape we act on.
    Unrecognized {
        raw: String,
        payload: Value,
    },
}

/// One step of a plan. Order within a plan is execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Command {
        command: String,
        explanation: Option<String>,
    },
    WriteFile {
        path: String,
        content: String,
        explanation: Option<String>,
    },
    ReadFile {
        path: String,
        explanation: Option<String>,
    },
    /// A step object with none of the known shapes; shown, never run.
    Unknown {
        raw: Value,
    },
}

impl PlanStep {
    pub fn explanation(&self) -> Option<&str> {
        match self {
            PlanStep::Command { explanation, .. }
            | PlanStep::WriteFile { explanation, .. }
            | PlanStep::ReadFile { explanation, .. } => explanation.as_deref(),
            PlanStep::Unknown { .. } => None,
        }
    }

    fn from_value(value: &Value) -> PlanStep {
        let unknown = || PlanStep::Unknown { raw: value.clone() };
        let Some(obj) = value.as_object() else {
            return unknown();
        };
        let explanation = explanation_of(obj);

        if let Some(command) = obj.get("command") {
            return match command.as_str() {
                Some(command) => PlanStep::Command {
                    command: command.to_string(),
                    explanation,
                },
                None => unknown(),
            };
        }

        if let Some(write) = obj.get("write_file") {
            let path = write.get("path").and_then(Value::as_str);
            let content = match write.get("content") {
                None | Some(Value::Null) => Some(""),
                Some(v) => v.as_str(),
            };
            return match (path, content) {
                (Some(path), Some(content)) => PlanStep::WriteFile {
                    path: path.to_string(),
                    content: content.to_string(),
                    explanation,
                },
                _ => unknown(),
            };
        }

        if let Some(read) = obj.get("read_file") {
            return match read.get("path").and_then(Value::as_str) {
                Some(path) => PlanStep::ReadFile {
                    path: path.to_string(),
                    explanation,
                },
                None => unknown(),
            };
        }

        unknown()
    }
}

impl Action {
    /// Parse a raw reply. Never fails: unparseable text is `PlainText`.
    pub fn parse(text: &str) -> Action {
        match extract_payload(text) {
            Some(payload) => Action::from_payload(text, payload),
            None => Action::PlainText {
                text: text.to_string(),
            },
        }
    }

    /// Classify a payload. `plan` wins over `command`, which wins over `done`.
    pub fn from_payload(raw: &str, payload: Payload) -> Action {
        let unrecognized = |payload: Payload| Action::Unrecognized {
            raw: raw.to_string(),
            payload: Value::Object(payload),
        };

        if let Some(plan) = payload.get("plan") {
            return match plan.as_array() {
                Some(steps) => Action::Plan {
                    steps: steps.iter().map(PlanStep::from_value).collect(),
                },
                None => unrecognized(payload),
            };
        }

        if let Some(command) = payload.get("command") {
            return match command.as_str() {
                Some(command) => Action::RunCommand {
                    command: command.to_string(),
                    explanation: explanation_of(&payload),
                },
                None => unrecognized(payload),
            };
        }

        if payload.get("done") == Some(&Value::Bool(true)) {
            return Action::Done {
                explanation: explanation_of(&payload),
            };
        }

        unrecognized(payload)
    }
}

fn explanation_of(obj: &Payload) -> Option<String> {
    obj.get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pull a JSON object out of `text`, trying each strategy in order:
/// the whole text, a ```json fence, an unlabeled fence, then the first
/// balanced `{...}` anywhere that carries a recognized key.
pub fn extract_payload(text: &str) -> Option<Payload> {
    const STRATEGIES: [fn(&str) -> Option<Payload>; 4] =
        [whole_text, labeled_fence, bare_fence, embedded_object];

    if text.trim().is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|strategy| strategy(text))
}

fn parse_object(s: &str) -> Option<Payload> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn whole_text(text: &str) -> Option<Payload> {
    parse_object(text)
}

fn labeled_fence(text: &str) -> Option<Payload> {
    fenced_blocks(text)
        .into_iter()
        .filter(|block| block.label.eq_ignore_ascii_case("json"))
        .find_map(|block| parse_object(block.content))
}

fn bare_fence(text: &str) -> Option<Payload> {
    fenced_blocks(text)
        .into_iter()
        .filter(|block| block.label.is_empty())
        .find_map(|block| parse_object(block.content))
}

fn embedded_object(text: &str) -> Option<Payload> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| {
            let end = balanced_end(text, start)?;
            let obj = parse_object(&text[start..=end])?;
            RECOGNIZED_KEYS
                .iter()
                .any(|key| obj.contains_key(*key))
                .then_some(obj)
        })
}

/// A ``` fenced block: its info-string label and the text inside.
#[derive(Debug, PartialEq)]
struct FencedBlock<'a> {
    label: &'a str,
    content: &'a str,
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```([\w+\-]*)(.*?)```").ok())
        .as_ref()
}

/// Split `text` into its fenced blocks, pairing each opening fence with the
/// next closing fence. An unterminated fence is ignored.
fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let Some(fence) = fence_pattern() else {
        return Vec::new();
    };
    fence
        .captures_iter(text)
        .filter_map(|caps| {
            Some(FencedBlock {
                label: caps.get(1)?.as_str(),
                content: caps.get(2)?.as_str().trim(),
            })
        })
        .collect()
}

/// Byte index of the `}` closing the object opened at `start`, honoring
/// string literals and escapes.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LS: &str = r#"{"command": "ls -la", "explanation": "list files"}"#;

    fn ls_action() -> Action {
        Action::RunCommand {
            command: "ls -la".to_string(),
            explanation: Some("list files".to_string()),
        }
    }

    #[test]
    fn bare_json_reply() {
        assert_eq!(Action::parse(LS), ls_action());
    }

    #[test]
    fn same_payload_regardless_of_wrapping() {
        let wrappings = [
            LS.to_string(),
            format!("  {LS}\n"),
            format!("```json\n{LS}\n```"),
            format!("```JSON\n{LS}\n```"),
            format!("```\n{LS}\n```"),
            format!("Sure! Here you go:\n```json\n{LS}\n```\nLet me know."),
            format!("Sure! Here you go:\n```\n{LS}\n```\nAnything else?"),
            format!("I'll run this for you: {LS} and report back."),
        ];
        let expected = extract_payload(LS).unwrap();
        for text in wrappings {
            assert_eq!(
                extract_payload(&text).as_ref(),
                Some(&expected),
                "failed for: {text}"
            );
            assert_eq!(Action::parse(&text), ls_action());
        }
    }

    #[test]
    fn labeled_fence_preferred_over_bare_fence() {
        let text = "```\n{\"done\": true}\n```\n```json\n{\"command\": \"pwd\"}\n```";
        let payload = extract_payload(text).unwrap();
        assert_eq!(payload.get("command"), Some(&json!("pwd")));
    }

    #[test]
    fn non_json_fence_is_skipped() {
        let text = "Run this:\n```bash\nls\n```\nor as JSON:\n```\n{\"command\": \"ls\"}\n```";
        assert_eq!(
            Action::parse(text),
            Action::RunCommand {
                command: "ls".to_string(),
                explanation: None
            }
        );
    }

    #[test]
    fn plan_wins_over_command() {
        let text = r#"{"command": "rm -rf build", "plan": [{"command": "make"}]}"#;
        match Action::parse(text) {
            Action::Plan { steps } => assert_eq!(steps.len(), 1),
            other => panic!("expected plan, got {other:?}"),
        }
    }

    #[test]
    fn command_wins_over_done() {
        let text = r#"{"done": true, "command": "ls"}"#;
        assert!(matches!(Action::parse(text), Action::RunCommand { .. }));
    }

    #[test]
    fn done_reply() {
        let text = r#"{"done": true, "explanation": "All files created."}"#;
        assert_eq!(
            Action::parse(text),
            Action::Done {
                explanation: Some("All files created.".to_string())
            }
        );
    }

    #[test]
    fn done_false_is_unrecognized() {
        let text = r#"{"done": false, "explanation": "still going"}"#;
        assert!(matches!(Action::parse(text), Action::Unrecognized { .. }));
    }

    #[test]
    fn other_object_is_unrecognized() {
        let text = r#"{"answer": 42}"#;
        match Action::parse(text) {
            Action::Unrecognized { raw, payload } => {
                assert_eq!(raw, text);
                assert_eq!(payload["answer"], 42);
            }
            other => panic!("expected unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn non_string_command_is_unrecognized() {
        assert!(matches!(
            Action::parse(r#"{"command": ["ls"]}"#),
            Action::Unrecognized { .. }
        ));
    }

    #[test]
    fn non_array_plan_is_unrecognized() {
        assert!(matches!(
            Action::parse(r#"{"plan": "do stuff"}"#),
            Action::Unrecognized { .. }
        ));
    }

    #[test]
    fn plain_prose_is_plain_text() {
        let text = "Hello! How can I help you today?";
        assert!(extract_payload(text).is_none());
        assert_eq!(
            Action::parse(text),
            Action::PlainText {
                text: text.to_string()
            }
        );
    }

    #[test]
    fn failed_strategies_yield_none() {
        let cases = [
            "",
            "   ",
            "use {braces} freely",
            "```json\n{not valid}\n```",
            "{\"command\": \"ls\"",
            "[1, 2, 3]",
            "42",
            "\"just a string\"",
        ];
        for text in cases {
            assert!(extract_payload(text).is_none(), "should fail: {text:?}");
        }
    }

    #[test]
    fn embedded_object_needs_recognized_key() {
        let text = r#"Config looks like {"name": "x"} and nothing else."#;
        assert!(extract_payload(text).is_none());
    }

    #[test]
    fn embedded_object_skips_unrelated_objects() {
        let text = r#"Given {"name": "x"}, do {"command": "echo hi"} now."#;
        let payload = extract_payload(text).unwrap();
        assert_eq!(payload.get("command"), Some(&json!("echo hi")));
    }

    #[test]
    fn embedded_object_finds_nested_action() {
        let text = r#"result: {"response": {"done": true}} ok"#;
        let payload = extract_payload(text).unwrap();
        assert_eq!(payload.get("done"), Some(&json!(true)));
    }

    #[test]
    fn embedded_object_handles_braces_in_strings() {
        let text = r#"Try {"command": "awk '{print $1}' file", "explanation": "first col"} please"#;
        assert_eq!(
            Action::parse(text),
            Action::RunCommand {
                command: "awk '{print $1}' file".to_string(),
                explanation: Some("first col".to_string()),
            }
        );
    }

    #[test]
    fn embedded_object_handles_escaped_quotes() {
        let text = r#"ok {"command": "echo \"}\"", "explanation": "quote"} done"#;
        assert_eq!(
            Action::parse(text),
            Action::RunCommand {
                command: "echo \"}\"".to_string(),
                explanation: Some("quote".to_string()),
            }
        );
    }

    #[test]
    fn empty_explanation_is_none() {
        let text = r#"{"command": "ls", "explanation": "  "}"#;
        assert_eq!(
            Action::parse(text),
            Action::RunCommand {
                command: "ls".to_string(),
                explanation: None
            }
        );
    }

    #[test]
    fn plan_steps_in_order() {
        let text = json!({"plan": [
            {"command": "mkdir site", "explanation": "make dir"},
            {"write_file": {"path": "site/index.html", "content": "<h1>Hi</h1>"}, "explanation": "page"},
            {"read_file": {"path": "site/index.html"}},
            {"launch": "rocket"}
        ]})
        .to_string();

        let Action::Plan { steps } = Action::parse(&text) else {
            panic!("expected plan");
        };
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps[0],
            PlanStep::Command {
                command: "mkdir site".to_string(),
                explanation: Some("make dir".to_string())
            }
        );
        assert_eq!(
            steps[1],
            PlanStep::WriteFile {
                path: "site/index.html".to_string(),
                content: "<h1>Hi</h1>".to_string(),
                explanation: Some("page".to_string())
            }
        );
        assert_eq!(
            steps[2],
            PlanStep::ReadFile {
                path: "site/index.html".to_string(),
                explanation: None
            }
        );
        assert!(matches!(steps[3], PlanStep::Unknown { .. }));
    }

    #[test]
    fn write_step_without_content_writes_empty_file() {
        let step = PlanStep::from_value(&json!({"write_file": {"path": "empty.txt"}}));
        assert_eq!(
            step,
            PlanStep::WriteFile {
                path: "empty.txt".to_string(),
                content: String::new(),
                explanation: None
            }
        );
    }

    #[test]
    fn write_step_without_path_is_unknown() {
        let step = PlanStep::from_value(&json!({"write_file": {"content": "x"}}));
        assert!(matches!(step, PlanStep::Unknown { .. }));
    }

    #[test]
    fn non_object_step_is_unknown() {
        assert!(matches!(
            PlanStep::from_value(&json!("ls")),
            PlanStep::Unknown { .. }
        ));
    }

    #[test]
    fn write_content_is_verbatim() {
        let content = "line1\n  indented\n\ttab\n";
        let text = json!({"plan": [{"write_file": {"path": "f", "content": content}}]}).to_string();
        let Action::Plan { steps } = Action::parse(&text) else {
            panic!("expected plan");
        };
        assert!(matches!(&steps[0], PlanStep::WriteFile { content: c, .. } if c == content));
    }

    #[test]
    fn fenced_blocks_pair_fences_in_order() {
        let text = "a\n```bash\nls\n```\nb\n```\n{}\n```\n```json";
        let blocks = fenced_blocks(text);
        assert_eq!(
            blocks,
            vec![
                FencedBlock {
                    label: "bash",
                    content: "ls"
                },
                FencedBlock {
                    label: "",
                    content: "{}"
                },
            ]
        );
    }

    #[test]
    fn fence_pattern_compiles_and_keeps_labels() {
        assert!(fence_pattern().is_some());
        let blocks = fenced_blocks("```c++\nint x;\n```");
        assert_eq!(blocks[0].label, "c++");
        assert_eq!(blocks[0].content, "int x;");
    }

    #[test]
    fn single_line_labeled_fence() {
        let text = r#"```json {"command": "date"} ```"#;
        assert!(matches!(
            Action::parse(text),
            Action::RunCommand { ref command, .. } if command == "date"
        ));
    }

    #[test]
    fn balanced_end_unterminated() {
        assert_eq!(balanced_end("{\"a\": {", 0), None);
        assert_eq!(balanced_end("{}", 0), Some(1));
        assert_eq!(balanced_end("x {\"a\": {}} y", 2), Some(10));
    }
}
