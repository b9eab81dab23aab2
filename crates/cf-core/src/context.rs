//! Persisted short-term memory: recent chat turns and executed commands.
//!
//! The whole record is read and rewritten on every access. A missing or
//! malformed file reads as an empty record.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use cf_protocol::{ChatTurn, Role};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ContextConfig;
use crate::error::CoreError;

/// One executed command, kept for the audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandRecord {
    pub user_query: String,
    pub command: String,
    pub explanation: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// On-disk layout. Unknown top-level keys are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextRecord {
    pub messages: Vec<CommandRecord>,
    pub chat_history: Vec<ChatTurn>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct ContextStore {
    path: PathBuf,
    max_chat_turns: usize,
    max_command_log: usize,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>, max_chat_turns: usize, max_command_log: usize) -> Self {
        Self {
            path: path.into(),
            max_chat_turns,
            max_command_log,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(
            config.resolve_path(),
            config.max_chat_turns,
            config.max_command_log,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ContextRecord {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return ContextRecord::default(),
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed context file {}: {e}", self.path.display());
            ContextRecord::default()
        })
    }

    pub fn save(&self, record: &ContextRecord) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(record).map_err(std::io::Error::other)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn persist(&self, record: &ContextRecord) {
        if let Err(e) = self.save(record) {
            tracing::warn!("failed to save context to {}: {e}", self.path.display());
        }
    }

    /// Append a chat turn, keeping only the most recent ones. Content that
    /// looks like a command payload is not recorded.
    pub fn add_message(&self, role: Role, content: &str) {
        if looks_like_command_payload(content) {
            tracing::debug!("not recording command payload in chat history");
            return;
        }
        let mut record = self.load();
        record.chat_history.push(ChatTurn {
            role,
            content: content.to_string(),
        });
        keep_last(&mut record.chat_history, self.max_chat_turns);
        self.persist(&record);
    }

    pub fn add_command(&self, user_query: &str, command: &str, explanation: Option<&str>) {
        let mut record = self.load();
        record.messages.push(CommandRecord {
            user_query: user_query.to_string(),
            command: command.to_string(),
            explanation: explanation.map(str::to_string),
            timestamp: epoch_secs_f64(),
        });
        keep_last(&mut record.messages, self.max_command_log);
        self.persist(&record);
    }

    pub fn chat_history(&self) -> Vec<ChatTurn> {
        self.load().chat_history
    }

    pub fn recent_commands(&self) -> Vec<CommandRecord> {
        self.load().messages
    }

    /// Commands plus chat turns currently stored.
    pub fn message_count(&self) -> usize {
        let record = self.load();
        record.messages.len() + record.chat_history.len()
    }

    pub fn clear(&self) -> Result<(), CoreError> {
        self.save(&ContextRecord::default())
    }
}

fn keep_last<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        items.drain(..items.len() - max);
    }
}

fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn payload_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?s)```json\s*\{.*?\}\s*```",
            r"(?s)```\s*\{.*?\}\s*```",
            r#"(?s)\{.*?"command".*?\}"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// True when `content` is, or embeds, a structured action payload.
pub fn looks_like_command_payload(content: &str) -> bool {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return value
            .as_object()
            .is_some_and(|obj| obj.contains_key("command"));
    }
    payload_patterns().iter().any(|re| re.is_match(content))
}
