//! Chat request types exchanged with model backends.

use serde::{Deserialize, Serialize};

/// Role of a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A complete request to a model backend.
///
/// The backend sends `system` first, then `history` (oldest first), then
/// `prompt` as the final user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn chat_turn_helpers() {
        let user = ChatTurn::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello");

        let assistant = ChatTurn::assistant("hi there");
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[test]
    fn chat_turn_reads_stored_shape() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "done"}"#).unwrap();
        assert_eq!(turn, ChatTurn::assistant("done"));
    }

    #[test]
    fn chat_request_builder() {
        let history = vec![ChatTurn::user("list files"), ChatTurn::assistant("ok")];
        let request = ChatRequest::new("be brief", "now hidden files")
            .with_history(history.clone())
            .with_temperature(0.2)
            .with_max_tokens(4000);

        assert_eq!(request.system, "be brief");
        assert_eq!(request.prompt, "now hidden files");
        assert_eq!(request.history, history);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(4000));
    }

    #[test]
    fn chat_request_defaults_leave_sampling_unset() {
        let request = ChatRequest::new("sys", "hi");
        assert!(request.history.is_empty());
        assert!(request.temperature.is_none());
        assert!(request.max_tokens.is_none());
    }
}
