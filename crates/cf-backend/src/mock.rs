//! Mock provider for testing.
//!
//! Replies from a scripted queue and records every request it receives, so
//! tests at every layer can drive the assistant without real HTTP.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use cf_protocol::ChatRequest;

use crate::client::{BackendError, ModelClient};

/// A scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// Reply with this text.
    Text { content: String },
    /// Fail the call with an API error.
    Error { message: String },
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Model client that replays queued responses in order.
///
/// Once the queue is drained every call fails with an API error.
#[derive(Debug, Default)]
pub struct MockModel {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response.
    pub fn push(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of responses not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        lock(&self.requests).push(request.clone());
        match lock(&self.responses).pop_front() {
            Some(MockResponse::Text { content }) => Ok(content),
            Some(MockResponse::Error { message }) => Err(BackendError::Api(message)),
            None => Err(BackendError::Api("mock: no response queued".to_string())),
        }
    }
}

/// Built-in reply shapes for common scenarios.
pub mod fixtures {
    use serde_json::{json, Value};

    use super::MockResponse;

    /// A single-command reply.
    pub fn command(command: &str, explanation: &str) -> MockResponse {
        MockResponse::text(json!({"command": command, "explanation": explanation}).to_string())
    }

    /// A plan reply built from raw step objects.
    pub fn plan(steps: Vec<Value>) -> MockResponse {
        MockResponse::text(json!({ "plan": steps }).to_string())
    }

    /// A completion reply.
    pub fn done(explanation: &str) -> MockResponse {
        MockResponse::text(json!({"done": true, "explanation": explanation}).to_string())
    }

    /// Step objects in the shape plans use.
    pub fn command_step(command: &str) -> Value {
        json!({"command": command, "explanation": format!("run {command}")})
    }

    pub fn write_step(path: &str, content: &str) -> Value {
        json!({"write_file": {"path": path, "content": content}, "explanation": format!("write {path}")})
    }

    pub fn read_step(path: &str) -> Value {
        json!({"read_file": {"path": path}, "explanation": format!("read {path}")})
    }
}
