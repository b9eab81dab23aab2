//! Groq chat-completions client (OpenAI-compatible wire format).

use std::time::Duration;

use async_trait::async_trait;
use cf_protocol::{ChatRequest, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{ApiKeySource, BackendError, ModelClient};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Groq API client.
pub struct GroqClient {
    key: ApiKeySource,
    base_url: String,
    model: String,
    http: Client,
}

/// Build an HTTP client with appropriate timeouts and connection limits.
fn build_http_client(request_timeout: Duration) -> Result<Client, BackendError> {
    let client = Client::builder()
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()?;
    Ok(client)
}

impl GroqClient {
    /// Create a client against the default endpoint and model.
    pub fn new(key: ApiKeySource) -> Result<Self, BackendError> {
        Self::with_model(key, DEFAULT_BASE_URL, DEFAULT_MODEL, Duration::from_secs(120))
    }

    /// Create a client with a custom endpoint, model, and request timeout.
    pub fn with_model(
        key: ApiKeySource,
        base_url: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            key,
            base_url: base_url.into(),
            model: model.into(),
            http: build_http_client(request_timeout)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for GroqClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let api_key = self.key.resolve().await?;
        let body = build_api_request(&self.model, request);

        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            "sending chat completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("{status}: {body}")));
        }

        let resp: ApiResponse = response.json().await?;
        extract_reply(resp)
    }
}

fn build_api_request(model: &str, request: &ChatRequest) -> ApiRequest {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ApiMessage {
        role: Role::System.as_str().to_string(),
        content: request.system.clone(),
    });
    for turn in &request.history {
        messages.push(ApiMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        });
    }
    messages.push(ApiMessage {
        role: Role::User.as_str().to_string(),
        content: request.prompt.clone(),
    });

    ApiRequest {
        model: model.to_string(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn extract_reply(resp: ApiResponse) -> Result<String, BackendError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| BackendError::Api("no text content in response".to_string()))
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}
