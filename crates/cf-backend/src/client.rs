//! The model client seam shared by every backend.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use cf_protocol::ChatRequest;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("{0} not set.")]
    MissingApiKey(String),
}

/// Sends a prompt plus trailing history to a completion endpoint and
/// returns the raw reply text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError>;
}

/// Where the API credential comes from.
///
/// Resolved on every call so a missing key is reported per attempt rather
/// than once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeySource {
    /// Environment variable holding the key.
    pub env_var: String,
    /// Optional command whose stdout is the key. Run via `sh -c`.
    pub command: Option<String>,
}

impl ApiKeySource {
    pub fn env(var: impl Into<String>) -> Self {
        Self {
            env_var: var.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Resolve the key from the command first, then the environment.
    ///
    /// The command runs on the async runtime, so a slow key helper does not
    /// block other tasks such as the interrupt handler.
    pub async fn resolve(&self) -> Result<String, BackendError> {
        if let Some(cmd) = &self.command {
            match run_key_command(cmd).await {
                Ok(Some(key)) => return Ok(key),
                Ok(None) => {}
                Err(e) => tracing::warn!("api key command failed: {e}"),
            }
        }

        match std::env::var(&self.env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(BackendError::MissingApiKey(self.env_var.clone())),
        }
    }
}

async fn run_key_command(cmd: &str) -> io::Result<Option<String>> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        return Ok(None);
    }
    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!key.is_empty()).then_some(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_from_command() {
        let source = ApiKeySource::env("CF_TEST_UNSET_KEY_A").with_command("echo test_key_123");
        assert_eq!(source.resolve().await.unwrap(), "test_key_123");
    }

    #[tokio::test]
    async fn failing_command_falls_back_to_env() {
        let source = ApiKeySource::env("CF_TEST_UNSET_KEY_B").with_command("exit 1");
        let err = source.resolve().await.unwrap_err();
        assert!(matches!(err, BackendError::MissingApiKey(ref var) if var == "CF_TEST_UNSET_KEY_B"));
    }

    #[tokio::test]
    async fn empty_command_output_falls_back_to_env() {
        let source = ApiKeySource::env("CF_TEST_UNSET_KEY_C").with_command("printf ''");
        assert!(source.resolve().await.is_err());
    }

    #[tokio::test]
    async fn missing_key_message_names_variable() {
        let err = ApiKeySource::env("CF_TEST_UNSET_KEY_D").resolve().await.unwrap_err();
        assert_eq!(err.to_string(), "CF_TEST_UNSET_KEY_D not set.");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_key_command_does_not_block_runtime() {
        let source = ApiKeySource::env("CF_TEST_UNSET_KEY_E").with_command("sleep 1; echo late_key");
        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..5 {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                ticks += 1;
            }
            ticks
        });

        assert_eq!(source.resolve().await.unwrap(), "late_key");
        assert!(ticker.is_finished());
        assert_eq!(ticker.await.unwrap(), 5);
    }
}
