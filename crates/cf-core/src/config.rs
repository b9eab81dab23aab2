use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use cf_backend::groq::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use cf_backend::{ApiKeySource, BackendError, GroqClient};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub execution: ExecutionConfig,
    pub context: ContextConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// OpenAI-compatible API root.
    pub base_url: String,
    /// Model to use.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Command to run to get the API key (e.g., "pass show groq").
    /// The command is run via `sh -c`.
    pub api_key_cmd: Option<String>,
    pub temperature: f32,
    /// Temperature for one-sentence result summaries.
    pub summary_temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            api_key_cmd: None,
            temperature: 0.2,
            summary_temperature: 0.1,
            max_tokens: 4000,
            request_timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn key_source(&self) -> ApiKeySource {
        let source = ApiKeySource::env(&self.api_key_env);
        match &self.api_key_cmd {
            Some(cmd) => source.with_command(cmd),
            None => source,
        }
    }

    pub fn build_client(&self) -> Result<GroqClient, BackendError> {
        GroqClient::with_model(
            self.key_source(),
            &self.base_url,
            &self.model,
            Duration::from_secs(self.request_timeout_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Seconds before a running command is killed.
    pub timeout_secs: u64,
    /// Interpreter for non-Windows platforms. Defaults to `sh`.
    pub shell: Option<String>,
    /// Characters of stdout/stderr included when summarizing a result.
    pub output_preview_chars: usize,
    /// Stop suggesting fixes after this many failed attempts. Unbounded if unset.
    pub max_troubleshoot_rounds: Option<u32>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            shell: None,
            output_preview_chars: 2000,
            max_troubleshoot_rounds: None,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Custom context file. Defaults to ~/.local/share/coffee/context.json.
    pub path: Option<String>,
    /// Chat turns kept for short-term memory.
    pub max_chat_turns: usize,
    /// Executed-command records kept.
    pub max_command_log: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_chat_turns: 10,
            max_command_log: 5,
        }
    }
}

impl ContextConfig {
    /// Resolve the context file path, using the configured path or the XDG default.
    pub fn resolve_path(&self) -> PathBuf {
        if let Some(ref custom) = self.path {
            return PathBuf::from(custom);
        }

        let base = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".local").join("share"));
        base.join("coffee").join("context.json")
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub search_max_results: usize,
    pub exclude_dirs: Vec<String>,
    /// Prefer the platform's built-in tools over installing new ones.
    pub use_native_tools: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_max_results: 20,
            exclude_dirs: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "venv".to_string(),
                "__pycache__".to_string(),
            ],
            use_native_tools: true,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("failed to parse {}: {e}", path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}

pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("coffee").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.backend.api_key_env, "GROQ_API_KEY");
        assert_eq!(cfg.execution.timeout_secs, 60);
        assert_eq!(cfg.execution.output_preview_chars, 2000);
        assert!(cfg.execution.max_troubleshoot_rounds.is_none());
        assert_eq!(cfg.context.max_chat_turns, 10);
        assert_eq!(cfg.context.max_command_log, 5);
    }

    #[test]
    fn parse_empty_toml() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parse_backend_config() {
        let toml_str = r#"
[backend]
model = "llama-3.3-70b-versatile"
api_key_cmd = "pass show groq"
temperature = 0.5
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.backend.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.backend.api_key_cmd.as_deref(), Some("pass show groq"));
        assert_eq!(cfg.backend.temperature, 0.5);
        // untouched fields keep their defaults
        assert_eq!(cfg.backend.max_tokens, 4000);
        assert_eq!(cfg.backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn parse_execution_config() {
        let toml_str = r#"
[execution]
timeout_secs = 5
shell = "/bin/bash"
max_troubleshoot_rounds = 3
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.execution.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.execution.shell.as_deref(), Some("/bin/bash"));
        assert_eq!(cfg.execution.max_troubleshoot_rounds, Some(3));
    }

    #[test]
    fn search_defaults() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.search_max_results, 20);
        assert!(cfg.exclude_dirs.contains(&"node_modules".to_string()));
        assert!(cfg.use_native_tools);
    }

    #[test]
    fn parse_search_config() {
        let toml_str = r#"
[search]
search_max_results = 5
exclude_dirs = ["target"]
use_native_tools = false
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.search.search_max_results, 5);
        assert_eq!(cfg.search.exclude_dirs, vec!["target"]);
        assert!(!cfg.search.use_native_tools);
    }

    #[test]
    fn key_source_carries_command() {
        let cfg = BackendConfig {
            api_key_cmd: Some("echo k".to_string()),
            ..Default::default()
        };
        let source = cfg.key_source();
        assert_eq!(source.env_var, "GROQ_API_KEY");
        assert_eq!(source.command.as_deref(), Some("echo k"));
    }

    #[test]
    fn resolve_context_path_custom() {
        let cfg = ContextConfig {
            path: Some("/custom/context.json".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_path(), PathBuf::from("/custom/context.json"));
    }

    #[test]
    fn resolve_context_path_default() {
        let path = ContextConfig::default().resolve_path();
        assert!(path.to_string_lossy().ends_with("coffee/context.json"));
    }

    #[test]
    fn load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_malformed_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[execution\ntimeout_secs = ").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn build_client_uses_configured_model() {
        let client = BackendConfig::default().build_client().unwrap();
        assert_eq!(client.model(), "llama-3.1-8b-instant");
    }
}
