//! Configuration file support

use sage_ai::config::ClientConfigBuilder;
use sage_ai::ClientConfig;
use sage_chat::ChatConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for sage.
///
/// Every field is optional; environment variables override whatever is set
/// here and command-line flags override both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion endpoint URL
    pub endpoint: Option<String>,
    /// Value of the `api-version` query parameter
    pub api_version: Option<String>,
    /// Bearer credential (prefer the SAGE_API_KEY environment variable)
    pub api_key: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    /// Instructions inserted as the first turn of every conversation
    pub system_prompt: Option<String>,
    /// Deadline for one request, streaming included
    pub request_timeout_secs: Option<u64>,
    /// Automatic retries after a failed request
    pub max_retries: Option<u32>,
    /// Fixed wait before each automatic retry
    pub retry_delay_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sage")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SAGE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`; a missing or broken file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the example config if no file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Seed a client builder with the file's endpoint settings
    pub fn client_builder(&self) -> ClientConfigBuilder {
        ClientConfigBuilder {
            endpoint: self.endpoint.clone(),
            api_version: self.api_version.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }

    /// Controller settings around a validated client config
    pub fn chat_config(&self, client: ClientConfig) -> ChatConfig {
        let mut config = ChatConfig::new(client);
        config.system_prompt = self
            .system_prompt
            .clone()
            .filter(|prompt| !prompt.trim().is_empty());
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = self.max_retries {
            config.retry.max_retries = retries;
        }
        if let Some(secs) = self.retry_delay_secs {
            config.retry.delay = Duration::from_secs(secs);
        }
        config
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# sage configuration file
# Place at ~/.config/sage/config.toml (Linux) or set SAGE_CONFIG_PATH.
# Environment variables (SAGE_ENDPOINT, SAGE_API_KEY, ...) override these.

# Completion endpoint and API version
# endpoint = "https://example.services.ai.azure.com/models/chat/completions"
# api_version = "2024-05-01-preview"

# Model identifier
# model = "DeepSeek-V3"

# API key (prefer the SAGE_API_KEY environment variable)
# api_key = "..."

# Generation parameters
max_tokens = 2048
temperature = 0.5
top_p = 0.9
presence_penalty = 0.3
frequency_penalty = 0.2

# Optional instructions sent as the first turn of each conversation
# system_prompt = "You are a helpful assistant."

# Request deadline and automatic retries
request_timeout_secs = 30
max_retries = 2
retry_delay_secs = 2
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_ai::config::env;
    use std::collections::HashMap;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.max_retries, Some(2));
        assert!(config.endpoint.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_unknown_and_missing_keys() {
        let config = Config::parse("model = \"m\"\nshiny = true\n").unwrap();
        assert_eq!(config.model.as_deref(), Some("m"));
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(Path::new("/definitely/not/here/config.toml"));
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = Config::parse(
            r#"
endpoint = "https://file.example/chat"
api_version = "v1"
api_key = "file-key"
model = "file-model"
temperature = 0.1
"#,
        )
        .unwrap();

        let vars: HashMap<&str, &str> =
            HashMap::from([(env::MODEL, "env-model"), (env::TOP_P, "0.5")]);
        let client = file
            .client_builder()
            .merge_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(client.endpoint(), "https://file.example/chat");
        assert_eq!(client.model(), "env-model");
        assert_eq!(client.params().temperature, 0.1);
        assert_eq!(client.params().top_p, 0.5);
    }

    #[test]
    fn test_chat_config_from_file() {
        let file = Config::parse(
            r#"
system_prompt = "be brief"
request_timeout_secs = 10
max_retries = 0
retry_delay_secs = 5
"#,
        )
        .unwrap();
        let client = ClientConfig::builder()
            .endpoint("https://x.example/chat")
            .api_version("v")
            .api_key("k")
            .model("m")
            .build()
            .unwrap();

        let chat = file.chat_config(client);
        assert_eq!(chat.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(chat.request_timeout, Duration::from_secs(10));
        assert_eq!(chat.retry.max_retries, 0);
        assert_eq!(chat.retry.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_chat_config_defaults() {
        let client = ClientConfig::builder()
            .endpoint("https://x.example/chat")
            .api_version("v")
            .api_key("k")
            .model("m")
            .build()
            .unwrap();

        let chat = Config::default().chat_config(client);
        assert!(chat.system_prompt.is_none());
        assert_eq!(chat.request_timeout, Duration::from_secs(30));
        assert_eq!(chat.retry.max_retries, 2);
        assert_eq!(chat.retry.delay, Duration::from_secs(2));
    }
}
