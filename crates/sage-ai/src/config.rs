//! Validated connection settings for the completion endpoint

use crate::error::{Error, Result};
use crate::types::GenerationParams;

/// Environment variable names read by [`ClientConfig::from_env`]
pub mod env {
    pub const ENDPOINT: &str = "SAGE_ENDPOINT";
    pub const API_VERSION: &str = "SAGE_API_VERSION";
    pub const API_KEY: &str = "SAGE_API_KEY";
    pub const MODEL: &str = "SAGE_MODEL";
    pub const MAX_TOKENS: &str = "SAGE_MAX_TOKENS";
    pub const TEMPERATURE: &str = "SAGE_TEMPERATURE";
    pub const TOP_P: &str = "SAGE_TOP_P";
    pub const PRESENCE_PENALTY: &str = "SAGE_PRESENCE_PENALTY";
    pub const FREQUENCY_PENALTY: &str = "SAGE_FREQUENCY_PENALTY";
}

/// Everything needed to talk to the endpoint. Only constructed through
/// [`ClientConfig::builder`] or [`ClientConfig::from_env`], both of which
/// validate.
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    endpoint: String,
    api_version: String,
    api_key: String,
    model: String,
    params: GenerationParams,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("params", &self.params)
            .finish()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        ClientConfigBuilder::default().merge_lookup(lookup)?.build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }
}

/// Layered builder: later `set`/`merge` calls override earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

impl ClientConfigBuilder {
    pub fn endpoint(mut self, value: impl Into<String>) -> Self {
        self.endpoint = Some(value.into());
        self
    }

    pub fn api_version(mut self, value: impl Into<String>) -> Self {
        self.api_version = Some(value.into());
        self
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn model(mut self, value: impl Into<String>) -> Self {
        self.model = Some(value.into());
        self
    }

    pub fn params(mut self, params: GenerationParams) -> Self {
        self.max_tokens = Some(params.max_tokens);
        self.temperature = Some(params.temperature);
        self.top_p = Some(params.top_p);
        self.presence_penalty = Some(params.presence_penalty);
        self.frequency_penalty = Some(params.frequency_penalty);
        self
    }

    /// Override fields with any values `lookup` knows about
    pub fn merge_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text(env::ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = text(env::API_VERSION) {
            self.api_version = Some(v);
        }
        if let Some(v) = text(env::API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = text(env::MODEL) {
            self.model = Some(v);
        }
        if let Some(v) = text(env::MAX_TOKENS) {
            self.max_tokens = Some(parse_number(env::MAX_TOKENS, &v)?);
        }
        if let Some(v) = text(env::TEMPERATURE) {
            self.temperature = Some(parse_number(env::TEMPERATURE, &v)?);
        }
        if let Some(v) = text(env::TOP_P) {
            self.top_p = Some(parse_number(env::TOP_P, &v)?);
        }
        if let Some(v) = text(env::PRESENCE_PENALTY) {
            self.presence_penalty = Some(parse_number(env::PRESENCE_PENALTY, &v)?);
        }
        if let Some(v) = text(env::FREQUENCY_PENALTY) {
            self.frequency_penalty = Some(parse_number(env::FREQUENCY_PENALTY, &v)?);
        }
        Ok(self)
    }

    /// Validate and produce the final configuration
    pub fn build(self) -> Result<ClientConfig> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&self.endpoint) {
            missing.push("endpoint");
        }
        if !present(&self.api_version) {
            missing.push("api_version");
        }
        if !present(&self.api_key) {
            missing.push("api_key");
        }
        if !present(&self.model) {
            missing.push("model");
        }
        if !missing.is_empty() {
            return Err(Error::ConfigurationMissing(missing));
        }

        let defaults = GenerationParams::default();
        let params = GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            presence_penalty: self.presence_penalty.unwrap_or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.unwrap_or(defaults.frequency_penalty),
        };
        if params.max_tokens == 0 {
            return Err(Error::InvalidConfig("max_tokens must be positive".into()));
        }

        let endpoint = self.endpoint.unwrap_or_default();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        Ok(ClientConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: self.api_version.unwrap_or_default(),
            api_key: self.api_key.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            params,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} is not a number: '{}'", key, value)))
}
