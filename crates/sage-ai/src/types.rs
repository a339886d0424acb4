//! Core types for chat completion requests

use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Get a human-readable name for this role
    pub fn name(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
///
/// Assistant content is formatted markup; user and system content is the
/// literal text that was typed or configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Set on the fixed notice appended when a request fails. Notices stay
    /// local and are never sent back to the endpoint.
    #[serde(skip)]
    pub failure: bool,
}

impl Turn {
    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            failure: false,
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            failure: false,
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            failure: false,
        }
    }

    /// Create an assistant failure notice
    pub fn failure_notice(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            failure: true,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.5,
            top_p: 0.9,
            presence_penalty: 0.3,
            frequency_penalty: 0.2,
        }
    }
}

/// Request body for the streaming chat completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub model: String,
    pub stream: bool,
}

impl ChatRequest {
    /// Build a streaming request for `model` from the given turns
    pub fn new(model: impl Into<String>, messages: Vec<Turn>, params: GenerationParams) -> Self {
        Self {
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            presence_penalty: params.presence_penalty,
            frequency_penalty: params.frequency_penalty,
            model: model.into(),
            stream: true,
        }
    }
}
