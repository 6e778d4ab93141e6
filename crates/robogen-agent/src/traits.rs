use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::ScriptValidation;

/// Errors that can occur while talking to a language model
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Agent configuration error: {0}")]
    Config(String),
}

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A request for one chat completion
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the backend for a JSON object response
    pub json_response: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.2,
            max_tokens: 4000,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Transport to a chat-completions language model
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Human-readable backend name (e.g., "openai")
    fn name(&self) -> &str;

    /// Send the request and return the assistant's text
    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError>;
}

/// Model settings for one role (generator or evaluator)
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo".to_string(),
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Output of one generation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Extracted code (empty when the response held no code block)
    pub code: String,
    /// Prose surrounding the code block
    pub explanation: String,
    /// Unprocessed model response
    pub raw_response: String,
    /// Static Reachy 2 checks over `code`
    #[serde(default)]
    pub validation: ScriptValidation,
}

impl Generation {
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// Produces robot scripts from natural-language prompts
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name of the generator
    fn name(&self) -> &str;

    /// Generate code for `prompt`, folding in prior turns from `history` (oldest first)
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<Generation, AgentError>;
}
