//! # robogen-agent
//!
//! Code generation side of the robogen pipeline.
//!
//! ## Key Types
//!
//! - [`Generator`] - capability that turns a prompt (plus optional history) into a script
//! - [`LlmGenerator`] - generator backed by a chat-completions model
//! - [`ChatBackend`] / [`ChatClient`] - transport to an OpenAI-compatible endpoint
//! - [`validate_script`] - local static checks for Reachy 2 scripts

mod chat;
mod extract;
mod generator;
mod prompts;
mod traits;
mod validate;

pub use chat::{ChatClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use extract::{extract_code_and_explanation, ExtractedCode};
pub use generator::{LlmGenerator, DEFAULT_HISTORY_WINDOW};
pub use prompts::GeneratorPrompts;
pub use traits::{
    AgentError, ChatBackend, ChatMessage, ChatRequest, Generation, Generator, ModelSettings,
    Role,
};
pub use validate::{validate_script, ScriptValidation};
