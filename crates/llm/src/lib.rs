//! LLM integration for answer generation
//!
//! Features:
//! - OpenAI-compatible chat-completions backend
//! - Groq routing via the `groq/` model prefix
//! - Streaming token generation over SSE
//! - Prompt assembly from localisation, history, and retrieved documents

pub mod backend;
pub mod prompt;

pub use backend::{ChatBackend, GeneratorConfig};
pub use prompt::PromptBuilder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for answerflow_core::Error {
    fn from(err: LlmError) -> Self {
        answerflow_core::Error::Llm(err.to_string())
    }
}
