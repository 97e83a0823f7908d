//! Knowledge-management search adapter
//!
//! HTTP client behind the [`answerflow_core::KnowledgeSearch`] contract.
//! The KM backend ranks documents against the corrected transcript and
//! the validation keywords.

pub mod client;

pub use client::HttpKnowledgeSearch;

use thiserror::Error;

/// KM client errors
#[derive(Error, Debug)]
pub enum KmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for KmError {
    fn from(err: reqwest::Error) -> Self {
        KmError::Network(err.to_string())
    }
}

impl From<KmError> for answerflow_core::Error {
    fn from(err: KmError) -> Self {
        answerflow_core::Error::Km(err.to_string())
    }
}
