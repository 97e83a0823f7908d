//! Transcript validation adapter
//!
//! The validator is an external service that cross-checks a transcript
//! (optionally against the captured audio) and returns a corrected
//! transcript plus retrieval keywords. This crate provides the HTTP
//! client behind the [`answerflow_core::TranscriptValidator`] contract;
//! the identity fallback used when validation fails or is skipped lives
//! on [`answerflow_core::ValidationOutcome`].

pub mod client;

pub use client::HttpValidator;

use thiserror::Error;

/// Validator client errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ValidationError {
    fn from(err: reqwest::Error) -> Self {
        ValidationError::Network(err.to_string())
    }
}

impl From<ValidationError> for answerflow_core::Error {
    fn from(err: ValidationError) -> Self {
        answerflow_core::Error::Validator(err.to_string())
    }
}
