//! Service-wide error types

use thiserror::Error;

/// Result alias used across all crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the answer pipeline and its adapters
#[derive(Error, Debug)]
pub enum Error {
    /// The inbound request is missing required fields or malformed
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A required upstream resource could not be fetched and no cached
    /// fallback exists
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The transcript validator returned an error or timed out
    #[error("validation failed: {0}")]
    Validator(String),

    /// Knowledge-management retrieval errored
    #[error("knowledge search failed: {0}")]
    Km(String),

    /// The answer generator errored before or during streaming
    #[error("generation failed: {0}")]
    Llm(String),

    /// A single speech synthesis call failed
    #[error("speech synthesis failed: {0}")]
    Tts(String),

    /// The SSE client went away; all request-scoped work should stop
    #[error("client disconnected")]
    ClientDisconnected,

    /// Configuration is missing or inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything that does not fit the categories above
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Errors that terminate the stream without a `complete` event.
    ///
    /// Everything else is handled locally by the stage that observed it
    /// (fallback, skip, or drop) and the stream still completes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_) | Error::ClientDisconnected
        )
    }
}
