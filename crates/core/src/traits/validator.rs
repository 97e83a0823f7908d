//! Transcript validation contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::request::ChatTurn;

/// Prompt pair driving a validation call, resolved from the
/// localisation's template URLs.
#[derive(Debug, Clone)]
pub struct ValidatorPrompts {
    pub system_prompt: String,
    pub transcript_prompt: String,
}

/// What validation produced: a corrected transcript and search keywords.
///
/// Also the payload of the `validation_result` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub correction: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ValidationOutcome {
    /// Fallback outcome when the validator is skipped or fails: the
    /// transcript passes through unchanged.
    pub fn identity(transcript: impl Into<String>) -> Self {
        Self {
            correction: transcript.into(),
            keywords: Vec::new(),
        }
    }

    /// Outcome synthesized from caller-provided keywords.
    pub fn from_keywords(transcript: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            correction: transcript.into(),
            keywords,
        }
    }
}

/// Validates a transcript, optionally against the original audio.
#[async_trait]
pub trait TranscriptValidator: Send + Sync {
    /// Validate `transcript` in `language`, using `audio` when available
    /// for acoustic cross-checking. `history` supplies conversational
    /// context.
    async fn validate(
        &self,
        prompts: &ValidatorPrompts,
        language: &str,
        transcript: &str,
        audio: Option<&[u8]>,
        history: &[ChatTurn],
    ) -> Result<ValidationOutcome>;
}
