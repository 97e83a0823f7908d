//! Inbound answer request

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Body of `POST /api/v1/answer-sse`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// What the user said (or typed)
    #[serde(default)]
    pub transcript: String,

    /// BCP-47 language tag of the transcript
    #[serde(default)]
    pub language: String,

    /// Base64-encoded audio of the utterance, when available
    #[serde(default)]
    pub audio: Option<String>,

    #[serde(default)]
    pub org_id: String,

    #[serde(default)]
    pub config_id: String,

    /// Prior turns, oldest first
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,

    /// Presence of this field, even empty, skips validation and uses the
    /// given keywords directly
    #[serde(default)]
    pub keywords: Option<Vec<String>>,

    #[serde(default)]
    pub transcript_confidence: Option<f32>,

    #[serde(default)]
    pub generate_answer: Option<bool>,
}

/// One prior conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl AnswerRequest {
    /// Check required fields and history shape.
    pub fn validate(&self) -> Result<()> {
        if self.transcript.trim().is_empty() {
            return Err(Error::BadRequest("transcript is required".into()));
        }
        if self.org_id.is_empty() {
            return Err(Error::BadRequest("orgId is required".into()));
        }
        if self.config_id.is_empty() {
            return Err(Error::BadRequest("configId is required".into()));
        }
        if self.language.is_empty() {
            return Err(Error::BadRequest("language is required".into()));
        }
        for (i, turn) in self.chat_history.iter().enumerate() {
            if turn.content.is_empty() {
                return Err(Error::BadRequest(format!(
                    "chatHistory[{i}] has empty content"
                )));
            }
        }
        Ok(())
    }

    /// Decode the base64 audio payload, if present.
    pub fn audio_bytes(&self) -> Result<Option<Vec<u8>>> {
        match &self.audio {
            None => Ok(None),
            Some(encoded) => BASE64
                .decode(encoded)
                .map(Some)
                .map_err(|e| Error::BadRequest(format!("audio is not valid base64: {e}"))),
        }
    }
}
