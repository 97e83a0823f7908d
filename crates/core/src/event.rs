//! SSE event model
//!
//! One event per SSE message; payloads are UTF-8 JSON with a `type` tag
//! and an ISO-8601 `timestamp`, plus either a human-readable `message`
//! or structured `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::retrieval::KmSearchResult;
use crate::traits::validator::ValidationOutcome;

/// Events pushed onto a request's SSE stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Pipeline progress note
    Status {
        timestamp: DateTime<Utc>,
        message: String,
    },
    /// Outcome of transcript validation (real or synthesized)
    ValidationResult {
        timestamp: DateTime<Utc>,
        data: ValidationOutcome,
    },
    /// Retrieved knowledge documents
    KmResult {
        timestamp: DateTime<Utc>,
        data: KmSearchResult,
    },
    /// Generator reasoning inside the sectioned envelope
    Thinking {
        timestamp: DateTime<Utc>,
        data: ContentData,
    },
    /// Spoken-answer text fragment
    AnswerChunk {
        timestamp: DateTime<Utc>,
        data: ContentData,
    },
    /// Display-formatted answer fragment (never spoken)
    FormattedAnswer {
        timestamp: DateTime<Utc>,
        data: ContentData,
    },
    /// Out-of-band generator metadata, e.g. source document ids
    Metadata {
        timestamp: DateTime<Utc>,
        data: MetadataData,
    },
    /// A synthesized audio chunk for a slice of the answer
    TtsAudio {
        timestamp: DateTime<Utc>,
        data: TtsAudioData,
    },
    /// Terminal event of a successful stream
    Complete {
        timestamp: DateTime<Utc>,
        message: String,
    },
    /// A recoverable or fatal error note
    Error {
        timestamp: DateTime<Utc>,
        message: String,
    },
}

/// Text content payload shared by chunk-style events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentData {
    pub content: String,
}

/// Generator metadata payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataData {
    pub doc_ids: String,
}

/// Synthesized audio payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsAudioData {
    /// The text slice this audio renders
    pub text: String,
    pub language: String,
    /// Decoded size in bytes
    pub audio_size: usize,
    /// Base64-encoded audio
    pub audio_data: String,
    /// Media type of the audio, e.g. `audio/mpeg`
    pub audio_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    pub fn validation_result(data: ValidationOutcome) -> Self {
        Self::ValidationResult {
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn km_result(data: KmSearchResult) -> Self {
        Self::KmResult {
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            timestamp: Utc::now(),
            data: ContentData {
                content: content.into(),
            },
        }
    }

    pub fn answer_chunk(content: impl Into<String>) -> Self {
        Self::AnswerChunk {
            timestamp: Utc::now(),
            data: ContentData {
                content: content.into(),
            },
        }
    }

    pub fn formatted_answer(content: impl Into<String>) -> Self {
        Self::FormattedAnswer {
            timestamp: Utc::now(),
            data: ContentData {
                content: content.into(),
            },
        }
    }

    pub fn metadata(doc_ids: impl Into<String>) -> Self {
        Self::Metadata {
            timestamp: Utc::now(),
            data: MetadataData {
                doc_ids: doc_ids.into(),
            },
        }
    }

    pub fn tts_audio(data: TtsAudioData) -> Self {
        Self::TtsAudio {
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::Complete {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// The wire value of the `type` tag, for logging and tests
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::ValidationResult { .. } => "validation_result",
            Self::KmResult { .. } => "km_result",
            Self::Thinking { .. } => "thinking",
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::FormattedAnswer { .. } => "formatted_answer",
            Self::Metadata { .. } => "metadata",
            Self::TtsAudio { .. } => "tts_audio",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}
