//! Core traits and types for the answer-generation service
//!
//! This crate provides foundational types used across all other crates:
//! - SSE event model and payload shapes
//! - Inbound request and chat history types
//! - Organisation configuration / localisation bundles
//! - Adapter contracts for upstream collaborators
//! - Error types

pub mod error;
pub mod event;
pub mod localisation;
pub mod message;
pub mod request;
pub mod traits;

pub use error::{Error, Result};
pub use event::{ContentData, MetadataData, StreamEvent, TtsAudioData};
pub use localisation::{GeneratorProvider, Localisation, OrgConfig, TtsVoice};
pub use message::{Message, Role};
pub use request::{AnswerRequest, ChatRole, ChatTurn};

pub use traits::{
    // Events
    EventPublisher,
    // Generation
    AnswerGenerator,
    // Retrieval
    KmDocument, KmHit, KmSearchResult, KnowledgeSearch,
    // Speech
    SpeechAuth, SpeechVendor, SynthesizedAudio,
    // Storage
    ObjectStore, StoredObject,
    // Validation
    TranscriptValidator, ValidationOutcome, ValidatorPrompts,
};
