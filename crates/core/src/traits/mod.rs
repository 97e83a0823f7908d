//! Adapter contracts for upstream collaborators
//!
//! Each trait is the seam in front of one external service; the pipeline
//! only ever talks to these, never to vendor APIs directly.

pub mod events;
pub mod generator;
pub mod retrieval;
pub mod speech;
pub mod store;
pub mod validator;

pub use events::EventPublisher;
pub use generator::AnswerGenerator;
pub use retrieval::{KmDocument, KmHit, KmSearchResult, KnowledgeSearch};
pub use speech::{SpeechAuth, SpeechVendor, SynthesizedAudio};
pub use store::{ObjectStore, StoredObject};
pub use validator::{TranscriptValidator, ValidationOutcome, ValidatorPrompts};
