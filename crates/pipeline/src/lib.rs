//! Per-request streaming pipeline
//!
//! Everything that lives for exactly one answer request: the event sink
//! that serialises all producers onto the SSE stream and gates closure
//! on a completion registry, the incremental parser for sectioned
//! generator output, and the orchestrator that drives validation,
//! retrieval, generation, and speech synthesis.

pub mod orchestrator;
pub mod parser;
pub mod sink;

pub use orchestrator::{AnswerFlow, FlowDependencies, TEXT_COMPONENT};
pub use parser::{ParsedSegment, SectionedParser};
pub use sink::EventSink;
