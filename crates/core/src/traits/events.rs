//! Event publication contract
//!
//! Producers (the orchestrator, TTS workers, error handlers) push onto a
//! single per-request sink through this trait; the sink serialises output
//! and owns the close protocol.

use async_trait::async_trait;

use crate::event::StreamEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append an event to the stream. Returns `false` once the stream is
    /// closed (the event was dropped); producers should wind down.
    async fn publish(&self, event: StreamEvent) -> bool;

    /// Mark a registered pipeline component as finished. Idempotent.
    async fn complete_component(&self, name: &str);

    /// Whether the stream has closed (client gone or pipeline finished).
    fn is_closed(&self) -> bool;
}
