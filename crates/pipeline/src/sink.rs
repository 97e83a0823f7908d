//! Single-writer event sink with completion registry
//!
//! Every producer in a request (orchestrator, speech workers, error
//! handlers) emits through one sink. Emission is serialised by a bounded
//! channel; the stream closes only when every registered component has
//! reported completion, or when a fatal error closes it explicitly. The
//! sink goes `Open -> Closing -> Closed`; `Closing` covers the window in
//! which the final `complete` event is being written out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use answerflow_core::{EventPublisher, StreamEvent};

/// Queue depth between producers and the SSE response. A full queue
/// blocks the producer; events are never dropped.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Closing,
    Closed,
}

struct SinkState {
    components: Vec<(String, bool)>,
    phase: Phase,
    tx: Option<mpsc::Sender<StreamEvent>>,
}

struct SinkInner {
    state: tokio::sync::Mutex<SinkState>,
    closed: AtomicBool,
}

/// Ordered SSE emitter shared by all of a request's producers
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<SinkInner>,
}

impl EventSink {
    /// Create a sink and the stream of events it will emit.
    pub fn channel(capacity: usize) -> (Self, ReceiverStream<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink = Self {
            inner: Arc::new(SinkInner {
                state: tokio::sync::Mutex::new(SinkState {
                    components: Vec::new(),
                    phase: Phase::Open,
                    tx: Some(tx),
                }),
                closed: AtomicBool::new(false),
            }),
        };
        (sink, ReceiverStream::new(rx))
    }

    /// Register a component that must finish before the stream closes.
    ///
    /// Registration only makes sense before any component completes;
    /// late registrations are rejected so they cannot resurrect a
    /// closing stream.
    pub async fn register_component(&self, name: &str) {
        let mut state = self.inner.state.lock().await;
        if state.phase != Phase::Open {
            tracing::error!(name, "component registered after close, ignoring");
            return;
        }
        if state.components.iter().any(|(_, done)| *done) {
            tracing::error!(name, "component registered after another completed, ignoring");
            return;
        }
        if state.components.iter().any(|(n, _)| n == name) {
            return;
        }
        state.components.push((name.to_string(), false));
    }

    /// Append an event to the stream. Returns `false` if the stream has
    /// closed and the event was dropped.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        let tx = {
            let state = self.inner.state.lock().await;
            if state.phase != Phase::Open {
                return false;
            }
            match &state.tx {
                Some(tx) => tx.clone(),
                None => return false,
            }
        };

        // The lock is not held while sending, so a full queue blocks
        // only this producer.
        if tx.send(event).await.is_err() {
            // Receiver gone: the client disconnected.
            self.close_now().await;
            return false;
        }
        true
    }

    /// Emit an `error` event. Does not close the stream by itself.
    pub async fn error(&self, message: impl Into<String>) -> bool {
        self.emit(StreamEvent::error(message)).await
    }

    /// Mark one component finished. When the registry is non-empty and
    /// all-true this emits a single `complete` and closes the stream.
    /// Re-marking a finished component is a no-op.
    pub async fn mark_component_complete(&self, name: &str) {
        let mut state = self.inner.state.lock().await;
        if state.phase != Phase::Open {
            return;
        }

        match state.components.iter_mut().find(|(n, _)| n == name) {
            Some((_, done)) => {
                if *done {
                    return;
                }
                *done = true;
            }
            None => {
                tracing::warn!(name, "completion for unregistered component ignored");
                return;
            }
        }

        if state.components.iter().all(|(_, done)| *done) {
            let tx = state.tx.take();
            state.phase = Phase::Closing;
            drop(state);
            self.finish(tx, true).await;
        }
    }

    /// Mark every registered component complete.
    pub async fn mark_complete(&self) {
        let mut state = self.inner.state.lock().await;
        if state.phase != Phase::Open {
            return;
        }
        for (_, done) in state.components.iter_mut() {
            *done = true;
        }
        if state.components.is_empty() {
            // Nothing registered; there is no producer to wait for.
            tracing::warn!("mark_complete with empty registry, closing stream");
        }
        let tx = state.tx.take();
        state.phase = Phase::Closing;
        drop(state);
        self.finish(tx, true).await;
    }

    /// Close without a `complete` event. Fatal-error path.
    pub async fn close_fatal(&self) {
        self.close_now().await;
    }

    /// Whether the stream has stopped accepting events.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of the completion registry, for diagnostics and tests.
    pub async fn components(&self) -> Vec<(String, bool)> {
        self.inner.state.lock().await.components.clone()
    }

    async fn finish(&self, tx: Option<mpsc::Sender<StreamEvent>>, complete: bool) {
        if let Some(tx) = tx {
            if complete {
                let _ = tx
                    .send(StreamEvent::complete("Answer pipeline complete"))
                    .await;
            }
        }
        let mut state = self.inner.state.lock().await;
        state.phase = Phase::Closed;
        state.tx = None;
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    async fn close_now(&self) {
        let tx = {
            let mut state = self.inner.state.lock().await;
            if state.phase == Phase::Closed {
                return;
            }
            state.phase = Phase::Closing;
            state.tx.take()
        };
        drop(tx);
        let mut state = self.inner.state.lock().await;
        state.phase = Phase::Closed;
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for EventSink {
    async fn publish(&self, event: StreamEvent) -> bool {
        self.emit(event).await
    }

    async fn complete_component(&self, name: &str) {
        self.mark_component_complete(name).await;
    }

    fn is_closed(&self) -> bool {
        EventSink::is_closed(self)
    }
}
