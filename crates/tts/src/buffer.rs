//! Per-language speech buffer
//!
//! Accumulates streamed answer text and flushes it to synthesis in cuts
//! aligned to word boundaries, under a word-count threshold and a
//! first-arrival timeout. Cuts are dispatched through a single worker
//! task per buffer, so audio is delivered in extraction order even when
//! individual syntheses take uneven time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use unicode_segmentation::UnicodeSegmentation;

use answerflow_core::Result;

/// Buffer thresholds
#[derive(Debug, Clone)]
pub struct SpeechBufferConfig {
    /// Minimum words before a cut is taken
    pub min_words: usize,
    /// Longest a first fragment may wait before being flushed anyway
    pub max_wait: Duration,
}

impl Default for SpeechBufferConfig {
    fn default() -> Self {
        Self {
            min_words: 3,
            max_wait: Duration::from_secs(2),
        }
    }
}

/// Renders one cut prefix and delivers its audio downstream.
///
/// The buffer does not know about events or vendors; the streamer binds
/// a synthesizer per language that does.
#[async_trait]
pub trait ChunkSynthesizer: Send + Sync {
    async fn synthesize_chunk(&self, text: &str) -> Result<()>;
}

struct BufferState {
    pending: String,
    in_flight: usize,
    closed: bool,
    /// Bumped on every flush; a timer only fires for its own generation
    generation: u64,
    timer: Option<JoinHandle<()>>,
    jobs: Option<mpsc::UnboundedSender<String>>,
}

struct BufferShared {
    config: SpeechBufferConfig,
    state: Mutex<BufferState>,
}

/// Text accumulator for one language
pub struct SpeechBuffer {
    shared: Arc<BufferShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechBuffer {
    pub fn new(config: SpeechBufferConfig, synth: Arc<dyn ChunkSynthesizer>) -> Self {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<String>();

        let shared = Arc::new(BufferShared {
            config,
            state: Mutex::new(BufferState {
                pending: String::new(),
                in_flight: 0,
                closed: false,
                generation: 0,
                timer: None,
                jobs: Some(jobs_tx),
            }),
        });

        // One worker per buffer keeps synthesis, and therefore audio
        // delivery, in extraction order.
        let worker_shared = shared.clone();
        let worker = tokio::spawn(async move {
            while let Some(text) = jobs_rx.recv().await {
                if let Err(e) = synth.synthesize_chunk(&text).await {
                    tracing::warn!(error = %e, "speech chunk dropped");
                }
                worker_shared.state.lock().in_flight -= 1;
            }
        });

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Append a text fragment and flush if the cut predicate holds.
    pub fn append(&self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }

        let was_empty = state.pending.is_empty();
        state.pending.push_str(fragment);

        if was_empty {
            self.arm_timer(&mut state);
        }

        if word_count(&state.pending) >= self.shared.config.min_words {
            flush_pending(&mut state);
        }
    }

    /// Flush whatever is pending, regardless of thresholds.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock();
        flush_pending(&mut state);
    }

    /// Flush remaining text, stop accepting input, and wait for every
    /// dispatched synthesis to finish. Idempotent; only the first call
    /// waits.
    pub async fn close(&self) {
        let worker = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            flush_pending(&mut state);
            // Dropping the sender lets the worker drain and exit
            state.jobs = None;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            self.worker.lock().take()
        };

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "speech buffer worker panicked");
                }
            }
        }
    }

    /// Words currently buffered and not yet cut
    pub fn pending_text(&self) -> String {
        self.shared.state.lock().pending.clone()
    }

    /// Syntheses dispatched but not yet finished
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    fn arm_timer(&self, state: &mut BufferState) {
        let generation = state.generation;
        let shared = self.shared.clone();
        let max_wait = self.shared.config.max_wait;

        if let Some(old) = state.timer.take() {
            old.abort();
        }
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(max_wait).await;
            let mut state = shared.state.lock();
            // A flush in the meantime restarts the clock
            if state.generation == generation {
                flush_pending(&mut state);
            }
        }));
    }
}

fn flush_pending(state: &mut BufferState) {
    if state.pending.is_empty() {
        return;
    }

    // The cut is the largest word-boundary index in the pending text.
    // Earlier boundaries can only lower the word count, so the end of
    // the buffer (an append edge, hence a boundary) is always the cut.
    let prefix = std::mem::take(&mut state.pending);

    state.generation += 1;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }

    let Some(jobs) = &state.jobs else {
        return;
    };
    if jobs.send(prefix).is_ok() {
        state.in_flight += 1;
    }
}

/// Word count of the pending text, script-aware.
fn word_count(text: &str) -> usize {
    text.unicode_words().count()
}
