//! Incremental text-to-speech
//!
//! Streams answer text into per-language buffers that cut on word
//! boundaries, renders each cut through a content-addressed audio cache
//! in front of the vendor, and delivers ordered audio chunks back onto
//! the request's event stream.

pub mod audio_cache;
pub mod buffer;
pub mod phoneme;
pub mod renderer;
pub mod ssml;
pub mod store;
pub mod streamer;
pub mod vendor;

pub use audio_cache::{AudioCache, AudioCacheKey};
pub use buffer::{ChunkSynthesizer, SpeechBuffer, SpeechBufferConfig};
pub use phoneme::PhonemeRule;
pub use renderer::TtsRenderer;
pub use store::{FsObjectStore, MemoryObjectStore};
pub use streamer::{SpeechStreamer, TTS_COMPONENT};
pub use vendor::AzureSpeechVendor;
