//! Content-addressed audio cache
//!
//! Rendered audio is keyed by what produced it: the normalised plain
//! text, the language, and the voice model. Lookups sit on the synthesis
//! path; stores happen behind it and never fail a caller.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use answerflow_core::{ObjectStore, StoredObject, SynthesizedAudio};

/// Deterministic cache key for one rendered utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCacheKey {
    language: String,
    model: String,
    hash: String,
}

impl AudioCacheKey {
    pub fn new(text: &str, language: &str, model: &str) -> Self {
        let normalised = key_text(text, model);
        let mut hasher = Sha256::new();
        hasher.update(normalised.as_bytes());
        hasher.update(b"\n");
        hasher.update(language.as_bytes());
        hasher.update(b"\n");
        hasher.update(model.as_bytes());
        let hash = hex(&hasher.finalize());

        Self {
            language: language.to_string(),
            model: model.to_string(),
            hash,
        }
    }

    /// Flat object key: `{language}/{model}/{hex-hash}.{ext}`
    pub fn object_key(&self, extension: &str) -> String {
        format!("{}/{}/{}.{}", self.language, self.model, self.hash, extension)
    }
}

/// Collapse whitespace so cosmetic differences share one cache entry.
pub fn normalise(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Neural voices render case distinctions ("US" vs "us"); the older
/// voice families do not, so their keys fold case. The rule only depends
/// on the model name, keeping keys stable.
fn key_text(text: &str, model: &str) -> String {
    let normalised = normalise(text);
    if model.ends_with("Neural") {
        normalised
    } else {
        normalised.to_lowercase()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// File extension for a media type, used as the key suffix.
pub fn extension_for_media_type(media_type: &str) -> &'static str {
    match media_type {
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
}

/// Read-through/write-behind cache over an [`ObjectStore`].
#[derive(Clone)]
pub struct AudioCache {
    store: Arc<dyn ObjectStore>,
    /// Media type the vendor is configured to produce; fixes the key
    /// extension so lookups and stores agree.
    media_type: String,
}

impl AudioCache {
    pub fn new(store: Arc<dyn ObjectStore>, media_type: impl Into<String>) -> Self {
        Self {
            store,
            media_type: media_type.into(),
        }
    }

    fn object_key(&self, key: &AudioCacheKey) -> String {
        key.object_key(extension_for_media_type(&self.media_type))
    }

    /// Non-blocking relative to synthesis: a miss or store error just
    /// means the vendor is called.
    pub async fn lookup(&self, key: &AudioCacheKey) -> Option<SynthesizedAudio> {
        let object_key = self.object_key(key);
        match self.store.get(&object_key).await {
            Ok(Some(StoredObject { bytes, media_type })) => {
                metrics::counter!("tts_audio_cache_hits").increment(1);
                Some(SynthesizedAudio { bytes, media_type })
            }
            Ok(None) => {
                metrics::counter!("tts_audio_cache_misses").increment(1);
                None
            }
            Err(e) => {
                tracing::warn!(key = %object_key, error = %e, "audio cache read failed");
                None
            }
        }
    }

    /// Write-behind store; failures are logged and dropped.
    pub fn store_behind(&self, key: &AudioCacheKey, audio: &SynthesizedAudio) {
        let store = self.store.clone();
        let object_key = self.object_key(key);
        let bytes = audio.bytes.clone();
        let media_type = audio.media_type.clone();
        tokio::spawn(async move {
            if let Err(e) = store.put(&object_key, &bytes, &media_type).await {
                tracing::warn!(key = %object_key, error = %e, "audio cache write failed");
            }
        });
    }
}
