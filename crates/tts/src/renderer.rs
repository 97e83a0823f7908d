//! Cache-fronted synthesis (plain text in, audio out)

use std::sync::Arc;
use std::time::Duration;

use answerflow_core::{Error, Result, SpeechAuth, SpeechVendor, SynthesizedAudio, TtsVoice};

use crate::audio_cache::{AudioCache, AudioCacheKey};
use crate::phoneme::{self, PhonemeRule};
use crate::ssml;

/// Upper bound on one vendor synthesis call.
const VENDOR_TIMEOUT: Duration = Duration::from_secs(20);

/// Control characters that vendors reject inside SSML bodies.
const ILLEGAL_CONTROL_CHARS: &[char] = &[
    '\u{0}', '\u{1}', '\u{2}', '\u{3}', '\u{4}', '\u{5}', '\u{6}', '\u{7}', '\u{8}', '\u{B}',
    '\u{C}', '\u{E}', '\u{F}', '\u{10}', '\u{11}', '\u{12}', '\u{13}', '\u{14}', '\u{15}',
    '\u{16}', '\u{17}', '\u{18}', '\u{19}', '\u{1A}', '\u{1B}', '\u{1C}', '\u{1D}', '\u{1E}',
    '\u{1F}',
];

/// Renders plain text to audio through the cache.
///
/// On a miss the text goes through phoneme transformation and SSML
/// assembly, the vendor is called under a timeout, and the result is
/// stored behind the response. Failed syntheses are never cached.
pub struct TtsRenderer {
    vendor: Arc<dyn SpeechVendor>,
    cache: AudioCache,
}

impl TtsRenderer {
    pub fn new(vendor: Arc<dyn SpeechVendor>, cache: AudioCache) -> Self {
        Self { vendor, cache }
    }

    pub async fn render(
        &self,
        text: &str,
        language: &str,
        voice: &TtsVoice,
        phonemes: &[PhonemeRule],
        auth: &SpeechAuth,
    ) -> Result<SynthesizedAudio> {
        let key = AudioCacheKey::new(text, language, &voice.voice);
        if let Some(hit) = self.cache.lookup(&key).await {
            tracing::debug!(language, voice = %voice.voice, "audio cache hit");
            return Ok(hit);
        }

        let transformed = phoneme::transform(text, phonemes, ILLEGAL_CONTROL_CHARS);
        let ssml = ssml::build(&transformed, &voice.voice, voice.pitch.as_deref(), language);

        let audio = tokio::time::timeout(
            VENDOR_TIMEOUT,
            self.vendor.synthesize(&ssml, &voice.voice, auth),
        )
        .await
        .map_err(|_| Error::Tts("synthesis timed out".to_string()))??;

        metrics::counter!("tts_syntheses").increment(1);
        self.cache.store_behind(&key, &audio);
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingVendor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SpeechVendor for CountingVendor {
        async fn synthesize(
            &self,
            ssml: &str,
            _voice: &str,
            _auth: &SpeechAuth,
        ) -> Result<SynthesizedAudio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Tts("vendor down".into()));
            }
            Ok(SynthesizedAudio {
                bytes: ssml.as_bytes().to_vec(),
                media_type: "audio/mpeg".into(),
            })
        }
    }

    fn renderer(fail: bool) -> (Arc<CountingVendor>, TtsRenderer) {
        let vendor = Arc::new(CountingVendor {
            calls: AtomicUsize::new(0),
            fail,
        });
        let cache = AudioCache::new(Arc::new(MemoryObjectStore::new()), "audio/mpeg");
        (vendor.clone(), TtsRenderer::new(vendor, cache))
    }

    fn voice() -> TtsVoice {
        TtsVoice {
            voice: "en-US-JennyNeural".into(),
            pitch: None,
            phoneme_url: None,
        }
    }

    fn auth() -> SpeechAuth {
        SpeechAuth {
            key: "k".into(),
            region: "southeastasia".into(),
        }
    }

    #[tokio::test]
    async fn test_second_render_hits_cache() {
        let (vendor, renderer) = renderer(false);
        renderer
            .render("hello", "en-US", &voice(), &[], &auth())
            .await
            .unwrap();

        // Wait for the write-behind store before rendering again
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if vendor.calls.load(Ordering::SeqCst) == 1 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        renderer
            .render("hello", "en-US", &voice(), &[], &auth())
            .await
            .unwrap();
        assert_eq!(vendor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let (vendor, renderer) = renderer(true);
        for _ in 0..2 {
            assert!(renderer
                .render("hello", "en-US", &voice(), &[], &auth())
                .await
                .is_err());
        }
        assert_eq!(vendor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_vendor_receives_ssml() {
        let (_vendor, renderer) = renderer(false);
        let audio = renderer
            .render("hello & bye", "en-US", &voice(), &[], &auth())
            .await
            .unwrap();
        let ssml = String::from_utf8(audio.bytes).unwrap();
        assert!(ssml.contains("<voice name=\"en-US-JennyNeural\">hello &amp; bye</voice>"));
    }
}
