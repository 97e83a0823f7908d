//! Per-request speech streamer
//!
//! Owns one speech buffer per language, lazily constructed from the
//! organisation's voice configuration, and marks the TTS pipeline
//! component complete once every buffer has drained. Without a vendor
//! key the streamer is inert: text is dropped but the completion
//! protocol still runs, so the stream never waits on disabled TTS.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use answerflow_core::{
    EventPublisher, OrgConfig, Result, SpeechAuth, StreamEvent, TtsAudioData, TtsVoice,
};
use answerflow_templates::TemplateFetcher;

use crate::buffer::{ChunkSynthesizer, SpeechBuffer, SpeechBufferConfig};
use crate::phoneme::{self, PhonemeRule};
use crate::renderer::TtsRenderer;

/// Completion-registry name for the speech pipeline
pub const TTS_COMPONENT: &str = "tts_processing";

/// Routes answer text into per-language speech buffers
pub struct SpeechStreamer {
    publisher: Arc<dyn EventPublisher>,
    mode: Mode,
}

enum Mode {
    Active(Active),
    Inert,
}

struct Active {
    renderer: Arc<TtsRenderer>,
    templates: TemplateFetcher,
    org: Arc<OrgConfig>,
    auth: SpeechAuth,
    config: SpeechBufferConfig,
    /// `None` marks a language with no usable voice, so the miss is
    /// logged only once
    buffers: tokio::sync::Mutex<HashMap<String, Option<Arc<SpeechBuffer>>>>,
}

impl SpeechStreamer {
    /// Streamer with a working vendor behind it.
    pub fn active(
        publisher: Arc<dyn EventPublisher>,
        renderer: Arc<TtsRenderer>,
        templates: TemplateFetcher,
        org: Arc<OrgConfig>,
        auth: SpeechAuth,
        config: SpeechBufferConfig,
    ) -> Self {
        Self {
            publisher,
            mode: Mode::Active(Active {
                renderer,
                templates,
                org,
                auth,
                config,
                buffers: tokio::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Streamer for requests where TTS is disabled.
    pub fn inert(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            publisher,
            mode: Mode::Inert,
        }
    }

    pub fn is_inert(&self) -> bool {
        matches!(self.mode, Mode::Inert)
    }

    /// Route a text fragment to the buffer for `language`, creating it
    /// on first use.
    pub async fn add_text_chunk(&self, text: &str, language: &str) {
        let Mode::Active(active) = &self.mode else {
            return;
        };

        let mut buffers = active.buffers.lock().await;
        if !buffers.contains_key(language) {
            let buffer = self.build_buffer(active, language).await;
            buffers.insert(language.to_string(), buffer);
        }

        if let Some(Some(buffer)) = buffers.get(language) {
            buffer.append(text);
        }
    }

    /// Flush every buffer's pending text to synthesis.
    pub async fn flush_all(&self) {
        if let Mode::Active(active) = &self.mode {
            let buffers = active.buffers.lock().await;
            for buffer in buffers.values().flatten() {
                buffer.flush();
            }
        }
    }

    /// Close every buffer, wait for their syntheses to drain, and mark
    /// the TTS component complete.
    pub async fn close(&self) {
        if let Mode::Active(active) = &self.mode {
            let buffers: Vec<Arc<SpeechBuffer>> = {
                let mut map = active.buffers.lock().await;
                map.drain().filter_map(|(_, buffer)| buffer).collect()
            };
            for buffer in buffers {
                buffer.close().await;
            }
        }
        self.publisher.complete_component(TTS_COMPONENT).await;
    }

    async fn build_buffer(&self, active: &Active, language: &str) -> Option<Arc<SpeechBuffer>> {
        let Some((voice_language, voice)) = active.org.voice_for(language) else {
            tracing::warn!(language, "no voice configured, dropping speech for language");
            return None;
        };

        let phonemes = match &voice.phoneme_url {
            Some(url) => match self.load_phonemes(active, url).await {
                Ok(rules) => rules,
                Err(e) => {
                    tracing::warn!(url, error = %e, "phoneme table unavailable, synthesizing without it");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let context = Arc::new(ChunkContext {
            renderer: active.renderer.clone(),
            publisher: self.publisher.clone(),
            language: voice_language.to_string(),
            voice: voice.clone(),
            phonemes,
            auth: active.auth.clone(),
            chunk_index: AtomicU32::new(0),
        });

        Some(Arc::new(SpeechBuffer::new(
            active.config.clone(),
            context,
        )))
    }

    async fn load_phonemes(&self, active: &Active, url: &str) -> Result<Vec<PhonemeRule>> {
        let body = active.templates.fetch(url).await?;
        phoneme::parse_table(&body)
    }
}

/// Synthesis binding for one language: renders cuts and publishes their
/// audio in arrival order.
struct ChunkContext {
    renderer: Arc<TtsRenderer>,
    publisher: Arc<dyn EventPublisher>,
    language: String,
    voice: TtsVoice,
    phonemes: Vec<PhonemeRule>,
    auth: SpeechAuth,
    chunk_index: AtomicU32,
}

#[async_trait]
impl ChunkSynthesizer for ChunkContext {
    async fn synthesize_chunk(&self, text: &str) -> Result<()> {
        match self
            .renderer
            .render(text, &self.language, &self.voice, &self.phonemes, &self.auth)
            .await
        {
            Ok(audio) => {
                let index = self.chunk_index.fetch_add(1, Ordering::SeqCst);
                let data = TtsAudioData {
                    text: text.to_string(),
                    language: self.language.clone(),
                    audio_size: audio.bytes.len(),
                    audio_data: BASE64.encode(&audio.bytes),
                    audio_format: audio.media_type,
                    chunk_index: Some(index),
                    total_chunks: None,
                    is_final: None,
                };
                self.publisher.publish(StreamEvent::tts_audio(data)).await;
                Ok(())
            }
            Err(e) => {
                self.publisher
                    .publish(StreamEvent::error(format!("speech synthesis failed: {e}")))
                    .await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_cache::AudioCache;
    use crate::store::MemoryObjectStore;
    use answerflow_core::{Localisation, SpeechVendor, SynthesizedAudio};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<StreamEvent>>,
        completed: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        fn event_types(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|e| e.event_type()).collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: StreamEvent) -> bool {
            self.events.lock().push(event);
            true
        }

        async fn complete_component(&self, name: &str) {
            self.completed.lock().push(name.to_string());
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    struct StaticVendor;

    #[async_trait]
    impl SpeechVendor for StaticVendor {
        async fn synthesize(
            &self,
            _ssml: &str,
            _voice: &str,
            _auth: &SpeechAuth,
        ) -> Result<SynthesizedAudio> {
            Ok(SynthesizedAudio {
                bytes: vec![0xAB],
                media_type: "audio/mpeg".into(),
            })
        }
    }

    fn org() -> Arc<OrgConfig> {
        Arc::new(OrgConfig {
            default_primary_language: "en-US".into(),
            localisations: vec![Localisation {
                language: "en-US".into(),
                assistant_id: "a".into(),
                assistant_key: "k".into(),
                generator_model: "gpt-4o-mini".into(),
                system_prompt: "helpful".into(),
                generator_format_text_prompt_url: None,
                validator_system_prompt_template_url: "https://cfg/sys".into(),
                validator_transcript_prompt_template_url: "https://cfg/tr".into(),
                tts_model: Some(TtsVoice {
                    voice: "en-US-JennyNeural".into(),
                    pitch: None,
                    phoneme_url: None,
                }),
            }],
            speech_key: Some("key".into()),
            speech_region: Some("southeastasia".into()),
        })
    }

    fn active_streamer(publisher: Arc<RecordingPublisher>) -> SpeechStreamer {
        let renderer = Arc::new(TtsRenderer::new(
            Arc::new(StaticVendor),
            AudioCache::new(Arc::new(MemoryObjectStore::new()), "audio/mpeg"),
        ));
        SpeechStreamer::active(
            publisher,
            renderer,
            TemplateFetcher::new().unwrap(),
            org(),
            SpeechAuth {
                key: "key".into(),
                region: "southeastasia".into(),
            },
            SpeechBufferConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_inert_streamer_completes_without_audio() {
        let publisher = Arc::new(RecordingPublisher::default());
        let streamer = SpeechStreamer::inert(publisher.clone());
        assert!(streamer.is_inert());

        streamer.add_text_chunk("hello world today", "en-US").await;
        streamer.close().await;

        assert!(publisher.event_types().is_empty());
        assert_eq!(publisher.completed.lock().as_slice(), [TTS_COMPONENT]);
    }

    #[tokio::test]
    async fn test_active_streamer_emits_audio_then_completes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let streamer = active_streamer(publisher.clone());

        streamer.add_text_chunk("hello world today", "en-US").await;
        streamer.close().await;

        let types = publisher.event_types();
        assert_eq!(types, vec!["tts_audio"]);
        assert_eq!(publisher.completed.lock().as_slice(), [TTS_COMPONENT]);

        let events = publisher.events.lock();
        let StreamEvent::TtsAudio { data, .. } = &events[0] else {
            panic!("expected tts_audio");
        };
        assert_eq!(data.text, "hello world today");
        assert_eq!(data.language, "en-US");
        assert_eq!(data.audio_size, 1);
        assert_eq!(data.chunk_index, Some(0));
    }

    #[tokio::test]
    async fn test_unconfigured_language_falls_back_to_default_voice() {
        let publisher = Arc::new(RecordingPublisher::default());
        let streamer = active_streamer(publisher.clone());

        streamer.add_text_chunk("bonjour tout le monde", "fr-FR").await;
        streamer.close().await;

        let events = publisher.events.lock();
        let StreamEvent::TtsAudio { data, .. } = &events[0] else {
            panic!("expected tts_audio");
        };
        // The default primary language's voice carried the audio
        assert_eq!(data.language, "en-US");
    }
}
