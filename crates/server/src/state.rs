//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;
use std::time::Duration;

use answerflow_config::{FileOrgStore, OrgConfigStore, Settings};
use answerflow_core::{
    AnswerGenerator, KnowledgeSearch, ObjectStore, SpeechVendor, TranscriptValidator,
};
use answerflow_km::HttpKnowledgeSearch;
use answerflow_llm::{ChatBackend, GeneratorConfig};
use answerflow_templates::TemplateFetcher;
use answerflow_tts::{AudioCache, AzureSpeechVendor, FsObjectStore, MemoryObjectStore};
use answerflow_validation::HttpValidator;

use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orgs: Arc<dyn OrgConfigStore>,
    pub templates: TemplateFetcher,
    pub validator: Arc<dyn TranscriptValidator>,
    pub km: Arc<dyn KnowledgeSearch>,
    pub generator: Arc<dyn AnswerGenerator>,
    /// `None` disables TTS process-wide; per-request enablement still
    /// depends on the organisation configuration
    pub speech_vendor: Option<Arc<dyn SpeechVendor>>,
    pub audio_cache: AudioCache,
}

impl AppState {
    /// Wire all adapters from settings.
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let templates = TemplateFetcher::new()
            .map_err(|e| ServerError::Configuration(format!("template fetcher: {e}")))?;

        let orgs: Arc<dyn OrgConfigStore> = Arc::new(FileOrgStore::new(&settings.org.config_dir));

        let validator: Arc<dyn TranscriptValidator> = Arc::new(
            HttpValidator::new(
                settings.validator.endpoint.clone(),
                Duration::from_secs(settings.validator.timeout_seconds),
            )
            .map_err(|e| ServerError::Configuration(format!("validator client: {e}")))?,
        );

        let km: Arc<dyn KnowledgeSearch> = Arc::new(
            HttpKnowledgeSearch::new(settings.km.endpoint.clone(), settings.km.token.clone())
                .map_err(|e| ServerError::Configuration(format!("km client: {e}")))?,
        );

        let generator: Arc<dyn AnswerGenerator> = Arc::new(
            ChatBackend::new(GeneratorConfig {
                openai_endpoint: settings.generator.openai_endpoint.clone(),
                openai_api_key: settings.generator.openai_api_key.clone(),
                groq_endpoint: settings.generator.groq_endpoint.clone(),
                groq_api_key: settings.generator.groq_api_key.clone(),
                timeout: Duration::from_secs(settings.generator.timeout_seconds),
            })
            .map_err(|e| ServerError::Configuration(format!("generator client: {e}")))?,
        );

        let speech_vendor: Option<Arc<dyn SpeechVendor>> = match &settings.speech.key {
            Some(_) => Some(Arc::new(
                AzureSpeechVendor::new(settings.speech.output_format.clone())
                    .map_err(|e| ServerError::Configuration(format!("speech vendor: {e}")))?,
            )),
            None => {
                tracing::info!("no speech key configured, TTS disabled");
                None
            }
        };

        let store: Arc<dyn ObjectStore> = match &settings.cache.audio_dir {
            Some(dir) => Arc::new(FsObjectStore::new(dir)),
            None => Arc::new(MemoryObjectStore::new()),
        };
        let media_type =
            answerflow_tts::vendor::media_type_for_output_format(&settings.speech.output_format);
        let audio_cache = AudioCache::new(store, media_type);

        Ok(Self {
            settings: Arc::new(settings),
            orgs,
            templates,
            validator,
            km,
            generator,
            speech_vendor,
            audio_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_default_settings() {
        let state = AppState::from_settings(Settings::default()).unwrap();
        assert!(state.speech_vendor.is_none());
    }

    #[test]
    fn test_speech_vendor_enabled_with_key() {
        let mut settings = Settings::default();
        settings.speech.key = Some("k".into());
        settings.speech.region = Some("southeastasia".into());
        let state = AppState::from_settings(settings).unwrap();
        assert!(state.speech_vendor.is_some());
    }
}
