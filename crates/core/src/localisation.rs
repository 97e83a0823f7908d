//! Organisation configuration and per-language localisation bundles

use serde::{Deserialize, Serialize};

/// Per-organisation configuration document.
///
/// Loaded by an `OrgConfigStore` implementation; the stored documents use
/// camelCase field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgConfig {
    /// Language used when no localisation matches the request language
    pub default_primary_language: String,

    #[serde(default)]
    pub localisations: Vec<Localisation>,

    /// TTS vendor subscription key; absent means TTS is disabled
    #[serde(default)]
    pub speech_key: Option<String>,

    /// TTS vendor region, e.g. `southeastasia`
    #[serde(default)]
    pub speech_region: Option<String>,
}

/// Per-language bundle of prompts, model choices, and voice settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Localisation {
    /// BCP-47 tag this bundle serves
    pub language: String,

    pub assistant_id: String,
    pub assistant_key: String,

    /// Generator model; a `groq/` prefix routes to the Groq provider
    pub generator_model: String,

    pub system_prompt: String,

    /// When set, the generator is asked for the sectioned output envelope
    /// and this URL provides the formatting instructions
    #[serde(default)]
    pub generator_format_text_prompt_url: Option<String>,

    pub validator_system_prompt_template_url: String,
    pub validator_transcript_prompt_template_url: String,

    #[serde(default)]
    pub tts_model: Option<TtsVoice>,
}

/// Voice settings for a localisation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsVoice {
    /// Vendor voice name, e.g. `en-US-JennyNeural`
    pub voice: String,

    /// Prosody pitch, e.g. `+5%`
    #[serde(default)]
    pub pitch: Option<String>,

    /// Phoneme lexicon to apply before synthesis
    #[serde(default)]
    pub phoneme_url: Option<String>,
}

/// Upstream provider family for the generator model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorProvider {
    OpenAi,
    Groq,
}

impl Localisation {
    /// Resolve the provider and the provider-local model name.
    pub fn generator(&self) -> (GeneratorProvider, &str) {
        match self.generator_model.strip_prefix("groq/") {
            Some(model) => (GeneratorProvider::Groq, model),
            None => (GeneratorProvider::OpenAi, self.generator_model.as_str()),
        }
    }
}

impl OrgConfig {
    /// Localisation for `language`, falling back to the default primary
    /// language.
    pub fn localisation(&self, language: &str) -> Option<&Localisation> {
        self.localisations
            .iter()
            .find(|l| l.language == language)
            .or_else(|| {
                self.localisations
                    .iter()
                    .find(|l| l.language == self.default_primary_language)
            })
    }

    /// Voice for `language`, with the same fallback. Returns the language
    /// the voice actually belongs to alongside the voice settings.
    pub fn voice_for(&self, language: &str) -> Option<(&str, &TtsVoice)> {
        self.localisations
            .iter()
            .find(|l| l.language == language)
            .and_then(|l| l.tts_model.as_ref().map(|v| (l.language.as_str(), v)))
            .or_else(|| {
                self.localisations
                    .iter()
                    .find(|l| l.language == self.default_primary_language)
                    .and_then(|l| l.tts_model.as_ref().map(|v| (l.language.as_str(), v)))
            })
    }

    /// TTS is enabled when a vendor key, region, and at least one voice
    /// are configured.
    pub fn tts_enabled(&self) -> bool {
        self.speech_key.is_some()
            && self.speech_region.is_some()
            && self.localisations.iter().any(|l| l.tts_model.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localisation(language: &str, voice: Option<&str>) -> Localisation {
        Localisation {
            language: language.into(),
            assistant_id: "a".into(),
            assistant_key: "k".into(),
            generator_model: "gpt-4o-mini".into(),
            system_prompt: "You are helpful.".into(),
            generator_format_text_prompt_url: None,
            validator_system_prompt_template_url: "https://cfg/v-sys.txt".into(),
            validator_transcript_prompt_template_url: "https://cfg/v-tr.txt".into(),
            tts_model: voice.map(|v| TtsVoice {
                voice: v.into(),
                pitch: None,
                phoneme_url: None,
            }),
        }
    }

    fn org() -> OrgConfig {
        OrgConfig {
            default_primary_language: "en-US".into(),
            localisations: vec![
                localisation("en-US", Some("en-US-JennyNeural")),
                localisation("th-TH", None),
            ],
            speech_key: Some("key".into()),
            speech_region: Some("southeastasia".into()),
        }
    }

    #[test]
    fn test_provider_routing() {
        let mut l = localisation("en-US", None);
        assert_eq!(l.generator(), (GeneratorProvider::OpenAi, "gpt-4o-mini"));

        l.generator_model = "groq/llama-3.3-70b".into();
        assert_eq!(l.generator(), (GeneratorProvider::Groq, "llama-3.3-70b"));
    }

    #[test]
    fn test_localisation_fallback() {
        let org = org();
        assert_eq!(org.localisation("th-TH").unwrap().language, "th-TH");
        assert_eq!(org.localisation("fr-FR").unwrap().language, "en-US");
    }

    #[test]
    fn test_voice_fallback_to_default_language() {
        let org = org();
        // th-TH has no voice, so the default primary language's voice is used
        let (lang, voice) = org.voice_for("th-TH").unwrap();
        assert_eq!(lang, "en-US");
        assert_eq!(voice.voice, "en-US-JennyNeural");
    }

    #[test]
    fn test_tts_enabled_requires_key_and_voice() {
        let mut org = org();
        assert!(org.tts_enabled());
        org.speech_key = None;
        assert!(!org.tts_enabled());
    }
}
