//! Speech synthesis vendor contract

use async_trait::async_trait;

use crate::error::Result;

/// Authentication for the TTS vendor, resolved from the organisation
/// configuration.
#[derive(Debug, Clone)]
pub struct SpeechAuth {
    pub key: String,
    pub region: String,
}

/// Rendered audio plus its media type
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// e.g. `audio/mpeg`
    pub media_type: String,
}

/// Renders an SSML document to audio.
#[async_trait]
pub trait SpeechVendor: Send + Sync {
    async fn synthesize(
        &self,
        ssml: &str,
        voice: &str,
        auth: &SpeechAuth,
    ) -> Result<SynthesizedAudio>;
}
