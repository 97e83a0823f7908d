//! Azure-style REST speech vendor

use async_trait::async_trait;
use reqwest::Client;

use answerflow_core::{Error, Result, SpeechAuth, SpeechVendor, SynthesizedAudio};

/// Media type produced by a vendor output-format name.
pub fn media_type_for_output_format(format: &str) -> &'static str {
    if format.contains("mp3") {
        "audio/mpeg"
    } else if format.contains("riff") || format.contains("pcm") {
        "audio/wav"
    } else if format.contains("ogg") {
        "audio/ogg"
    } else {
        "application/octet-stream"
    }
}

/// REST client for the cognitive-services synthesis endpoint.
///
/// The endpoint is derived from the auth region; tests override it.
pub struct AzureSpeechVendor {
    client: Client,
    output_format: String,
    endpoint_override: Option<String>,
}

impl AzureSpeechVendor {
    pub fn new(output_format: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            output_format: output_format.into(),
            endpoint_override: None,
        })
    }

    /// Point at a fixed endpoint instead of the regional host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self, region: &str) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://{region}.tts.speech.microsoft.com/cognitiveservices/v1"
            ),
        }
    }
}

#[async_trait]
impl SpeechVendor for AzureSpeechVendor {
    async fn synthesize(
        &self,
        ssml: &str,
        voice: &str,
        auth: &SpeechAuth,
    ) -> Result<SynthesizedAudio> {
        let response = self
            .client
            .post(self.endpoint(&auth.region))
            .header("Ocp-Apim-Subscription-Key", &auth.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.output_format)
            .header("User-Agent", "answerflow")
            .body(ssml.to_string())
            .send()
            .await
            .map_err(|e| Error::Tts(format!("vendor request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("vendor HTTP {status}: {body}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("vendor body read failed: {e}")))?;

        tracing::debug!(voice, size = bytes.len(), "synthesized audio chunk");

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            media_type: media_type_for_output_format(&self.output_format).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_output_format_media_types() {
        assert_eq!(
            media_type_for_output_format("audio-16khz-128kbitrate-mono-mp3"),
            "audio/mpeg"
        );
        assert_eq!(
            media_type_for_output_format("riff-16khz-16bit-mono-pcm"),
            "audio/wav"
        );
        assert_eq!(
            media_type_for_output_format("ogg-24khz-16bit-mono-opus"),
            "audio/ogg"
        );
    }

    #[tokio::test]
    async fn test_synthesize_posts_ssml() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Ocp-Apim-Subscription-Key", "secret"))
            .and(header("Content-Type", "application/ssml+xml"))
            .and(header(
                "X-Microsoft-OutputFormat",
                "audio-16khz-128kbitrate-mono-mp3",
            ))
            .and(body_string_contains("<speak"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let vendor = AzureSpeechVendor::new("audio-16khz-128kbitrate-mono-mp3")
            .unwrap()
            .with_endpoint(server.uri());
        let auth = SpeechAuth {
            key: "secret".into(),
            region: "southeastasia".into(),
        };
        let audio = vendor
            .synthesize("<speak>hello</speak>", "en-US-JennyNeural", &auth)
            .await
            .unwrap();
        assert_eq!(audio.bytes, vec![1, 2, 3]);
        assert_eq!(audio.media_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_vendor_error_maps_to_tts_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let vendor = AzureSpeechVendor::new("audio-16khz-128kbitrate-mono-mp3")
            .unwrap()
            .with_endpoint(server.uri());
        let auth = SpeechAuth {
            key: "wrong".into(),
            region: "southeastasia".into(),
        };
        assert!(matches!(
            vendor.synthesize("<speak/>", "v", &auth).await,
            Err(Error::Tts(_))
        ));
    }
}
