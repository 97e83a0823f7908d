//! HTTP validator client

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;

use answerflow_core::{
    ChatTurn, Result, TranscriptValidator, ValidationOutcome, ValidatorPrompts,
};

use crate::ValidationError;

/// Client for the remote validator service
pub struct HttpValidator {
    client: Client,
    endpoint: String,
}

impl HttpValidator {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, ValidationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ValidationError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn call(
        &self,
        request: &ValidateRequest<'_>,
    ) -> std::result::Result<ValidationOutcome, ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::Configuration(
                "validator endpoint not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ValidationError::Api(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<ValidationOutcome>()
            .await
            .map_err(|e| ValidationError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TranscriptValidator for HttpValidator {
    async fn validate(
        &self,
        prompts: &ValidatorPrompts,
        language: &str,
        transcript: &str,
        audio: Option<&[u8]>,
        history: &[ChatTurn],
    ) -> Result<ValidationOutcome> {
        let request = ValidateRequest {
            system_prompt: &prompts.system_prompt,
            transcript_prompt: &prompts.transcript_prompt,
            language,
            transcript,
            audio: audio.map(|bytes| BASE64.encode(bytes)),
            chat_history: history,
        };

        let outcome = self.call(&request).await?;
        tracing::debug!(
            language,
            keywords = outcome.keywords.len(),
            with_audio = audio.is_some(),
            "transcript validated"
        );
        Ok(outcome)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    system_prompt: &'a str,
    transcript_prompt: &'a str,
    language: &'a str,
    transcript: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
    chat_history: &'a [ChatTurn],
}
