//! Streaming chat-completions backend
//!
//! Both supported providers speak the OpenAI chat-completions protocol;
//! the Groq provider differs only in endpoint and key. Token fragments
//! are forwarded into an `mpsc` channel as they arrive on the SSE stream.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use answerflow_core::{AnswerGenerator, Message, Result};

use crate::LlmError;

/// Generator endpoints and credentials
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub openai_endpoint: String,
    pub openai_api_key: Option<String>,
    pub groq_endpoint: String,
    pub groq_api_key: Option<String>,
    /// Timeout covering the whole streamed response
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            openai_endpoint: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            groq_endpoint: "https://api.groq.com/openai/v1".to_string(),
            groq_api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

struct ResolvedTarget<'a> {
    endpoint: &'a str,
    api_key: Option<&'a str>,
    model: &'a str,
}

impl GeneratorConfig {
    /// Route a localisation model name to its provider.
    fn resolve<'a>(&'a self, model: &'a str) -> ResolvedTarget<'a> {
        match model.strip_prefix("groq/") {
            Some(model) => ResolvedTarget {
                endpoint: &self.groq_endpoint,
                api_key: self.groq_api_key.as_deref(),
                model,
            },
            None => ResolvedTarget {
                endpoint: &self.openai_endpoint,
                api_key: self.openai_api_key.as_deref(),
                model,
            },
        }
    }
}

/// OpenAI-compatible streaming backend
pub struct ChatBackend {
    client: Client,
    config: GeneratorConfig,
}

impl ChatBackend {
    pub fn new(config: GeneratorConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn stream_tokens(
        &self,
        model: &str,
        messages: &[Message],
        tx: &mpsc::Sender<String>,
    ) -> std::result::Result<(), LlmError> {
        let target = self.config.resolve(model);

        let request = ChatRequest {
            model: target.model,
            messages,
            stream: true,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", target.endpoint))
            .json(&request);
        if let Some(key) = target.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let mut stream = response.bytes_stream().eventsource();
        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
            if event.data == "[DONE]" {
                break;
            }

            let chunk: StreamResponse = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable stream event");
                    continue;
                }
            };

            let Some(content) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            else {
                continue;
            };

            if content.is_empty() {
                continue;
            }

            if tx.send(content).await.is_err() {
                // Consumer went away; stop pulling from the provider.
                tracing::debug!("generation consumer dropped, stopping stream");
                return Ok(());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AnswerGenerator for ChatBackend {
    async fn generate_stream(
        &self,
        model: &str,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<()> {
        self.stream_tokens(model, messages, &tx)
            .await
            .map_err(Into::into)
    }
}

// Chat-completions wire types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
