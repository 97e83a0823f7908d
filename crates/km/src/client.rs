//! HTTP KM search client

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use answerflow_core::{KmSearchResult, KnowledgeSearch, Result};

use crate::KmError;

/// Client for the KM retrieval backend
pub struct HttpKnowledgeSearch {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpKnowledgeSearch {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
    ) -> std::result::Result<Self, KmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| KmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    async fn call(
        &self,
        request: &SearchRequest<'_>,
    ) -> std::result::Result<KmSearchResult, KmError> {
        if self.endpoint.is_empty() {
            return Err(KmError::Configuration(
                "km endpoint not configured".to_string(),
            ));
        }

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KmError::Api(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<KmSearchResult>()
            .await
            .map_err(|e| KmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl KnowledgeSearch for HttpKnowledgeSearch {
    async fn search(&self, query: &str, keywords: &[String]) -> Result<KmSearchResult> {
        let request = SearchRequest { query, keywords };
        let result = self.call(&request).await?;
        tracing::debug!(
            total = result.total,
            returned = result.data.len(),
            "km search completed"
        );
        Ok(result)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    keywords: &'a [String],
}
