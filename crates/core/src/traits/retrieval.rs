//! Knowledge-management retrieval contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Response of a KM search; also the payload of the `km_result` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KmSearchResult {
    #[serde(default)]
    pub data: Vec<KmHit>,
    #[serde(default)]
    pub total: i64,
}

/// One scored document hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmHit {
    pub document_id: String,
    pub document: KmDocument,
    #[serde(default)]
    pub reranker_score: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmDocument {
    pub id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub public_id: String,
    #[serde(default)]
    pub sample_questions: Vec<String>,
    pub content: String,
}

impl KmSearchResult {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Searches the knowledge base for documents relevant to a query.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str, keywords: &[String]) -> Result<KmSearchResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_wire_names() {
        let json = r#"{
            "documentId": "d1",
            "document": {
                "id": "d1",
                "metadata": {"topic": "billing"},
                "publicId": "pub-1",
                "sampleQuestions": ["how do I pay?"],
                "content": "Pay online."
            },
            "rerankerScore": 0.9,
            "score": 0.8
        }"#;
        let hit: KmHit = serde_json::from_str(json).unwrap();
        assert_eq!(hit.document_id, "d1");
        assert_eq!(hit.document.public_id, "pub-1");
        assert_eq!(hit.reranker_score, Some(0.9));
    }

    #[test]
    fn test_empty_result() {
        let result = KmSearchResult::default();
        assert!(result.is_empty());
        assert_eq!(result.total, 0);
    }
}
