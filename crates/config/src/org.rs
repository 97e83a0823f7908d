//! Organisation configuration store
//!
//! Each organisation + configuration id pair resolves to an [`OrgConfig`]
//! document. The production deployment loads these from a managed table;
//! that client lives behind [`OrgConfigStore`], and the bundled
//! [`FileOrgStore`] serves JSON documents from disk for development and
//! tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use answerflow_core::{Error, OrgConfig, Result};

/// Loads organisation configuration documents.
#[async_trait]
pub trait OrgConfigStore: Send + Sync {
    async fn load(&self, org_id: &str, config_id: &str) -> Result<Arc<OrgConfig>>;
}

/// File-backed store reading `{dir}/{org_id}/{config_id}.json`.
///
/// Documents are cached on first load; edit-and-reload is a restart
/// concern, not a runtime one.
pub struct FileOrgStore {
    dir: PathBuf,
    cache: DashMap<String, Arc<OrgConfig>>,
}

impl FileOrgStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    fn document_path(&self, org_id: &str, config_id: &str) -> Result<PathBuf> {
        // Ids come straight from the request body; refuse anything that
        // could escape the configured directory.
        for id in [org_id, config_id] {
            if id.contains(['/', '\\', '.']) {
                return Err(Error::BadRequest(format!("invalid identifier: {id}")));
            }
        }
        Ok(self.dir.join(org_id).join(format!("{config_id}.json")))
    }
}

#[async_trait]
impl OrgConfigStore for FileOrgStore {
    async fn load(&self, org_id: &str, config_id: &str) -> Result<Arc<OrgConfig>> {
        let key = format!("{org_id}/{config_id}");
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let path = self.document_path(org_id, config_id)?;
        let body = tokio::fs::read(&path).await.map_err(|e| {
            Error::Config(format!(
                "organisation config {key} not readable at {}: {e}",
                path.display()
            ))
        })?;

        let config: OrgConfig = serde_json::from_slice(&body)
            .map_err(|e| Error::Config(format!("organisation config {key} is malformed: {e}")))?;

        let config = Arc::new(config);
        self.cache.insert(key.clone(), config.clone());
        tracing::debug!(org_id, config_id, "loaded organisation config");
        Ok(config)
    }
}
