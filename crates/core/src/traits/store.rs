//! Object storage contract backing the audio cache

use async_trait::async_trait;

use crate::error::Result;

/// A stored blob and its media type
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Flat-namespace blob store.
///
/// Keys are opaque strings; concurrent `put` on the same key is
/// last-writer-wins.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;
    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<()>;
}
