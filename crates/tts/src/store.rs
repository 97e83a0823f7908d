//! Object store implementations backing the audio cache

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;

use answerflow_core::{Error, ObjectStore, Result, StoredObject};

use crate::audio_cache::extension_for_media_type;

/// In-memory store for development and tests
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.get(key).map(|entry| entry.clone()))
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<()> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                media_type: media_type.to_string(),
            },
        );
        Ok(())
    }
}

/// Filesystem store; keys map directly to paths under the root.
///
/// The media type is recovered from the key extension on read, so no
/// sidecar metadata is needed.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(Error::Internal(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

fn media_type_for_extension(path: &std::path::Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                bytes,
                media_type: media_type_for_extension(&path),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Internal(format!(
                "object read failed at {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        debug_assert_eq!(
            path.extension().and_then(|e| e.to_str()),
            Some(extension_for_media_type(media_type)),
            "key extension should match the stored media type"
        );

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Internal(format!("object dir create failed at {}: {e}", parent.display()))
            })?;
        }

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            Error::Internal(format!("object write failed at {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = MemoryObjectStore::new();
        assert!(store.get("a/b/c.mp3").await.unwrap().is_none());

        store.put("a/b/c.mp3", &[1, 2], "audio/mpeg").await.unwrap();
        let object = store.get("a/b/c.mp3").await.unwrap().unwrap();
        assert_eq!(object.bytes, vec![1, 2]);
        assert_eq!(object.media_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_memory_last_writer_wins() {
        let store = MemoryObjectStore::new();
        store.put("k.mp3", &[1], "audio/mpeg").await.unwrap();
        store.put("k.mp3", &[2], "audio/mpeg").await.unwrap();
        assert_eq!(store.get("k.mp3").await.unwrap().unwrap().bytes, vec![2]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store
            .put("en-US/voice/abc.mp3", &[9, 9], "audio/mpeg")
            .await
            .unwrap();
        let object = store.get("en-US/voice/abc.mp3").await.unwrap().unwrap();
        assert_eq!(object.bytes, vec![9, 9]);
        assert_eq!(object.media_type, "audio/mpeg");

        assert!(store.get("en-US/voice/missing.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.get("../escape.mp3").await.is_err());
    }
}
