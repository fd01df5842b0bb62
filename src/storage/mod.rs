//! Object storage for uploaded document files.
//!
//! The core only needs a small interface: save, read, delete, exists.
//! The default backend writes under the app upload directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::errors::ApiError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key`, returning the key.
    async fn save(&self, bytes: &[u8], key: &str) -> Result<String, ApiError>;

    /// Read an object's bytes. Unknown key is an error.
    async fn read(&self, key: &str) -> Result<Vec<u8>, ApiError>;

    /// Delete an object. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool, ApiError>;

    async fn exists(&self, key: &str) -> bool;

    /// Filesystem path for a key, when the backend is file-based.
    /// Extractors read uploads directly from disk.
    fn path_for(&self, key: &str) -> PathBuf;
}

/// Local-disk object store rooted at the upload directory.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn save(&self, bytes: &[u8], key: &str) -> Result<String, ApiError> {
        let path = self.path_for(key);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(ApiError::internal)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to store {}: {}", key, e)))?;
        tracing::debug!("Stored upload {} ({} bytes)", key, bytes.len());
        Ok(key.to_string())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.path_for(key);
        tokio::fs::read(&path)
            .await
            .map_err(|_| ApiError::NotFound(format!("stored object {} not found", key)))
    }

    async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ApiError::internal(e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_delete_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        let key = store.save(b"hello", "abc.pdf").await.unwrap();
        assert_eq!(key, "abc.pdf");
        assert!(store.exists("abc.pdf").await);
        assert_eq!(store.read("abc.pdf").await.unwrap(), b"hello");

        assert!(store.delete("abc.pdf").await.unwrap());
        assert!(!store.exists("abc.pdf").await);
        assert!(!store.delete("abc.pdf").await.unwrap());
        assert!(matches!(
            store.read("abc.pdf").await,
            Err(ApiError::NotFound(_))
        ));
    }
}
