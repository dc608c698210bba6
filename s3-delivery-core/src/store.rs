//! Filesystem-backed [`ObjectStore`]: keys become paths under a root directory.
//!
//! Useful for staging a delivery on a shared drive and for exercising the
//! pipeline end to end without a bucket.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::contract::{ObjectStore, StoredObject};
use crate::error::TransferError;

#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where `key` is stored on disk.
    pub fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn put_file(&self, local_path: &Path, key: &str) -> Result<StoredObject, TransferError> {
        // Source problems are read errors; anything after that is on the store side.
        tokio::fs::File::open(local_path)
            .await
            .map_err(|e| TransferError::read(local_path, e))?;

        let target = self.object_path(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::store(key, e))?;
        }
        let bytes = tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| TransferError::store(key, e))?;
        debug!(key, target = %target.display(), bytes, "Stored object on local disk");
        Ok(StoredObject {
            key: key.to_string(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const KEY: &str = "delivery/dataset=winistry/status=staged/delivery-date=2025-03-07/a.csv";

    #[tokio::test]
    async fn missing_source_is_a_read_error() {
        let bucket = tempdir().unwrap();
        let store = LocalDirStore::new(bucket.path());
        let missing = bucket.path().join("nope.csv");

        let err = store.put_file(&missing, KEY).await.unwrap_err();

        match err {
            TransferError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("expected a read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unwritable_destination_is_a_store_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.csv");
        fs::write(&source, "a\n1\n").unwrap();
        let bucket = tempdir().unwrap();
        let store = LocalDirStore::new(bucket.path());
        // A directory where the object file should go.
        fs::create_dir_all(store.object_path(KEY)).unwrap();

        let err = store.put_file(&source, KEY).await.unwrap_err();

        match err {
            TransferError::Store { key, .. } => assert_eq!(key, KEY),
            other => panic!("expected a store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocked_parent_directory_is_a_store_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.csv");
        fs::write(&source, "a\n").unwrap();
        let bucket = tempdir().unwrap();
        fs::write(bucket.path().join("delivery"), "not a directory").unwrap();
        let store = LocalDirStore::new(bucket.path());

        let err = store.put_file(&source, KEY).await.unwrap_err();

        assert!(matches!(err, TransferError::Store { .. }), "{err:?}");
    }
}
