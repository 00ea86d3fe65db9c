//! Content-addressed blob storage
//!
//! Cached asset bodies are stored under their SHA-256 hash so identical
//! files shared by several caches are written once.
//! Files are spread over a two-level directory structure.
//!
//! Example: hash "abcd1234..." is stored at "blobs/ab/cd/abcd1234..."

use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Content-addressed blob store
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root directory if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Blob store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Store `data`, returning its SHA-256 hash
    pub async fn write(&self, data: &[u8]) -> Result<String> {
        let hash = calculate_hash(data);
        let path = self.get_path(&hash)?;

        if path.exists() {
            tracing::debug!("Blob already exists: {}", hash);
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial blob
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Wrote blob: {} ({} bytes)", hash, data.len());

        Ok(hash)
    }

    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.get_path(hash)?;

        if !path.exists() {
            return Err(AppError::BlobStore(format!("Blob not found: {}", hash)));
        }

        let data = fs::read(&path).await?;
        tracing::debug!("Read blob: {} ({} bytes)", hash, data.len());
        Ok(data)
    }

    pub async fn delete(&self, hash: &str) -> Result<()> {
        let path = self.get_path(hash)?;

        if path.exists() {
            fs::remove_file(&path).await?;
            tracing::debug!("Deleted blob: {}", hash);
        }

        Ok(())
    }

    /// Delete every blob whose hash is not in `keep`. Returns the number removed.
    pub async fn prune(&self, keep: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;
        for hash in self.list_all().await? {
            if !keep.contains(&hash) {
                self.delete(&hash).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Pruned {} unreferenced blobs", removed);
        }
        Ok(removed)
    }

    /// List the hashes of all stored blobs
    pub async fn list_all(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            if !dir.exists() {
                continue;
            }

            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if is_valid_hash(name) {
                        hashes.push(name.to_string());
                    }
                }
            }
        }

        Ok(hashes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn get_path(&self, hash: &str) -> Result<PathBuf> {
        if !is_valid_hash(hash) {
            return Err(AppError::BlobStore(format!("Invalid blob hash: {}", hash)));
        }
        Ok(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }
}

/// SHA-256 of `data` as lowercase hex
pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (BlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path().join("blobs"));
        store.initialize().await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, _temp) = create_test_store().await;

        let hash = store.write(b"body { color: red }").await.unwrap();

        assert_eq!(store.read(&hash).await.unwrap(), b"body { color: red }");
    }

    #[tokio::test]
    async fn test_identical_content_shares_hash() {
        let (store, _temp) = create_test_store().await;

        let first = store.write(b"same").await.unwrap();
        let second = store.write(b"same").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_two_level_layout() {
        let (store, _temp) = create_test_store().await;

        let hash = store.write(b"layout").await.unwrap();

        let expected = store.root().join(&hash[0..2]).join(&hash[2..4]).join(&hash);
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_invalid_hash_is_rejected() {
        let (store, _temp) = create_test_store().await;

        assert!(store.delete("ab").await.is_err());
        assert!(store.read("../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_blob_read_fails() {
        let (store, _temp) = create_test_store().await;
        let hash = calculate_hash(b"never written");

        assert!(!store.get_path(&hash).unwrap().exists());
        assert!(matches!(
            store.read(&hash).await,
            Err(AppError::BlobStore(_))
        ));
    }

    #[tokio::test]
    async fn test_prune_keeps_referenced() {
        let (store, _temp) = create_test_store().await;

        let keep = store.write(b"keep").await.unwrap();
        let drop = store.write(b"drop").await.unwrap();

        let removed = store
            .prune(&HashSet::from([keep.clone()]))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.get_path(&keep).unwrap().exists());
        assert!(!store.get_path(&drop).unwrap().exists());
    }
}
