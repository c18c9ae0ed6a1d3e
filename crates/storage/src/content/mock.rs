//! In-memory content store for testing.

use super::{BoxSyncRead, ContentStore, validate_hash, verify};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::sync::RwLock;

/// In-memory [`ContentStore`] for testing.
///
/// # Examples
///
/// ```
/// use repomd_storage::content::MockContentStore;
/// use repomd_storage::{ContentStore, sha256_hex};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockContentStore::default();
/// let hash = sha256_hex(b"data");
/// store.store(&hash, b"data").await.unwrap();
/// assert_eq!(store.load_bytes(&hash).await.unwrap(), b"data");
/// # }
/// ```
#[derive(Default)]
pub struct MockContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MockContentStore {
    /// Number of distinct blobs stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MockContentStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn store(&self, hash: &str, data: &[u8]) -> Result<()> {
        let hash = validate_hash(hash)?;
        verify(hash, data)?;
        self.blobs.write().await.entry(hash.to_string()).or_insert_with(|| data.to_vec());
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<BoxSyncRead> {
        Ok(Box::new(Cursor::new(self.load_bytes(hash).await?)))
    }

    async fn load_bytes(&self, hash: &str) -> Result<Vec<u8>> {
        let hash = validate_hash(hash)?;
        let blobs = self.blobs.read().await;
        match blobs.get(hash) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(hash.to_string())),
        }
    }

    async fn exists(&self, hash: &str) -> Result<bool> {
        let hash = validate_hash(hash)?;
        Ok(self.blobs.read().await.contains_key(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha256_hex;

    #[tokio::test]
    async fn test_store_dedupes() {
        let store = MockContentStore::default();
        let hash = sha256_hex(b"one");
        store.store(&hash, b"one").await.unwrap();
        store.store(&hash, b"one").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.exists(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let store = MockContentStore::default();
        let err = store.load_bytes(&sha256_hex(b"none")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
