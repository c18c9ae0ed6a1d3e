//! Local filesystem content store.
//!
//! Blobs are sharded two levels deep by digest prefix (`ab/cd/abcd…`) so that
//! no single directory grows unbounded. Writes land in a temporary file first
//! and are renamed into place, so readers never observe partial content.

use super::{BoxSyncRead, ContentStore, validate_hash, verify};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed [`ContentStore`].
///
/// # Examples
///
/// ```no_run
/// use repomd_storage::content::LocalContentStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalContentStore::new("local", "/var/lib/repomd/content")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalContentStore {
    name: String,
    root: PathBuf,
}
impl LocalContentStore {
    /// Create a store rooted at an absolute directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is relative or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
            }
        } else {
            // Only happens once at startup, so not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn blob_path(&self, hash: &str) -> Result<PathBuf> {
        let hash = validate_hash(hash)?;
        Ok(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip(self, data), fields(store = %self.name, size = data.len()))]
    async fn store(&self, hash: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(hash)?;
        verify(hash, data)?;
        if fs::try_exists(&path).await.map_err(ErrorKind::Io)? {
            tracing::debug!("content already stored");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let temp = path.with_extension(format!("partial-{}", TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
        fs::write(&temp, data).await.map_err(|e| Self::map_io_error(e, &temp))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            exn::bail!(Self::map_io_error(e, &path));
        }
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<BoxSyncRead> {
        let path = self.blob_path(hash)?;
        let file = fs::File::open(&path).await.map_err(|_| ErrorKind::NotFound(hash.to_string()))?;
        Ok(Box::new(std::io::BufReader::new(file.into_std().await)))
    }

    async fn load_bytes(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(hash)?;
        Ok(fs::read(&path).await.map_err(|_| ErrorKind::NotFound(hash.to_string()))?)
    }

    async fn exists(&self, hash: &str) -> Result<bool> {
        let path = self.blob_path(hash)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha256_hex;
    use std::io::Read;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalContentStore::new("local", temp_dir.path()).is_ok());
        assert!(LocalContentStore::new("local", "relative/path").is_err());
    }

    #[test]
    fn test_blob_path_is_sharded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new("local", temp_dir.path()).unwrap();
        let hash = sha256_hex(b"");
        let expected = temp_dir.path().join("e3").join("b0").join(&hash);
        assert_eq!(store.blob_path(&hash).unwrap(), expected);
        assert!(store.blob_path("../../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new("local", temp_dir.path()).unwrap();
        let data = b"<metadata packages=\"0\"/>";
        let hash = sha256_hex(data);
        assert!(!store.exists(&hash).await.unwrap());
        store.store(&hash, data).await.unwrap();
        assert!(store.exists(&hash).await.unwrap());
        assert_eq!(store.load_bytes(&hash).await.unwrap(), data);
        let mut buffer = Vec::new();
        store.load(&hash).await.unwrap().read_to_end(&mut buffer).unwrap();
        assert_eq!(buffer, data);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new("local", temp_dir.path()).unwrap();
        let hash = sha256_hex(b"abc");
        store.store(&hash, b"abc").await.unwrap();
        store.store(&hash, b"abc").await.unwrap();
        assert_eq!(store.load_bytes(&hash).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_store_rejects_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new("local", temp_dir.path()).unwrap();
        let err = store.store(&sha256_hex(b"abc"), b"abd").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::HashMismatch { .. }));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new("local", temp_dir.path()).unwrap();
        let err = store.load_bytes(&sha256_hex(b"missing")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
