//! Content store trait and implementations.
//!
//! Content is immutable and addressed by the lowercase hex SHA-256 digest of
//! its bytes. Storing the same bytes twice is a no-op.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalContentStore;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockContentStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::io::Read;

/// Synchronous reader over stored content, suitable for handing to blocking
/// decoders on a worker thread.
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;

/// Blob store keyed by SHA-256 digest.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Store `data` under `hash`.
    ///
    /// Returns [`InvalidHash`](ErrorKind::InvalidHash) when `hash` is not a
    /// digest and [`HashMismatch`](ErrorKind::HashMismatch) when `data` does
    /// not hash to it.
    async fn store(&self, hash: &str, data: &[u8]) -> Result<()>;

    /// Open stored content for reading.
    async fn load(&self, hash: &str) -> Result<BoxSyncRead>;

    /// Read stored content fully into memory.
    async fn load_bytes(&self, hash: &str) -> Result<Vec<u8>> {
        let mut reader = self.load(hash).await?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).map_err(ErrorKind::Io)?;
        Ok(buffer)
    }

    async fn exists(&self, hash: &str) -> Result<bool>;
}

/// Check that `hash` looks like a lowercase hex SHA-256 digest.
pub fn validate_hash(hash: &str) -> Result<&str> {
    match hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        true => Ok(hash),
        false => exn::bail!(ErrorKind::InvalidHash(hash.to_string())),
    }
}

/// Check that `data` hashes to `hash`.
pub(crate) fn verify(hash: &str, data: &[u8]) -> Result<()> {
    let actual = crate::sha256_hex(data);
    if actual != hash {
        exn::bail!(ErrorKind::HashMismatch { expected: hash.to_string(), actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[rstest]
    #[case::empty_digest(EMPTY, true)]
    #[case::uppercase("E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855", false)]
    #[case::short("e3b0c442", false)]
    #[case::traversal("../../../../../../../../../../../../../../../../../../../../etc/pw", false)]
    #[case::blank("", false)]
    fn test_validate_hash(#[case] hash: &str, #[case] valid: bool) {
        assert_eq!(validate_hash(hash).is_ok(), valid);
    }

    #[test]
    fn test_verify() {
        assert!(verify(EMPTY, b"").is_ok());
        let err = verify(EMPTY, b"x").unwrap_err();
        assert!(matches!(&*err, ErrorKind::HashMismatch { .. }));
    }
}
