//! Seam to the package byte parser.

use crate::error::Result;
use crate::models::PackageMetadata;

/// Extracts catalog metadata from the bytes of an uploaded package.
///
/// Reading RPM headers is left to implementations. Any error returned is
/// reported to the uploader as a format error, and nothing is stored.
pub trait PackageParser: Send + Sync {
    fn parse(&self, path: &str, bytes: &[u8]) -> Result<PackageMetadata>;
}

impl<F> PackageParser for F
where
    F: Fn(&str, &[u8]) -> Result<PackageMetadata> + Send + Sync,
{
    fn parse(&self, path: &str, bytes: &[u8]) -> Result<PackageMetadata> {
        self(path, bytes)
    }
}
