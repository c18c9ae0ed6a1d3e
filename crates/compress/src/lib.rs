//! Compression codecs for repository catalog documents.
//!
//! yum-style clients accept catalog documents (`primary`, `filelists`,
//! `other`) in several compressed encodings, advertised through the file
//! extension of the document's location in `repomd.xml`. This crate wraps
//! those encodings behind a single [`Compression`] enum, providing:
//!
//! - **Format detection** from file names ([`Compression::from_path`]) or
//!   magic bytes ([`Compression::from_magic_bytes`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Streaming** decoders ([`Compression::wrap_reader`]) for documents
//!   loaded from a content store
//!
//! Gzip and Bzip2 are always available. XZ and Zstd are behind the `xz` and
//! `zstd` feature flags.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported compression format.
///
/// Defaults to [`Gzip`](Self::Gzip), the encoding every yum/dnf client
/// understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    #[default]
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}
