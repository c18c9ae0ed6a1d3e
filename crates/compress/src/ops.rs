//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Catalog documents are rewritten on every package upload, so these sit in the
// middle of each format's range rather than at the maximum.
const BZIP2_LEVEL: BzCompression = BzCompression::new(6);
const GZIP_LEVEL: GzCompression = GzCompression::new(6);
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 6;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 10;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use repomd_compress::Compression;
    ///
    /// let xml = b"<metadata packages=\"0\"/>";
    /// let compressed = Compression::Gzip.compress(xml).unwrap();
    /// assert!(Compression::Gzip.check_magic_bytes(&compressed));
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use repomd_compress::Compression;
    ///
    /// let xml = b"<otherdata packages=\"0\"/>";
    /// let compressed = Compression::Bzip2.compress(xml).unwrap();
    /// assert_eq!(Compression::Bzip2.decompress(&compressed).unwrap(), xml);
    /// ```
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompress_reader(input)
    }

    #[instrument(level = "debug", skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut *output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut *output, GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "xz")]
            Compression::Xz => {
                let mut encoder = XzEncoder::new(&mut *output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut *output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        tracing::Span::current().record("output_size", output.len());
        Ok(output.len())
    }

    /// Fully decode everything `reader` yields.
    ///
    /// This is the path taken for documents loaded from a content store,
    /// which hands out a [`Read`] rather than a buffer.
    #[instrument(level = "debug", skip(reader), fields(format = %self, output_size))]
    pub fn decompress_reader<R: Read>(&self, reader: R) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.wrap_reader(reader)?.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use repomd_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"<filelists/>").unwrap();
    /// let mut reader = Compression::Gzip.wrap_reader(Cursor::new(compressed)).unwrap();
    /// let mut xml = String::new();
    /// reader.read_to_string(&mut xml).unwrap();
    /// assert_eq!(xml, "<filelists/>");
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }
}
