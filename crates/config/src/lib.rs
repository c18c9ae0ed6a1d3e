//! Configuration for the repomd index engine.
//!
//! Configuration is layered with [`figment`]: built-in defaults, then an
//! optional TOML, YAML or JSON file, then `REPOMD_` prefixed environment
//! variables (with `__` separating nested keys, e.g.
//! `REPOMD_MERGE__MAX_ATTEMPTS=16`).
//!
//! ```toml
//! timeout_secs = 30
//!
//! [cleaner]
//! workers = 4
//!
//! [repositories."centos/base"]
//! index_depth = 2
//! include_file_lists = true
//! group_documents = ["comps.xml"]
//! compression = "gzip"
//! ```

pub mod error;
mod load;

pub use crate::load::{default_path, load};
use crate::error::{ErrorKind, Result};
use repomd_compress::Compression;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-repository settings, keyed `project/repo`.
    pub repositories: BTreeMap<String, RepositoryConfig>,
    pub cleaner: CleanerConfig,
    pub merge: MergeConfig,
    pub cache: CacheConfig,
    /// Deadline for a single upload or removal, unless the request overrides it.
    pub timeout_secs: u64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            repositories: BTreeMap::new(),
            cleaner: CleanerConfig::default(),
            merge: MergeConfig::default(),
            cache: CacheConfig::default(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Settings of the repository `project/repo`, if configured.
    pub fn repository(&self, project: &str, repo: &str) -> Option<&RepositoryConfig> {
        self.repositories.get(&format!("{project}/{repo}"))
    }

    /// Check ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        positive("timeout_secs", self.timeout_secs)?;
        positive("cleaner.workers", self.cleaner.workers as u64)?;
        positive("merge.workers", self.merge.workers as u64)?;
        positive("merge.max_attempts", u64::from(self.merge.max_attempts))?;
        positive("cache.capacity", self.cache.capacity)?;
        positive("cache.ttl_secs", self.cache.ttl_secs)?;
        for (key, repository) in &self.repositories {
            let field = format!("repositories.{key}");
            match key.split_once('/') {
                Some((project, repo)) if !project.is_empty() && !repo.is_empty() && !repo.contains('/') => {},
                _ => exn::bail!(ErrorKind::invalid(field, "key must be of the form `project/repo`")),
            }
            repository.validate(&field)?;
        }
        Ok(())
    }
}

fn positive(field: &str, value: u64) -> Result<()> {
    match value {
        0 => exn::bail!(ErrorKind::invalid(field, "must be greater than zero")),
        _ => Ok(()),
    }
}

/// Catalog settings of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Number of leading path segments that form an index root.
    pub index_depth: usize,
    /// Whether `filelists` documents are maintained.
    pub include_file_lists: bool,
    /// Names of uploaded group documents to advertise in the manifest.
    pub group_documents: BTreeSet<String>,
    /// Encoding of stored catalog documents.
    #[serde(deserialize_with = "compression_from_str")]
    pub compression: Compression,
}
impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            index_depth: 0,
            include_file_lists: true,
            group_documents: BTreeSet::new(),
            compression: Compression::Gzip,
        }
    }
}

impl RepositoryConfig {
    fn validate(&self, field: &str) -> Result<()> {
        if self.compression == Compression::None {
            exn::bail!(ErrorKind::invalid(format!("{field}.compression"), "catalog documents must be compressed"));
        }
        for name in &self.group_documents {
            if name.is_empty() || name.contains('/') || !name.ends_with(".xml") {
                exn::bail!(ErrorKind::invalid(
                    format!("{field}.group_documents"),
                    format!("`{name}` is not an XML file name")
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Concurrent surplus node deletions.
    pub workers: usize,
}
impl Default for CleanerConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Catalog merges allowed on the blocking pool at once.
    pub workers: usize,
    /// Merge attempts per operation before giving up on a contended index root.
    pub max_attempts: u32,
}
impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZero::get),
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached repository configurations.
    pub capacity: u64,
    pub ttl_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1024, ttl_secs: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn compression_from_str<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Compression, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(|e: repomd_compress::error::Error| serde::de::Error::custom(&*e))
}
