//! Incremental metadata index engine for yum/dnf package repositories.
//!
//! Every index root of a repository carries a `repodata/` directory holding
//! compressed catalog documents (`primary`, `filelists`, `other`), optional
//! group documents, and a `repomd.xml` manifest pointing at the current
//! version of each. This crate keeps those documents consistent with a
//! stream of uploads and removals:
//!
//! - [`resolve`] splits an upload path into index root and catalog location
//! - [`classify`] tells new uploads from duplicates and path collisions
//! - [`IndexUpdater`] merges package records into new document versions and
//!   commits them with a compare-and-swap on the index head
//! - [`ManifestBuilder`] rewrites `repomd.xml` from the committed documents
//! - [`SurplusCleaner`] deletes superseded versions in the background
//! - [`Gateway`] drives all of the above per request
//!
//! Documents are never edited in place: each update stores a new
//! content-addressed version, so readers never observe a partial write.
//!
//! # Architecture
//! Storage is reached through the [`NodeStore`](repomd_storage::NodeStore)
//! and [`ContentStore`](repomd_storage::ContentStore) traits; package bytes
//! are turned into [`PackageMetadata`](models::PackageMetadata) by an
//! injected [`PackageParser`]. Repository settings come from a
//! [`ConfigCache`] over any [`ConfigSource`].

mod cache;
mod classify;
mod cleaner;
pub mod document;
pub mod error;
mod gateway;
mod groups;
mod manifest;
pub mod models;
mod parser;
mod resolve;
mod snapshot;
#[cfg(test)]
mod testing;
mod update;

pub use crate::cache::{ConfigCache, ConfigSource, StaticConfigs};
pub use crate::classify::{Classification, classify};
pub use crate::cleaner::{SurplusCleaner, SurplusNode};
pub use crate::gateway::{DeleteResponse, Gateway, UploadRequest, UploadResponse};
pub use crate::groups::{StoredGroup, store_group};
pub use crate::manifest::{Manifest, ManifestBuilder, ManifestEntry};
pub use crate::parser::PackageParser;
pub use crate::resolve::{Resolution, index_root, resolve};
pub use crate::update::{Commit, IndexUpdater};
