//! In-memory node store for testing.

use super::{NodeStream, is_listed, normalise_prefix};
use crate::NodeStore;
use crate::error::{ErrorKind, Result};
use crate::node::{Expect, NewNode, Node};
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use time::{Duration, UtcDateTime};
use tokio::sync::RwLock;

/// Node store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    List,
    Create,
    Delete,
}

/// In-memory node store for testing.
///
/// Nodes live in a `BTreeMap` behind a [`RwLock`]. Creation timestamps are
/// strictly increasing so that "most recently created" is always well
/// defined, even for writes within the same clock tick.
///
/// Failures can be injected per [`Operation`] for paths containing a given
/// pattern, to exercise error paths of callers.
///
/// # Examples
///
/// ```
/// use repomd_storage::nodes::{MockNodeStore, Operation};
/// use repomd_storage::{NewNode, NodeStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockNodeStore::default();
/// store.create(NewNode::new("p/r/a.rpm", "00", 1)).await.unwrap();
/// store.fail(Operation::Delete, "a.rpm");
/// assert!(store.delete("p/r/a.rpm").await.is_err());
/// # }
/// ```
#[derive(Default)]
pub struct MockNodeStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    clock: Mutex<Option<UtcDateTime>>,
    failures: Mutex<Vec<(Operation, String)>>,
}

impl MockNodeStore {
    /// Make every `operation` on a path containing `pattern` fail with
    /// [`Unavailable`](ErrorKind::Unavailable).
    pub fn fail(&self, operation: Operation, pattern: impl Into<String>) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).push((operation, pattern.into()));
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Every stored path, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.nodes.read().await.keys().cloned().collect()
    }

    fn check(&self, operation: Operation, path: &str) -> Result<()> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if failures.iter().any(|(op, pattern)| *op == operation && path.contains(pattern.as_str())) {
            exn::bail!(ErrorKind::Unavailable(format!("injected {operation:?} failure for {path}")));
        }
        Ok(())
    }

    fn tick(&self) -> UtcDateTime {
        let mut last = self.clock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = UtcDateTime::now();
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::nanoseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

#[async_trait]
impl NodeStore for MockNodeStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get(&self, path: &str) -> Result<Option<Node>> {
        let path = validate_path(path)?;
        self.check(Operation::Get, &path)?;
        Ok(self.nodes.read().await.get(&path).cloned())
    }

    fn list_stream<'a>(&'a self, prefix: &'a str, recursive: bool) -> NodeStream<'a> {
        let prefix = match normalise_prefix(prefix).and_then(|p| self.check(Operation::List, &p).map(|()| p)) {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let listed: Vec<Node> = {
                let guard = self.nodes.read().await;
                guard.values().filter(|node| is_listed(&node.full_path, &prefix, recursive)).cloned().collect()
            };
            for node in listed {
                yield Ok(node);
            }
        })
    }

    async fn create(&self, request: NewNode) -> Result<Node> {
        let path = validate_path(&request.full_path)?;
        self.check(Operation::Create, &path)?;
        let mut guard = self.nodes.write().await;
        let current = guard.get(&path);
        if !request.expect.holds(current) {
            exn::bail!(ErrorKind::Conflict(path));
        }
        let revision = current.map_or(1, |node| node.revision + 1);
        let node = NewNode { full_path: path.clone(), ..request }.into_node(self.tick(), revision);
        guard.insert(path, node.clone());
        Ok(node)
    }

    async fn delete_expecting(&self, path: &str, expect: Expect) -> Result<()> {
        let path = validate_path(path)?;
        self.check(Operation::Delete, &path)?;
        let mut guard = self.nodes.write().await;
        let Some(current) = guard.get(&path) else {
            exn::bail!(ErrorKind::NotFound(path));
        };
        if !expect.holds(Some(current)) {
            exn::bail!(ErrorKind::Conflict(path));
        }
        guard.remove(&path);
        Ok(())
    }
}
