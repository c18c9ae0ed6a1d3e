//! Background deletion of superseded index nodes.
//!
//! Submissions go onto an unbounded queue and never block. A single
//! dispatcher task drains the queue, running at most `workers` deletions at
//! a time. Failures are logged and dropped: a surplus node that survives only
//! wastes space, and the next commit to the same index root will offer it
//! again.

use crate::error::ErrorKind;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use repomd_storage::error::ErrorKind as StorageErrorKind;
use repomd_storage::{Expect, Node, NodeHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc};

/// A node version to delete.
///
/// Deletion only goes ahead while the node is still at `revision`; a node
/// rewritten since it was superseded is live again and is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurplusNode {
    pub path: String,
    pub revision: u64,
}

impl From<&Node> for SurplusNode {
    fn from(node: &Node) -> Self {
        Self { path: node.full_path.clone(), revision: node.revision }
    }
}

struct State {
    pending: AtomicUsize,
    idle: Notify,
}

/// Handle to the cleaner's worker pool. Cheap to clone.
///
/// The dispatcher stops once every handle is dropped and the queue has
/// drained.
#[derive(Clone)]
pub struct SurplusCleaner {
    sender: mpsc::UnboundedSender<SurplusNode>,
    state: Arc<State>,
}

impl SurplusCleaner {
    /// Start the dispatcher on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn spawn(nodes: NodeHandle, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(State { pending: AtomicUsize::new(0), idle: Notify::new() });
        tokio::spawn(dispatch(nodes, receiver, state.clone(), workers.max(1)));
        Self { sender, state }
    }

    /// Queue nodes for deletion and return immediately.
    pub fn submit(&self, surplus: impl IntoIterator<Item = SurplusNode>) {
        for node in surplus {
            self.state.pending.fetch_add(1, Ordering::AcqRel);
            if let Err(rejected) = self.sender.send(node) {
                self.finish_one();
                tracing::warn!(path = %rejected.0.path, "surplus cleaner has stopped; node left in place");
            }
        }
    }

    /// Deletions queued or in flight.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Wait until every submitted deletion has finished.
    pub async fn quiesce(&self) {
        loop {
            let mut notified = std::pin::pin!(self.state.idle.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn finish_one(&self) {
        finish_one(&self.state);
    }
}

fn finish_one(state: &State) {
    if state.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        state.idle.notify_waiters();
    }
}

async fn dispatch(
    nodes: NodeHandle,
    mut receiver: mpsc::UnboundedReceiver<SurplusNode>,
    state: Arc<State>,
    workers: usize,
) {
    let mut running = FuturesUnordered::new();
    let mut open = true;
    loop {
        tokio::select! {
            received = receiver.recv(), if open && running.len() < workers => match received {
                Some(surplus) => running.push(delete(nodes.clone(), surplus)),
                None => open = false,
            },
            Some(()) = running.next(), if !running.is_empty() => finish_one(&state),
            else => break,
        }
    }
    tracing::debug!("surplus cleaner stopped");
}

async fn delete(nodes: NodeHandle, surplus: SurplusNode) {
    match nodes.delete_expecting(&surplus.path, Expect::Revision(surplus.revision)).await {
        Ok(()) => tracing::debug!(path = %surplus.path, "deleted surplus node"),
        Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
            tracing::debug!(path = %surplus.path, "surplus node already gone");
        },
        Err(e) if matches!(&*e, StorageErrorKind::Conflict(_)) => {
            tracing::debug!(path = %surplus.path, "surplus node was rewritten; keeping it");
        },
        Err(e) => {
            let error = e.raise(ErrorKind::Cleanup(surplus.path.clone()));
            tracing::warn!(path = %surplus.path, error = ?error, "surplus node cleanup failed");
        },
    }
}
