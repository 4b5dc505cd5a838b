//! In-memory pending work queue ordered by priority

use async_trait::async_trait;
use berth_core::{BerthResult, QueueEntry};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::traits::PendingQueue;

/// Ordering key: priority first, then insertion sequence
type SlotKey = (i64, u64);

#[derive(Default)]
struct QueueInner {
    ordered: BTreeMap<SlotKey, Uuid>,
    index: HashMap<Uuid, SlotKey>,
    next_seq: u64,
}

/// Pending queue keyed by deployment id
///
/// Equal priorities drain in first-enqueue order. Re-enqueueing an id keeps
/// its original sequence number and only updates the priority.
#[derive(Default)]
pub struct MemoryQueue {
    inner: RwLock<QueueInner>,
}

impl MemoryQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingQueue for MemoryQueue {
    async fn enqueue(&self, deployment_id: Uuid, priority: i64) -> BerthResult<()> {
        let mut inner = self.inner.write().await;

        let seq = match inner.index.get(&deployment_id).copied() {
            Some(old) => {
                inner.ordered.remove(&old);
                old.1
            }
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            }
        };

        inner.ordered.insert((priority, seq), deployment_id);
        inner.index.insert(deployment_id, (priority, seq));

        debug!(deployment_id = %deployment_id, priority, seq, "Enqueued deployment");
        Ok(())
    }

    async fn drain_ordered(&self) -> BerthResult<Vec<QueueEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered
            .iter()
            .map(|(&(priority, seq), &deployment_id)| QueueEntry {
                deployment_id,
                priority,
                seq,
            })
            .collect())
    }

    async fn remove(&self, deployment_id: Uuid) -> BerthResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.index.remove(&deployment_id) {
            Some(key) => {
                inner.ordered.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn restore(&self, entry: QueueEntry) -> BerthResult<()> {
        let mut inner = self.inner.write().await;

        if let Some(current) = inner.index.remove(&entry.deployment_id) {
            inner.ordered.remove(&current);
        }

        let key = (entry.priority, entry.seq);
        inner.ordered.insert(key, entry.deployment_id);
        inner.index.insert(entry.deployment_id, key);
        if inner.next_seq <= entry.seq {
            inner.next_seq = entry.seq + 1;
        }
        Ok(())
    }

    async fn len(&self) -> BerthResult<usize> {
        Ok(self.inner.read().await.index.len())
    }
}
