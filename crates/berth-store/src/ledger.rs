//! In-memory resource ledger tracking per-cluster capacity

use async_trait::async_trait;
use berth_core::{BerthError, BerthResult, Cluster, Resources};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::traits::Ledger;

/// Ledger that keeps cluster counters behind a single lock
///
/// The write lock is held across check and debit, so a reservation is one
/// indivisible step with respect to every other ledger operation.
#[derive(Default)]
pub struct MemoryLedger {
    /// Clusters indexed by ID
    clusters: RwLock<HashMap<Uuid, Cluster>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of registered clusters
    pub async fn cluster_count(&self) -> usize {
        self.clusters.read().await.len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn register(&self, cluster: Cluster) -> BerthResult<()> {
        cluster.check_invariant()?;

        let mut clusters = self.clusters.write().await;
        if clusters.contains_key(&cluster.id) {
            return Err(BerthError::InvalidRequest(format!(
                "cluster {} already registered",
                cluster.id
            )));
        }

        debug!(cluster_id = %cluster.id, name = %cluster.name, total = %cluster.total, "Registered cluster");
        clusters.insert(cluster.id, cluster);
        Ok(())
    }

    async fn get(&self, cluster_id: Uuid) -> BerthResult<Option<Cluster>> {
        Ok(self.clusters.read().await.get(&cluster_id).cloned())
    }

    async fn list(&self) -> BerthResult<Vec<Cluster>> {
        let clusters = self.clusters.read().await;
        let mut list: Vec<Cluster> = clusters.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn try_reserve(&self, cluster_id: Uuid, requested: &Resources) -> BerthResult<bool> {
        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .get_mut(&cluster_id)
            .ok_or_else(|| BerthError::ClusterNotFound(cluster_id.to_string()))?;

        cluster.check_invariant()?;

        if !requested.fits_within(&cluster.available) {
            return Ok(false);
        }

        match cluster.available.checked_sub(requested) {
            Some(remaining) => {
                cluster.available = remaining;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release(&self, cluster_id: Uuid, reserved: &Resources) -> BerthResult<()> {
        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .get_mut(&cluster_id)
            .ok_or_else(|| BerthError::ClusterNotFound(cluster_id.to_string()))?;

        let restored = cluster
            .available
            .checked_add(reserved)
            .filter(|r| r.fits_within(&cluster.total))
            .ok_or_else(|| {
                BerthError::LedgerCorruption(format!(
                    "cluster {}: releasing {} onto available {} exceeds total {}",
                    cluster_id, reserved, cluster.available, cluster.total
                ))
            })?;

        cluster.available = restored;
        debug!(cluster_id = %cluster_id, released = %reserved, "Released reservation");
        Ok(())
    }
}
