//! Storage trait definitions

use async_trait::async_trait;
use berth_core::{BerthResult, Cluster, Deployment, DeploymentState, QueueEntry, Resources};
use uuid::Uuid;

/// Per-cluster capacity counters
///
/// `try_reserve` is the only operation that lowers availability.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Register a cluster; fails if its counters already violate the invariant
    async fn register(&self, cluster: Cluster) -> BerthResult<()>;

    /// Look up a cluster by id
    async fn get(&self, cluster_id: Uuid) -> BerthResult<Option<Cluster>>;

    /// List all clusters
    async fn list(&self) -> BerthResult<Vec<Cluster>>;

    /// Debit `requested` from every dimension if all of them fit.
    ///
    /// Returns `Ok(false)` without mutating anything when any dimension is
    /// short. Fails with `ClusterNotFound` for an unknown id.
    async fn try_reserve(&self, cluster_id: Uuid, requested: &Resources) -> BerthResult<bool>;

    /// Credit back a reservation made by `try_reserve`
    async fn release(&self, cluster_id: Uuid, reserved: &Resources) -> BerthResult<()>;
}

/// Ordered backlog of deployments waiting for capacity
#[async_trait]
pub trait PendingQueue: Send + Sync {
    /// Insert or update the entry for a deployment
    async fn enqueue(&self, deployment_id: Uuid, priority: i64) -> BerthResult<()>;

    /// Snapshot of all entries, most urgent first
    async fn drain_ordered(&self) -> BerthResult<Vec<QueueEntry>>;

    /// Remove an entry; returns whether one was present
    async fn remove(&self, deployment_id: Uuid) -> BerthResult<bool>;

    /// Put back an entry exactly as it was snapshotted
    async fn restore(&self, entry: QueueEntry) -> BerthResult<()>;

    /// Number of queued entries
    async fn len(&self) -> BerthResult<usize>;

    async fn is_empty(&self) -> BerthResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Deployment records
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn insert(&self, deployment: Deployment) -> BerthResult<()>;

    async fn get(&self, deployment_id: Uuid) -> BerthResult<Option<Deployment>>;

    /// All deployments in creation order
    async fn list(&self) -> BerthResult<Vec<Deployment>>;

    /// Deployments targeting one cluster, in creation order
    async fn list_for_cluster(&self, cluster_id: Uuid) -> BerthResult<Vec<Deployment>>;

    /// Update the status; fails with `DeploymentNotFound` for an unknown id
    async fn set_status(&self, deployment_id: Uuid, status: DeploymentState) -> BerthResult<()>;

    /// Delete a record; returns whether one was present
    async fn delete(&self, deployment_id: Uuid) -> BerthResult<bool>;
}
