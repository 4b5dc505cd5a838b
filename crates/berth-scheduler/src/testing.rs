//! Test doubles shared by the scheduler tests

use async_trait::async_trait;
use berth_core::{
    BerthError, BerthResult, Cluster, Deployment, DeploymentState, QueueEntry, Resources,
};
use berth_store::{
    DeploymentStore, Ledger, MemoryDeploymentStore, MemoryLedger, MemoryQueue, PendingQueue,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::pass::SchedulingPass;

/// In-memory collaborators plus helpers to seed them
pub struct Fixture {
    pub ledger: MemoryLedger,
    pub queue: MemoryQueue,
    pub records: MemoryDeploymentStore,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            ledger: MemoryLedger::new(),
            queue: MemoryQueue::new(),
            records: MemoryDeploymentStore::new(),
        }
    }

    pub async fn cluster(&self, total: Resources) -> Uuid {
        let cluster = Cluster::new("test".to_string(), total);
        let id = cluster.id;
        self.ledger.register(cluster).await.unwrap();
        id
    }

    /// Store a pending deployment and enqueue it
    pub async fn deployment(&self, cluster_id: Uuid, req: Resources, priority: i64) -> Uuid {
        let deployment = Deployment::new(cluster_id, "app:latest".to_string(), req, priority);
        let id = deployment.id;
        self.records.insert(deployment).await.unwrap();
        self.queue.enqueue(id, priority).await.unwrap();
        id
    }

    pub fn pass(&self) -> SchedulingPass<'_> {
        SchedulingPass::new(&self.ledger, &self.queue, &self.records)
    }

    pub async fn status(&self, id: Uuid) -> DeploymentState {
        self.records.get(id).await.unwrap().unwrap().status
    }

    pub async fn queued(&self) -> Vec<Uuid> {
        self.queue
            .drain_ordered()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.deployment_id)
            .collect()
    }

    pub async fn available(&self, cluster_id: Uuid) -> Resources {
        self.ledger.get(cluster_id).await.unwrap().unwrap().available
    }
}

/// Deployment store whose transitions to running start failing after a count
pub struct FlakyDeploymentStore {
    pub inner: MemoryDeploymentStore,
    allowed: usize,
    calls: AtomicUsize,
}

impl FlakyDeploymentStore {
    /// The first `allowed` promotions succeed; later ones fail
    pub fn failing_after(allowed: usize) -> Self {
        Self {
            inner: MemoryDeploymentStore::new(),
            allowed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DeploymentStore for FlakyDeploymentStore {
    async fn insert(&self, deployment: Deployment) -> BerthResult<()> {
        self.inner.insert(deployment).await
    }

    async fn get(&self, deployment_id: Uuid) -> BerthResult<Option<Deployment>> {
        self.inner.get(deployment_id).await
    }

    async fn list(&self) -> BerthResult<Vec<Deployment>> {
        self.inner.list().await
    }

    async fn list_for_cluster(&self, cluster_id: Uuid) -> BerthResult<Vec<Deployment>> {
        self.inner.list_for_cluster(cluster_id).await
    }

    async fn set_status(&self, deployment_id: Uuid, status: DeploymentState) -> BerthResult<()> {
        if status == DeploymentState::Running
            && self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed
        {
            return Err(BerthError::Storage("connection reset".to_string()));
        }
        self.inner.set_status(deployment_id, status).await
    }

    async fn delete(&self, deployment_id: Uuid) -> BerthResult<bool> {
        self.inner.delete(deployment_id).await
    }
}

/// Ledger that reports corruption for selected clusters
pub struct CorruptingLedger {
    pub inner: MemoryLedger,
    corrupted: RwLock<HashSet<Uuid>>,
}

impl CorruptingLedger {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            corrupted: RwLock::new(HashSet::new()),
        }
    }

    pub async fn corrupt(&self, cluster_id: Uuid) {
        self.corrupted.write().await.insert(cluster_id);
    }
}

#[async_trait]
impl Ledger for CorruptingLedger {
    async fn register(&self, cluster: Cluster) -> BerthResult<()> {
        self.inner.register(cluster).await
    }

    async fn get(&self, cluster_id: Uuid) -> BerthResult<Option<Cluster>> {
        self.inner.get(cluster_id).await
    }

    async fn list(&self) -> BerthResult<Vec<Cluster>> {
        self.inner.list().await
    }

    async fn try_reserve(&self, cluster_id: Uuid, requested: &Resources) -> BerthResult<bool> {
        if self.corrupted.read().await.contains(&cluster_id) {
            return Err(BerthError::LedgerCorruption(format!(
                "cluster {}: available exceeds total",
                cluster_id
            )));
        }
        self.inner.try_reserve(cluster_id, requested).await
    }

    async fn release(&self, cluster_id: Uuid, reserved: &Resources) -> BerthResult<()> {
        self.inner.release(cluster_id, reserved).await
    }
}

/// Ledger that sleeps inside every reservation and records overlap
pub struct SlowLedger {
    pub inner: MemoryLedger,
    delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl SlowLedger {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryLedger::new(),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Ledger for SlowLedger {
    async fn register(&self, cluster: Cluster) -> BerthResult<()> {
        self.inner.register(cluster).await
    }

    async fn get(&self, cluster_id: Uuid) -> BerthResult<Option<Cluster>> {
        self.inner.get(cluster_id).await
    }

    async fn list(&self) -> BerthResult<Vec<Cluster>> {
        self.inner.list().await
    }

    async fn try_reserve(&self, cluster_id: Uuid, requested: &Resources) -> BerthResult<bool> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.try_reserve(cluster_id, requested).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn release(&self, cluster_id: Uuid, reserved: &Resources) -> BerthResult<()> {
        self.inner.release(cluster_id, reserved).await
    }
}

/// Ledger whose reads of selected clusters report `available > total`
///
/// Reservations go through untouched, so the drift only shows up when the
/// cluster is re-read after an admission.
pub struct DriftingLedger {
    pub inner: MemoryLedger,
    drifting: RwLock<HashSet<Uuid>>,
}

impl DriftingLedger {
    pub fn new() -> Self {
        Self {
            inner: MemoryLedger::new(),
            drifting: RwLock::new(HashSet::new()),
        }
    }

    pub async fn drift(&self, cluster_id: Uuid) {
        self.drifting.write().await.insert(cluster_id);
    }
}

#[async_trait]
impl Ledger for DriftingLedger {
    async fn register(&self, cluster: Cluster) -> BerthResult<()> {
        self.inner.register(cluster).await
    }

    async fn get(&self, cluster_id: Uuid) -> BerthResult<Option<Cluster>> {
        let cluster = self.inner.get(cluster_id).await?;
        if !self.drifting.read().await.contains(&cluster_id) {
            return Ok(cluster);
        }
        Ok(cluster.map(|mut c| {
            c.available.ram = c.total.ram + 1;
            c
        }))
    }

    async fn list(&self) -> BerthResult<Vec<Cluster>> {
        self.inner.list().await
    }

    async fn try_reserve(&self, cluster_id: Uuid, requested: &Resources) -> BerthResult<bool> {
        self.inner.try_reserve(cluster_id, requested).await
    }

    async fn release(&self, cluster_id: Uuid, reserved: &Resources) -> BerthResult<()> {
        self.inner.release(cluster_id, reserved).await
    }
}

/// Queue whose enqueue or remove always fails
pub struct FlakyQueue {
    pub inner: MemoryQueue,
    fail_enqueue: bool,
    fail_remove: bool,
}

impl FlakyQueue {
    pub fn failing_enqueue() -> Self {
        Self {
            inner: MemoryQueue::new(),
            fail_enqueue: true,
            fail_remove: false,
        }
    }

    pub fn failing_remove() -> Self {
        Self {
            inner: MemoryQueue::new(),
            fail_enqueue: false,
            fail_remove: true,
        }
    }
}

#[async_trait]
impl PendingQueue for FlakyQueue {
    async fn enqueue(&self, deployment_id: Uuid, priority: i64) -> BerthResult<()> {
        if self.fail_enqueue {
            return Err(BerthError::Storage("down".to_string()));
        }
        self.inner.enqueue(deployment_id, priority).await
    }

    async fn drain_ordered(&self) -> BerthResult<Vec<QueueEntry>> {
        self.inner.drain_ordered().await
    }

    async fn remove(&self, deployment_id: Uuid) -> BerthResult<bool> {
        if self.fail_remove {
            return Err(BerthError::Storage("down".to_string()));
        }
        self.inner.remove(deployment_id).await
    }

    async fn restore(&self, entry: QueueEntry) -> BerthResult<()> {
        self.inner.restore(entry).await
    }

    async fn len(&self) -> BerthResult<usize> {
        self.inner.len().await
    }
}

/// Deployment store where a record is deleted just as it is promoted
pub struct VanishingDeploymentStore {
    pub inner: MemoryDeploymentStore,
}

impl VanishingDeploymentStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDeploymentStore::new(),
        }
    }
}

#[async_trait]
impl DeploymentStore for VanishingDeploymentStore {
    async fn insert(&self, deployment: Deployment) -> BerthResult<()> {
        self.inner.insert(deployment).await
    }

    async fn get(&self, deployment_id: Uuid) -> BerthResult<Option<Deployment>> {
        self.inner.get(deployment_id).await
    }

    async fn list(&self) -> BerthResult<Vec<Deployment>> {
        self.inner.list().await
    }

    async fn list_for_cluster(&self, cluster_id: Uuid) -> BerthResult<Vec<Deployment>> {
        self.inner.list_for_cluster(cluster_id).await
    }

    async fn set_status(&self, deployment_id: Uuid, status: DeploymentState) -> BerthResult<()> {
        if status == DeploymentState::Running {
            self.inner.delete(deployment_id).await?;
        }
        self.inner.set_status(deployment_id, status).await
    }

    async fn delete(&self, deployment_id: Uuid) -> BerthResult<bool> {
        self.inner.delete(deployment_id).await
    }
}
