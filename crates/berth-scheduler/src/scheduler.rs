//! Scheduler entry point shared by every trigger

use berth_core::{
    BerthError, BerthResult, Cluster, Deployment, NewDeployment, PassSummary, QueueEntry,
    Resources,
};
use berth_store::{
    DeploymentStore, Ledger, MemoryDeploymentStore, MemoryLedger, MemoryQueue, PendingQueue,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use uuid::Uuid;

use crate::pass::SchedulingPass;

/// Scheduler owns the storage collaborators and serializes passes
///
/// `run_pass` holds `pass_lock` for the whole pass. A caller that arrives
/// while a pass is in flight waits for it and then runs a fresh pass of its
/// own against the queue as it is at that point.
pub struct Scheduler {
    /// Cluster capacity counters
    ledger: Arc<dyn Ledger>,
    /// Pending work queue
    queue: Arc<dyn PendingQueue>,
    /// Deployment records
    deployments: Arc<dyn DeploymentStore>,
    /// Held across an entire pass
    pass_lock: Mutex<()>,
    /// Optional per-pass execution budget
    pass_budget: Option<Duration>,
    passes_completed: AtomicU64,
    passes_failed: AtomicU64,
    last_summary: RwLock<Option<PassSummary>>,
}

impl Scheduler {
    /// Create a scheduler over the given collaborators
    pub fn new(
        ledger: Arc<dyn Ledger>,
        queue: Arc<dyn PendingQueue>,
        deployments: Arc<dyn DeploymentStore>,
    ) -> Self {
        Self {
            ledger,
            queue,
            deployments,
            pass_lock: Mutex::new(()),
            pass_budget: None,
            passes_completed: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
            last_summary: RwLock::new(None),
        }
    }

    /// Create a scheduler backed entirely by in-memory stores
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryQueue::new()),
            Arc::new(MemoryDeploymentStore::new()),
        )
    }

    /// Bound the wall-clock time of each pass
    pub fn with_pass_budget(mut self, budget: Option<Duration>) -> Self {
        self.pass_budget = budget;
        self
    }

    /// Register a new cluster with all of its capacity available
    pub async fn create_cluster(&self, name: String, total: Resources) -> BerthResult<Cluster> {
        if name.trim().is_empty() {
            return Err(BerthError::InvalidRequest(
                "cluster name must not be empty".to_string(),
            ));
        }

        let cluster = Cluster::new(name, total);
        self.ledger.register(cluster.clone()).await?;

        info!(
            cluster_id = %cluster.id,
            name = %cluster.name,
            total = %cluster.total,
            "Cluster created"
        );

        Ok(cluster)
    }

    /// Get a cluster
    pub async fn get_cluster(&self, id: Uuid) -> BerthResult<Cluster> {
        self.ledger
            .get(id)
            .await?
            .ok_or_else(|| BerthError::ClusterNotFound(id.to_string()))
    }

    /// List all clusters
    pub async fn list_clusters(&self) -> BerthResult<Vec<Cluster>> {
        self.ledger.list().await
    }

    /// Store a pending deployment for an existing cluster and submit it
    pub async fn create_deployment(&self, req: NewDeployment) -> BerthResult<Deployment> {
        req.validate()?;
        self.get_cluster(req.cluster_id).await?;

        let deployment = Deployment::new(req.cluster_id, req.image, req.requirements, req.priority);
        self.deployments.insert(deployment.clone()).await?;

        // A record that never reaches the queue would stay pending forever
        if let Err(e) = self.submit(deployment.id, deployment.priority).await {
            if let Err(cleanup) = self.deployments.delete(deployment.id).await {
                error!(
                    deployment_id = %deployment.id,
                    error = %cleanup,
                    "Failed to remove deployment after enqueue failure"
                );
            }
            return Err(e);
        }

        info!(
            deployment_id = %deployment.id,
            cluster_id = %deployment.cluster_id,
            image = %deployment.image,
            priority = deployment.priority,
            "Deployment created"
        );

        Ok(deployment)
    }

    /// Enqueue a deployment for scheduling; re-submission updates its priority
    pub async fn submit(&self, deployment_id: Uuid, priority: i64) -> BerthResult<()> {
        self.queue.enqueue(deployment_id, priority).await
    }

    /// Get a deployment
    pub async fn get_deployment(&self, id: Uuid) -> BerthResult<Deployment> {
        self.deployments
            .get(id)
            .await?
            .ok_or_else(|| BerthError::DeploymentNotFound(id.to_string()))
    }

    /// List the deployments of one cluster in creation order
    pub async fn list_cluster_deployments(&self, cluster_id: Uuid) -> BerthResult<Vec<Deployment>> {
        self.get_cluster(cluster_id).await?;
        self.deployments.list_for_cluster(cluster_id).await
    }

    /// Delete a deployment record
    ///
    /// The queue entry, if any, is left behind and discarded by the next pass.
    /// Capacity held by a running deployment is not released.
    pub async fn delete_deployment(&self, id: Uuid) -> BerthResult<()> {
        if !self.deployments.delete(id).await? {
            return Err(BerthError::DeploymentNotFound(id.to_string()));
        }
        info!(deployment_id = %id, "Deployment deleted");
        Ok(())
    }

    /// Current queue contents, most urgent first
    pub async fn pending_queue(&self) -> BerthResult<Vec<QueueEntry>> {
        self.queue.drain_ordered().await
    }

    /// Run one scheduling pass, waiting for any pass already in flight
    pub async fn run_pass(&self) -> BerthResult<PassSummary> {
        let _guard = self.pass_lock.lock().await;

        let result = SchedulingPass::new(
            self.ledger.as_ref(),
            self.queue.as_ref(),
            self.deployments.as_ref(),
        )
        .with_budget(self.pass_budget)
        .run()
        .await;

        match &result {
            Ok(summary) => {
                self.passes_completed.fetch_add(1, Ordering::SeqCst);
                *self.last_summary.write().await = Some(summary.clone());
            }
            Err(e) => {
                self.passes_failed.fetch_add(1, Ordering::SeqCst);
                error!(error = %e, "Scheduling pass failed");
            }
        }

        result
    }

    /// Summary of the most recent successful pass
    pub async fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary.read().await.clone()
    }

    /// Get scheduler statistics
    pub async fn stats(&self) -> BerthResult<SchedulerStats> {
        let clusters = self.ledger.list().await?.len();
        let deployments = self.deployments.list().await?;
        let running = deployments.iter().filter(|d| d.is_running()).count();

        Ok(SchedulerStats {
            clusters,
            deployments_pending: deployments.len() - running,
            deployments_running: running,
            queue_length: self.queue.len().await?,
            passes_completed: self.passes_completed.load(Ordering::SeqCst),
            passes_failed: self.passes_failed.load(Ordering::SeqCst),
            last_pass: self.last_summary().await,
        })
    }
}

/// Scheduler statistics
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub clusters: usize,
    pub deployments_pending: usize,
    pub deployments_running: usize,
    pub queue_length: usize,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassSummary>,
}
