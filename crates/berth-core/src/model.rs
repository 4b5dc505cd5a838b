//! Cluster, Deployment, queue and pass type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BerthError, BerthResult, Resources};

/// A capacity-bounded target for deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique identifier for the cluster
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Capacity the cluster was registered with
    pub total: Resources,
    /// Capacity not yet reserved by running deployments
    pub available: Resources,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Create a new cluster with all of its capacity available
    pub fn new(name: String, total: Resources) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            total,
            available: total,
            created_at: Utc::now(),
        }
    }

    /// Check `available <= total` on every dimension
    pub fn check_invariant(&self) -> BerthResult<()> {
        let dims = [
            ("ram", self.available.ram, self.total.ram),
            ("cpu", self.available.cpu, self.total.cpu),
            ("gpu", self.available.gpu, self.total.gpu),
        ];
        for (dim, available, total) in dims {
            if available > total {
                return Err(BerthError::LedgerCorruption(format!(
                    "cluster {}: available {} {} exceeds total {}",
                    self.id, dim, available, total
                )));
            }
        }
        Ok(())
    }
}

/// Scheduling state of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Waiting in the queue for capacity
    Pending,
    /// Admitted onto its cluster
    Running,
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentState::Pending => write!(f, "pending"),
            DeploymentState::Running => write!(f, "running"),
        }
    }
}

/// A workload that requests capacity on one cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique identifier for the deployment
    pub id: Uuid,
    /// Cluster the deployment must be placed on
    pub cluster_id: Uuid,
    /// Container image reference (e.g., "nginx:latest")
    pub image: String,
    /// Resources the deployment reserves once admitted
    pub requirements: Resources,
    /// Lower value is more urgent
    pub priority: i64,
    /// Current scheduling state
    pub status: DeploymentState,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Create a new pending deployment
    pub fn new(cluster_id: Uuid, image: String, requirements: Resources, priority: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            cluster_id,
            image,
            requirements,
            priority,
            status: DeploymentState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == DeploymentState::Running
    }
}

/// Input for creating a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeployment {
    pub cluster_id: Uuid,
    pub image: String,
    pub requirements: Resources,
    pub priority: i64,
}

impl NewDeployment {
    /// Reject requests that can never be stored
    pub fn validate(&self) -> BerthResult<()> {
        if self.image.trim().is_empty() {
            return Err(BerthError::InvalidRequest(
                "image must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One pending deployment in the work queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Deployment waiting for admission
    pub deployment_id: Uuid,
    /// Priority score, lower drains first
    pub priority: i64,
    /// Insertion sequence, breaks ties between equal priorities
    pub seq: u64,
}

/// Outcome of one scheduling pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    /// Deployments promoted to running
    pub admitted: Vec<Uuid>,
    /// Deployments left queued for a later pass
    pub still_pending: Vec<Uuid>,
    /// Queue entries dropped because their record or cluster is gone
    pub discarded: Vec<Uuid>,
    /// Whether the pass stopped early on its execution budget
    pub budget_exhausted: bool,
    /// When the pass took its queue snapshot
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the pass
    pub duration_ms: u64,
}

impl PassSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            admitted: Vec::new(),
            still_pending: Vec::new(),
            discarded: Vec::new(),
            budget_exhausted: false,
            started_at,
            duration_ms: 0,
        }
    }

    /// Number of snapshot entries the pass looked at
    pub fn considered(&self) -> usize {
        self.admitted.len() + self.still_pending.len() + self.discarded.len()
    }
}
