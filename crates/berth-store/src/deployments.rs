//! In-memory deployment record store

use async_trait::async_trait;
use berth_core::{BerthError, BerthResult, Deployment, DeploymentState};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::DeploymentStore;

#[derive(Default)]
struct Records {
    /// Deployments indexed by ID, with their insertion order
    by_id: HashMap<Uuid, (u64, Deployment)>,
    next_order: u64,
}

impl Records {
    fn sorted(&self, filter: impl Fn(&Deployment) -> bool) -> Vec<Deployment> {
        let mut rows: Vec<&(u64, Deployment)> =
            self.by_id.values().filter(|(_, d)| filter(d)).collect();
        rows.sort_by_key(|(order, _)| *order);
        rows.into_iter().map(|(_, d)| d.clone()).collect()
    }
}

/// Deployment records held in process memory
#[derive(Default)]
pub struct MemoryDeploymentStore {
    records: RwLock<Records>,
}

impl MemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeploymentStore for MemoryDeploymentStore {
    async fn insert(&self, deployment: Deployment) -> BerthResult<()> {
        let mut records = self.records.write().await;
        if records.by_id.contains_key(&deployment.id) {
            return Err(BerthError::InvalidRequest(format!(
                "deployment {} already exists",
                deployment.id
            )));
        }
        let order = records.next_order;
        records.next_order += 1;
        records.by_id.insert(deployment.id, (order, deployment));
        Ok(())
    }

    async fn get(&self, deployment_id: Uuid) -> BerthResult<Option<Deployment>> {
        let records = self.records.read().await;
        Ok(records.by_id.get(&deployment_id).map(|(_, d)| d.clone()))
    }

    async fn list(&self) -> BerthResult<Vec<Deployment>> {
        Ok(self.records.read().await.sorted(|_| true))
    }

    async fn list_for_cluster(&self, cluster_id: Uuid) -> BerthResult<Vec<Deployment>> {
        Ok(self
            .records
            .read()
            .await
            .sorted(|d| d.cluster_id == cluster_id))
    }

    async fn set_status(&self, deployment_id: Uuid, status: DeploymentState) -> BerthResult<()> {
        let mut records = self.records.write().await;
        let (_, deployment) = records
            .by_id
            .get_mut(&deployment_id)
            .ok_or_else(|| BerthError::DeploymentNotFound(deployment_id.to_string()))?;
        deployment.status = status;
        deployment.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, deployment_id: Uuid) -> BerthResult<bool> {
        Ok(self
            .records
            .write()
            .await
            .by_id
            .remove(&deployment_id)
            .is_some())
    }
}
