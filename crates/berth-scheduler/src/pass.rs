//! One scheduling pass over a snapshot of the pending queue
//!
//! Entries are considered strictly in queue order. Each one is admitted
//! (capacity reserved, status set to running, entry dequeued), left pending
//! (does not fit right now) or discarded (its deployment or cluster is gone).
//! A deployment that does not fit never blocks the entries behind it.
//!
//! Every mutation is journalled. On a hard failure the journal is unwound in
//! reverse so the ledger, queue and records end up as they were before the
//! pass started.

use berth_core::{
    BerthError, BerthResult, Deployment, DeploymentState, PassSummary, QueueEntry, Resources,
};
use berth_store::{DeploymentStore, Ledger, PendingQueue};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened to a single queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Admitted,
    StillPending,
    Discarded,
}

/// Undo record for a mutation made during the pass
#[derive(Debug, Clone, Copy)]
enum JournalEntry {
    Admitted {
        entry: QueueEntry,
        cluster_id: Uuid,
        reserved: Resources,
    },
    Discarded {
        entry: QueueEntry,
    },
}

/// A single scheduling pass
pub struct SchedulingPass<'a> {
    ledger: &'a dyn Ledger,
    queue: &'a dyn PendingQueue,
    deployments: &'a dyn DeploymentStore,
    budget: Option<Duration>,
    journal: Vec<JournalEntry>,
}

impl<'a> SchedulingPass<'a> {
    pub fn new(
        ledger: &'a dyn Ledger,
        queue: &'a dyn PendingQueue,
        deployments: &'a dyn DeploymentStore,
    ) -> Self {
        Self {
            ledger,
            queue,
            deployments,
            budget: None,
            journal: Vec::new(),
        }
    }

    /// Stop considering entries once `budget` has elapsed
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    /// Run the pass to completion
    pub async fn run(mut self) -> BerthResult<PassSummary> {
        let clock = Instant::now();
        let mut summary = PassSummary::new(Utc::now());

        let snapshot = self.queue.drain_ordered().await?;
        debug!(entries = snapshot.len(), "Scheduling pass started");

        for (position, entry) in snapshot.iter().enumerate() {
            if let Some(budget) = self.budget {
                if clock.elapsed() >= budget {
                    let deferred = &snapshot[position..];
                    warn!(
                        budget_ms = budget.as_millis() as u64,
                        deferred = deferred.len(),
                        "Pass budget exhausted, deferring remaining entries"
                    );
                    summary.budget_exhausted = true;
                    summary
                        .still_pending
                        .extend(deferred.iter().map(|e| e.deployment_id));
                    break;
                }
            }

            match self.consider(entry).await {
                Ok(Outcome::Admitted) => summary.admitted.push(entry.deployment_id),
                Ok(Outcome::StillPending) => summary.still_pending.push(entry.deployment_id),
                Ok(Outcome::Discarded) => summary.discarded.push(entry.deployment_id),
                Err(e) => {
                    error!(
                        deployment_id = %entry.deployment_id,
                        error = %e,
                        journalled = self.journal.len(),
                        "Scheduling pass failed, rolling back"
                    );
                    self.unwind().await;
                    return Err(e);
                }
            }
        }

        summary.duration_ms = clock.elapsed().as_millis() as u64;

        info!(
            admitted = summary.admitted.len(),
            still_pending = summary.still_pending.len(),
            discarded = summary.discarded.len(),
            duration_ms = summary.duration_ms,
            "Scheduling pass completed"
        );

        Ok(summary)
    }

    async fn consider(&mut self, entry: &QueueEntry) -> BerthResult<Outcome> {
        let deployment_id = entry.deployment_id;

        let deployment = match self.deployments.get(deployment_id).await? {
            Some(deployment) => deployment,
            None => {
                info!(deployment_id = %deployment_id, "No deployment found, removing from queue");
                self.discard(entry).await?;
                return Ok(Outcome::Discarded);
            }
        };

        if deployment.is_running() {
            warn!(deployment_id = %deployment_id, "Deployment already running, removing from queue");
            self.discard(entry).await?;
            return Ok(Outcome::Discarded);
        }

        match self
            .ledger
            .try_reserve(deployment.cluster_id, &deployment.requirements)
            .await
        {
            Ok(true) => self.commit_admission(entry, &deployment).await,
            Ok(false) => {
                debug!(
                    deployment_id = %deployment_id,
                    cluster_id = %deployment.cluster_id,
                    requested = %deployment.requirements,
                    "Insufficient resources, deployment stays pending"
                );
                Ok(Outcome::StillPending)
            }
            Err(BerthError::ClusterNotFound(_)) => {
                warn!(
                    deployment_id = %deployment_id,
                    cluster_id = %deployment.cluster_id,
                    "Deployment references a cluster that does not exist, removing from queue"
                );
                self.discard(entry).await?;
                Ok(Outcome::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    /// Mark the deployment running and dequeue it; capacity is already reserved
    async fn commit_admission(
        &mut self,
        entry: &QueueEntry,
        deployment: &Deployment,
    ) -> BerthResult<Outcome> {
        let deployment_id = deployment.id;
        let cluster_id = deployment.cluster_id;
        let reserved = deployment.requirements;

        if let Err(e) = self
            .deployments
            .set_status(deployment_id, DeploymentState::Running)
            .await
        {
            self.release_reservation(cluster_id, &reserved).await;

            if e.is_not_found() {
                info!(deployment_id = %deployment_id, "Deployment vanished during admission, removing from queue");
                self.discard(entry).await?;
                return Ok(Outcome::Discarded);
            }

            return Err(BerthError::StorageCommit(format!(
                "deployment {}: status update failed: {}",
                deployment_id, e
            )));
        }

        if let Err(e) = self.queue.remove(deployment_id).await {
            self.revert_status(deployment_id).await;
            self.release_reservation(cluster_id, &reserved).await;
            return Err(BerthError::StorageCommit(format!(
                "deployment {}: dequeue failed: {}",
                deployment_id, e
            )));
        }

        self.journal.push(JournalEntry::Admitted {
            entry: *entry,
            cluster_id,
            reserved,
        });

        self.verify_cluster(cluster_id).await?;

        info!(
            deployment_id = %deployment_id,
            cluster_id = %cluster_id,
            reserved = %reserved,
            "Deployment scheduled"
        );

        Ok(Outcome::Admitted)
    }

    async fn discard(&mut self, entry: &QueueEntry) -> BerthResult<()> {
        self.queue.remove(entry.deployment_id).await?;
        self.journal.push(JournalEntry::Discarded { entry: *entry });
        Ok(())
    }

    /// Re-read the cluster and check `available <= total`
    async fn verify_cluster(&self, cluster_id: Uuid) -> BerthResult<()> {
        match self.ledger.get(cluster_id).await? {
            Some(cluster) => cluster.check_invariant(),
            None => Err(BerthError::LedgerCorruption(format!(
                "cluster {} vanished after a reservation",
                cluster_id
            ))),
        }
    }

    async fn release_reservation(&self, cluster_id: Uuid, reserved: &Resources) {
        if let Err(e) = self.ledger.release(cluster_id, reserved).await {
            error!(
                cluster_id = %cluster_id,
                reserved = %reserved,
                error = %e,
                "Failed to release reservation during rollback"
            );
        }
    }

    async fn revert_status(&self, deployment_id: Uuid) {
        if let Err(e) = self
            .deployments
            .set_status(deployment_id, DeploymentState::Pending)
            .await
        {
            error!(
                deployment_id = %deployment_id,
                error = %e,
                "Failed to revert deployment status during rollback"
            );
        }
    }

    async fn restore_entry(&self, entry: QueueEntry) {
        if let Err(e) = self.queue.restore(entry).await {
            error!(
                deployment_id = %entry.deployment_id,
                error = %e,
                "Failed to restore queue entry during rollback"
            );
        }
    }

    /// Undo every journalled mutation, newest first
    async fn unwind(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        for record in journal.into_iter().rev() {
            match record {
                JournalEntry::Admitted {
                    entry,
                    cluster_id,
                    reserved,
                } => {
                    self.revert_status(entry.deployment_id).await;
                    self.release_reservation(cluster_id, &reserved).await;
                    self.restore_entry(entry).await;
                }
                JournalEntry::Discarded { entry } => {
                    self.restore_entry(entry).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        CorruptingLedger, DriftingLedger, FlakyDeploymentStore, FlakyQueue, Fixture,
        VanishingDeploymentStore,
    };
    use berth_core::{Cluster, Deployment};
    use berth_store::{MemoryDeploymentStore, MemoryLedger, MemoryQueue};

    #[tokio::test]
    async fn test_greedy_does_not_block_on_large_entry() {
        let fx = Fixture::new();
        let cluster = fx.cluster(Resources::new(4096, 4, 0)).await;

        let large = fx.deployment(cluster, Resources::new(8192, 2, 0), 1).await;
        let small = fx.deployment(cluster, Resources::new(1024, 1, 0), 2).await;

        let summary = fx.pass().run().await.unwrap();

        assert_eq!(summary.admitted, vec![small]);
        assert_eq!(summary.still_pending, vec![large]);
        assert!(summary.discarded.is_empty());
        assert_eq!(fx.status(large).await, DeploymentState::Pending);
        assert_eq!(fx.status(small).await, DeploymentState::Running);
        assert_eq!(fx.queued().await, vec![large]);
        assert_eq!(fx.available(cluster).await, Resources::new(3072, 3, 0));
    }

    #[tokio::test]
    async fn test_admits_in_priority_order() {
        let fx = Fixture::new();
        let cluster = fx.cluster(Resources::new(2048, 2, 0)).await;

        // Only one of the two fits; the more urgent one must win
        let later = fx.deployment(cluster, Resources::new(2048, 2, 0), 5).await;
        let urgent = fx.deployment(cluster, Resources::new(2048, 2, 0), 1).await;

        let summary = fx.pass().run().await.unwrap();

        assert_eq!(summary.admitted, vec![urgent]);
        assert_eq!(summary.still_pending, vec![later]);
    }

    #[tokio::test]
    async fn test_missing_deployment_is_discarded() {
        let fx = Fixture::new();
        let cluster = fx.cluster(Resources::new(4096, 4, 0)).await;
        let kept = fx.deployment(cluster, Resources::new(1024, 1, 0), 2).await;
        let ghost = Uuid::new_v4();
        fx.queue.enqueue(ghost, 1).await.unwrap();

        let summary = fx.pass().run().await.unwrap();

        assert_eq!(summary.discarded, vec![ghost]);
        assert_eq!(summary.admitted, vec![kept]);
        assert!(fx.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_cluster_is_discarded() {
        let fx = Fixture::new();
        let orphan = fx
            .deployment(Uuid::new_v4(), Resources::new(1024, 1, 0), 1)
            .await;

        let summary = fx.pass().run().await.unwrap();

        assert_eq!(summary.discarded, vec![orphan]);
        assert!(summary.admitted.is_empty());
        assert_eq!(fx.status(orphan).await, DeploymentState::Pending);
        assert!(fx.queued().await.is_empty());
    }

    #[tokio::test]
    async fn test_running_deployment_is_never_debited_twice() {
        let fx = Fixture::new();
        let cluster = fx.cluster(Resources::new(4096, 4, 0)).await;
        let id = fx.deployment(cluster, Resources::new(1024, 1, 0), 1).await;

        fx.pass().run().await.unwrap();
        assert_eq!(fx.available(cluster).await, Resources::new(3072, 3, 0));

        // Re-submitting a running deployment must not reserve again
        fx.queue.enqueue(id, 1).await.unwrap();
        let summary = fx.pass().run().await.unwrap();

        assert_eq!(summary.discarded, vec![id]);
        assert!(summary.admitted.is_empty());
        assert_eq!(fx.available(cluster).await, Resources::new(3072, 3, 0));
    }

    #[tokio::test]
    async fn test_zero_budget_defers_everything() {
        let fx = Fixture::new();
        let cluster = fx.cluster(Resources::new(4096, 4, 0)).await;
        let a = fx.deployment(cluster, Resources::new(1024, 1, 0), 1).await;
        let b = fx.deployment(cluster, Resources::new(1024, 1, 0), 2).await;

        let summary = fx
            .pass()
            .with_budget(Some(Duration::ZERO))
            .run()
            .await
            .unwrap();

        assert!(summary.budget_exhausted);
        assert!(summary.admitted.is_empty());
        assert_eq!(summary.still_pending, vec![a, b]);
        assert_eq!(fx.queued().await, vec![a, b]);
        assert_eq!(fx.available(cluster).await, Resources::new(4096, 4, 0));
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let fx = Fixture::new();
        let summary = fx.pass().run().await.unwrap();
        assert_eq!(summary.considered(), 0);
        assert!(!summary.budget_exhausted);
    }

    #[tokio::test]
    async fn test_status_write_failure_rolls_back_whole_pass() {
        let ledger = MemoryLedger::new();
        let queue = MemoryQueue::new();
        let records = FlakyDeploymentStore::failing_after(1);

        let cluster = Cluster::new("c".to_string(), Resources::new(8192, 8, 2));
        let cluster_id = cluster.id;
        ledger.register(cluster).await.unwrap();

        let first = Deployment::new(cluster_id, "a".to_string(), Resources::new(1024, 1, 0), 1);
        let second = Deployment::new(cluster_id, "b".to_string(), Resources::new(1024, 1, 1), 2);
        let ghost = Uuid::new_v4();
        let (first_id, second_id) = (first.id, second.id);
        records.inner.insert(first).await.unwrap();
        records.inner.insert(second).await.unwrap();
        queue.enqueue(first_id, 1).await.unwrap();
        queue.enqueue(ghost, 1).await.unwrap();
        queue.enqueue(second_id, 2).await.unwrap();
        let before = queue.drain_ordered().await.unwrap();

        let result = SchedulingPass::new(&ledger, &queue, &records).run().await;

        assert!(matches!(result, Err(BerthError::StorageCommit(_))));
        let cluster = ledger.get(cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.available, cluster.total);
        assert_eq!(queue.drain_ordered().await.unwrap(), before);
        for id in [first_id, second_id] {
            let d = records.inner.get(id).await.unwrap().unwrap();
            assert_eq!(d.status, DeploymentState::Pending);
        }
    }

    #[tokio::test]
    async fn test_ledger_corruption_aborts_pass() {
        let queue = MemoryQueue::new();
        let records = MemoryDeploymentStore::new();
        let ledger = CorruptingLedger::new();

        let healthy = Cluster::new("healthy".to_string(), Resources::new(8192, 8, 0));
        let broken = Cluster::new("broken".to_string(), Resources::new(8192, 8, 0));
        let (healthy_id, broken_id) = (healthy.id, broken.id);
        ledger.inner.register(healthy).await.unwrap();
        ledger.inner.register(broken).await.unwrap();
        ledger.corrupt(broken_id).await;

        let ok = Deployment::new(healthy_id, "ok".to_string(), Resources::new(1024, 1, 0), 1);
        let bad = Deployment::new(broken_id, "bad".to_string(), Resources::new(1024, 1, 0), 2);
        let (ok_id, bad_id) = (ok.id, bad.id);
        records.insert(ok).await.unwrap();
        records.insert(bad).await.unwrap();
        queue.enqueue(ok_id, 1).await.unwrap();
        queue.enqueue(bad_id, 2).await.unwrap();

        let result = SchedulingPass::new(&ledger, &queue, &records).run().await;

        assert!(matches!(result, Err(BerthError::LedgerCorruption(_))));
        let healthy = ledger.inner.get(healthy_id).await.unwrap().unwrap();
        assert_eq!(healthy.available, healthy.total);
        assert_eq!(
            records.get(ok_id).await.unwrap().unwrap().status,
            DeploymentState::Pending
        );
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corruption_after_admission_unwinds_pass() {
        let queue = MemoryQueue::new();
        let records = MemoryDeploymentStore::new();
        let ledger = DriftingLedger::new();

        let healthy = Cluster::new("healthy".to_string(), Resources::new(8192, 8, 0));
        let drifting = Cluster::new("drifting".to_string(), Resources::new(8192, 8, 0));
        let (healthy_id, drifting_id) = (healthy.id, drifting.id);
        ledger.register(healthy).await.unwrap();
        ledger.register(drifting).await.unwrap();
        ledger.drift(drifting_id).await;

        let ok = Deployment::new(healthy_id, "ok".to_string(), Resources::new(1024, 1, 0), 1);
        let bad = Deployment::new(drifting_id, "bad".to_string(), Resources::new(2048, 2, 0), 2);
        let (ok_id, bad_id) = (ok.id, bad.id);
        records.insert(ok).await.unwrap();
        records.insert(bad).await.unwrap();
        queue.enqueue(ok_id, 1).await.unwrap();
        queue.enqueue(bad_id, 2).await.unwrap();
        let before = queue.drain_ordered().await.unwrap();

        let result = SchedulingPass::new(&ledger, &queue, &records).run().await;

        assert!(matches!(result, Err(BerthError::LedgerCorruption(_))));
        for cluster_id in [healthy_id, drifting_id] {
            let cluster = ledger.inner.get(cluster_id).await.unwrap().unwrap();
            assert_eq!(cluster.available, cluster.total);
        }
        for id in [ok_id, bad_id] {
            let d = records.get(id).await.unwrap().unwrap();
            assert_eq!(d.status, DeploymentState::Pending);
        }
        assert_eq!(queue.drain_ordered().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_dequeue_failure_rolls_back_admission() {
        let ledger = MemoryLedger::new();
        let queue = FlakyQueue::failing_remove();
        let records = MemoryDeploymentStore::new();

        let cluster = Cluster::new("c".to_string(), Resources::new(4096, 4, 0));
        let cluster_id = cluster.id;
        ledger.register(cluster).await.unwrap();

        let d = Deployment::new(cluster_id, "a".to_string(), Resources::new(1024, 1, 0), 1);
        let id = d.id;
        records.insert(d).await.unwrap();
        queue.enqueue(id, 1).await.unwrap();

        let result = SchedulingPass::new(&ledger, &queue, &records).run().await;

        match result {
            Err(BerthError::StorageCommit(msg)) => assert!(msg.contains("dequeue failed")),
            other => panic!("expected StorageCommit, got {:?}", other),
        }
        let cluster = ledger.get(cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.available, cluster.total);
        assert_eq!(
            records.get(id).await.unwrap().unwrap().status,
            DeploymentState::Pending
        );
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deployment_deleted_during_admission_is_discarded() {
        let ledger = MemoryLedger::new();
        let queue = MemoryQueue::new();
        let records = VanishingDeploymentStore::new();

        let cluster = Cluster::new("c".to_string(), Resources::new(4096, 4, 0));
        let cluster_id = cluster.id;
        ledger.register(cluster).await.unwrap();

        let d = Deployment::new(cluster_id, "a".to_string(), Resources::new(1024, 1, 0), 1);
        let id = d.id;
        records.insert(d).await.unwrap();
        queue.enqueue(id, 1).await.unwrap();

        let summary = SchedulingPass::new(&ledger, &queue, &records)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.discarded, vec![id]);
        assert!(summary.admitted.is_empty());
        let cluster = ledger.get(cluster_id).await.unwrap().unwrap();
        assert_eq!(cluster.available, cluster.total);
        assert!(queue.is_empty().await.unwrap());
    }
}
