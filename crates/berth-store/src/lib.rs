//! berth-store: State collaborators for the scheduler
//!
//! This crate defines the storage seams the scheduling pass consumes and
//! provides in-memory implementations of each:
//! - Resource ledger with atomic check-and-debit
//! - Priority-ordered pending work queue
//! - Deployment record store

pub mod deployments;
pub mod ledger;
pub mod queue;
pub mod traits;

pub use deployments::MemoryDeploymentStore;
pub use ledger::MemoryLedger;
pub use queue::MemoryQueue;
pub use traits::{DeploymentStore, Ledger, PendingQueue};
