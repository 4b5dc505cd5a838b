//! berth-scheduler: Priority-first greedy scheduler
//!
//! This crate binds pending deployments to cluster capacity:
//! - A single scheduling pass over a queue snapshot, with rollback
//! - The `Scheduler` entry point that admits one pass at a time
//! - A recurring timer trigger

pub mod pass;
pub mod scheduler;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use pass::SchedulingPass;
pub use scheduler::{Scheduler, SchedulerStats};
pub use trigger::TimerTrigger;
