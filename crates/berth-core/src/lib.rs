//! berth-core: Core types for the berth scheduler
//!
//! This crate provides the fundamental types used throughout berth:
//! - Resource vectors (RAM/CPU/GPU) and fit arithmetic
//! - Cluster and deployment records
//! - Queue entries and pass summaries
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod model;
pub mod resources;

pub use config::*;
pub use error::*;
pub use model::*;
pub use resources::*;
