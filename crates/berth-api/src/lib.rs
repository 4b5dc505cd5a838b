//! berth-api: REST API server for berth
//!
//! This crate exposes the scheduler over HTTP:
//! - Cluster registration and inspection
//! - Deployment creation, submission and deletion
//! - Queue inspection, manual scheduling passes and system status

pub mod rest;

pub use rest::create_router;
