//! Common types and configurations shared across Vocex crates.
//!
//! This crate provides the configuration types for the upstream services,
//! local storage and the sync pipeline used across the Vocex explorer indexer.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;

pub use config::gateway::GatewayConfig;
pub use config::node::NodeConfig;
pub use config::storage::{DatabaseConfig, DatabaseSize};
pub use config::sync::SyncConfig;

pub use config::gateway;
pub use config::node;
pub use config::storage;
pub use config::sync;
