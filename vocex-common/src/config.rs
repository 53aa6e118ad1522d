//! Configuration types for the explorer indexer.

pub mod gateway;
pub mod node;
pub mod storage;
pub mod sync;

// Re-export commonly used types at module root for ergonomic imports.
pub use gateway::GatewayConfig;
pub use node::NodeConfig;
pub use storage::{DatabaseConfig, DatabaseSize};
pub use sync::SyncConfig;
