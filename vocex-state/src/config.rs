//! Holds config data for the Vocex sync engine.

use vocex_common::{DatabaseConfig, GatewayConfig, NodeConfig, SyncConfig};

/// Holds config data for [crate::SyncEngine].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncEngineConfig {
    /// Consensus node connection settings.
    pub node: NodeConfig,
    /// Application gateway connection settings.
    pub gateway: GatewayConfig,
    /// Explorer store location and size.
    pub database: DatabaseConfig,
    /// Sync routine tuning.
    pub sync: SyncConfig,
}

impl SyncEngineConfig {
    /// Returns a new instance of [`SyncEngineConfig`].
    pub fn new(
        node: NodeConfig,
        gateway: GatewayConfig,
        database: DatabaseConfig,
        sync: SyncConfig,
    ) -> Self {
        SyncEngineConfig {
            node,
            gateway,
            database,
            sync,
        }
    }
}
