//! Vocex daemon config.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use vocex_common::{DatabaseConfig, GatewayConfig, NodeConfig, SyncConfig};
use vocex_state::SyncEngineConfig;

use crate::error::IndexerError;

/// Config information required for the Vocex daemon.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VocexdConfig {
    /// Consensus node connection settings.
    pub node: NodeConfig,
    /// Application gateway connection settings.
    pub gateway: GatewayConfig,
    /// Explorer store location and size.
    pub database: DatabaseConfig,
    /// Sync routine tuning.
    pub sync: SyncConfig,
}

impl VocexdConfig {
    /// Performs checks on config data.
    pub fn check_config(&self) -> Result<(), IndexerError> {
        let node_scheme = self.node.rpc_url.scheme();
        if !matches!(node_scheme, "ws" | "wss") {
            return Err(IndexerError::ConfigError(format!(
                "Node rpc_url must use ws:// or wss://, got '{}'.",
                self.node.rpc_url
            )));
        }
        if self.node.pool_size == 0 {
            return Err(IndexerError::ConfigError(
                "Node pool_size must be at least 1.".to_string(),
            ));
        }

        let gateway_scheme = self.gateway.url.scheme();
        if !matches!(gateway_scheme, "http" | "https" | "ws" | "wss") {
            return Err(IndexerError::ConfigError(format!(
                "Gateway url must use http(s):// or ws(s)://, got '{}'.",
                self.gateway.url
            )));
        }

        if self.database.chain_id.is_empty() {
            return Err(IndexerError::ConfigError(
                "Database chain_id must not be empty.".to_string(),
            ));
        }

        let sync = &self.sync;
        for (name, value) in [
            ("max_block_batch", sync.max_block_batch),
            ("validator_page_size", u64::from(sync.validator_page_size)),
            ("list_page_size", u64::from(sync.list_page_size)),
            ("validator_every", sync.validator_every),
        ] {
            if value == 0 {
                return Err(IndexerError::ConfigError(format!(
                    "Sync {name} must be at least 1."
                )));
            }
        }

        Ok(())
    }
}

impl From<VocexdConfig> for SyncEngineConfig {
    fn from(cfg: VocexdConfig) -> Self {
        SyncEngineConfig::new(cfg.node, cfg.gateway, cfg.database, cfg.sync)
    }
}

/// Attempts to load config data from a TOML file at the specified path.
///
/// Configuration sources are layered: Env > TOML > Defaults. A missing file leaves the
/// defaults in place. Environment variables are prefixed with `VOCEX_` and use `__` to
/// reach nested fields, e.g. `VOCEX_SYNC__RETRY_CAP=3`.
pub fn load_config(file_path: &PathBuf) -> Result<VocexdConfig, IndexerError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(VocexdConfig::default()))
        .merge(Toml::file(file_path))
        .merge(Env::prefixed("VOCEX_").split("__"));

    match figment.extract::<VocexdConfig>() {
        Ok(parsed_config) => {
            parsed_config.check_config()?;
            info!(
                "Successfully loaded and validated config. Base TOML file checked: '{}'",
                file_path.display()
            );
            Ok(parsed_config)
        }
        Err(figment_error) => {
            error!(
                "Failed to extract configuration using figment: {}",
                figment_error
            );
            Err(IndexerError::ConfigError(format!(
                "Vocex configuration loading failed during figment extract '{}' (could be TOML file or environment variables). Details: {}",
                file_path.display(), figment_error
            )))
        }
    }
}
