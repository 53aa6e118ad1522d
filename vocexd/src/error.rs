//! Hold error types for the Indexer and related functionality.

use vocex_fetch::{gateway::error::GatewayError, rpc::error::TransportError};
use vocex_state::{StoreError, SyncError};

/// Vocex daemon errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Configuration errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Node connection pool errors.
    #[error("Node transport error: {0}")]
    TransportError(#[from] TransportError),
    /// Gateway client errors.
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),
    /// Explorer store errors.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    /// Sync routine errors.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
    /// Returned from tokio joinhandles.
    #[error("Join handle error: {0}")]
    TokioJoinError(#[from] tokio::task::JoinError),
}
