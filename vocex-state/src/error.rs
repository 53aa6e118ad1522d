//! Holds error types for the explorer store and sync engine.

use vocex_fetch::{gateway::error::GatewayError, rpc::error::RpcRequestError};

use crate::status::StatusType;

/// Errors related to the explorer store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Custom Errors.
    #[error("Custom error: {0}")]
    Custom(String),

    /// Required data is missing from the store.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Error from the LMDB database.
    #[error("LMDB database error: {0}")]
    LmdbError(#[from] lmdb::Error),

    /// std::io::Error, also raised by record encoding and decoding.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised by a sync routine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Error from the node RPC client.
    #[error("Node RPC error: {0}")]
    NodeError(#[from] RpcRequestError),

    /// Error from the gateway client.
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),

    /// Error from the explorer store.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// An upstream call kept failing past the retry cap. The routine has been cancelled.
    #[error("{operation} failed {attempts} times, routine cancelled")]
    RetryLimit {
        /// Name of the operation that failed.
        operation: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The routine was cancelled while the operation was pending.
    #[error("{0} aborted, routine cancelled")]
    Cancelled(String),

    /// A task of the tick panicked or was aborted.
    #[error("Sync task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// A general error type to represent error StatusTypes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unexpected status error: {0:?}")]
pub struct StatusError(pub StatusType);
