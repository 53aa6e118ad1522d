//! Vocex's explorer store and sync engine.
//!
//! Mirrors blocks, transactions, vote envelopes, validators, entities and voting processes
//! from a consensus node and an application gateway into an append-only LMDB store:
//! - [`ExplorerDb`]
//!    - Batched writes, durable cursors and height maps, prefix search and typed lookups.
//! - [`SyncEngine`]
//!    - Per-tick sync routines, each with its own retry cap and cancellation token.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub(crate) mod config;

pub use config::SyncEngineConfig;

pub(crate) mod error;

pub use error::{StatusError, StoreError, SyncError};

pub(crate) mod status;

pub use status::{AtomicStatus, StatusType};

pub mod source;

pub use source::{GatewaySource, NodeSource};

pub mod store;

pub use store::{ExplorerDb, WriteBatch};

pub mod sync;

pub use sync::{Routine, RoutineTokens, SyncEngine};

pub mod types;

pub use types::{
    BlockRecord, BlockchainInfo, EntityRecord, EnvelopeRecord, HeightMap, ProcessRecord, TxRecord,
    TxStats, ValidatorRecord,
};
