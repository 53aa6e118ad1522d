//! The sync engine and its routines.
//!
//! Each routine runs one tick per call and owns a [`CancellationToken`] that it raises
//! when an upstream call keeps failing past the retry cap. Cancelling one routine never
//! affects the others.

mod blocks;
mod entities;
mod processes;
pub(crate) mod retry;
mod txs;
mod validators;
pub mod vote;

use std::{fmt, sync::Arc};

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vocex_common::SyncConfig;
use vocex_fetch::rpc::response::GenesisDoc;

use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    status::{AtomicStatus, StatusType},
    store::ExplorerDb,
};

/// The independent sync routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    /// Blocks, transactions and vote envelopes.
    Blocks,
    /// The validator set.
    Validators,
    /// Entities.
    Entities,
    /// Voting processes.
    Processes,
}

impl Routine {
    /// Every routine, in scheduling order.
    pub const ALL: [Routine; 4] = [
        Routine::Blocks,
        Routine::Validators,
        Routine::Entities,
        Routine::Processes,
    ];

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Routine::Blocks => "blocks",
            Routine::Validators => "validators",
            Routine::Entities => "entities",
            Routine::Processes => "processes",
        }
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One termination signal per routine.
#[derive(Debug, Clone, Default)]
pub struct RoutineTokens {
    blocks: CancellationToken,
    validators: CancellationToken,
    entities: CancellationToken,
    processes: CancellationToken,
}

impl RoutineTokens {
    /// Fresh, uncancelled tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// The token of `routine`.
    pub fn token(&self, routine: Routine) -> &CancellationToken {
        match routine {
            Routine::Blocks => &self.blocks,
            Routine::Validators => &self.validators,
            Routine::Entities => &self.entities,
            Routine::Processes => &self.processes,
        }
    }

    /// True once `routine` has been terminated.
    pub fn is_cancelled(&self, routine: Routine) -> bool {
        self.token(routine).is_cancelled()
    }

    /// True once every routine has been terminated.
    pub fn all_cancelled(&self) -> bool {
        Routine::ALL.iter().all(|routine| self.is_cancelled(*routine))
    }

    /// Terminates every routine.
    pub fn cancel_all(&self) {
        for routine in Routine::ALL {
            self.token(routine).cancel();
        }
    }
}

/// Mirrors the node and gateway into an [`ExplorerDb`].
///
/// Cloning is cheap; clones share the store, the upstream connections and the tokens.
#[derive(Clone)]
pub struct SyncEngine<N: NodeSource, G: GatewaySource> {
    node: N,
    gateway: G,
    db: ExplorerDb,
    config: SyncConfig,
    tokens: RoutineTokens,
    genesis: Arc<OnceCell<GenesisDoc>>,
    status: AtomicStatus,
}

impl<N: NodeSource, G: GatewaySource> SyncEngine<N, G> {
    /// Returns an engine reading from `node` and `gateway` and writing to `db`.
    pub fn new(node: N, gateway: G, db: ExplorerDb, config: SyncConfig) -> Self {
        SyncEngine {
            node,
            gateway,
            db,
            config,
            tokens: RoutineTokens::new(),
            genesis: Arc::new(OnceCell::new()),
            status: AtomicStatus::new(StatusType::Spawning),
        }
    }

    /// The store the engine writes to.
    pub fn db(&self) -> &ExplorerDb {
        &self.db
    }

    /// The routine termination signals.
    pub fn tokens(&self) -> &RoutineTokens {
        &self.tokens
    }

    /// The engine's tuning.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Engine status: the status of the last tick, or offline once every routine stopped.
    pub fn status(&self) -> StatusType {
        if self.tokens.all_cancelled() {
            return StatusType::Offline;
        }
        self.status.load()
    }

    /// Status of a single routine.
    pub fn routine_status(&self, routine: Routine) -> StatusType {
        if self.tokens.is_cancelled(routine) {
            StatusType::CriticalError
        } else {
            self.status.load()
        }
    }

    /// Runs one tick of `routine` and returns the number of new records it indexed.
    ///
    /// A routine that has been terminated is not run.
    pub async fn run_routine(&self, routine: Routine) -> Result<u64, SyncError> {
        if self.tokens.is_cancelled(routine) {
            debug!("skipping terminated routine {routine}");
            return Ok(0);
        }
        let result = match routine {
            Routine::Blocks => self.sync_blocks().await,
            Routine::Validators => self.sync_validators().await,
            Routine::Entities => self.sync_entities().await,
            Routine::Processes => self.sync_processes().await,
        };
        match &result {
            Ok(0) => self.status.store(StatusType::Ready),
            Ok(_) => self.status.store(StatusType::Syncing),
            Err(e) => {
                warn!("{routine} tick failed: {e}");
                self.status.store(StatusType::RecoverableError);
            }
        }
        result
    }

    pub(crate) fn token(&self, routine: Routine) -> &CancellationToken {
        self.tokens.token(routine)
    }
}

/// Parses an RFC 3339 time into unix seconds, logging and returning zero if it is invalid.
pub(crate) fn unix_seconds(time: &str) -> i64 {
    match chrono::DateTime::parse_from_rfc3339(time) {
        Ok(parsed) => parsed.timestamp(),
        Err(e) => {
            warn!("invalid timestamp {time:?}: {e}");
            0
        }
    }
}

#[cfg(test)]
pub(crate) mod mock;

#[cfg(test)]
mod tests {
    use super::mock::{test_engine, MockGateway, MockNode};
    use super::*;

    #[test]
    fn tokens_are_independent() {
        let tokens = RoutineTokens::new();
        tokens.token(Routine::Entities).cancel();
        assert!(tokens.is_cancelled(Routine::Entities));
        assert!(!tokens.is_cancelled(Routine::Blocks));
        assert!(!tokens.all_cancelled());

        tokens.cancel_all();
        assert!(tokens.all_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminated_routines_are_skipped() {
        let node = MockNode::new();
        node.add_block(1, &[0x01; 20], Vec::new());
        node.set_failing(true);
        let (_dir, engine) = test_engine(&node, &MockGateway::new()).await;

        assert!(engine.run_routine(Routine::Blocks).await.is_err());
        assert_eq!(engine.routine_status(Routine::Blocks), StatusType::CriticalError);
        assert_eq!(engine.status(), StatusType::RecoverableError);
        assert!(!engine.tokens().is_cancelled(Routine::Entities));

        node.set_failing(false);
        assert_eq!(engine.run_routine(Routine::Blocks).await.unwrap(), 0);
        assert!(engine.db().block_by_height(1).await.unwrap().is_none());

        engine.tokens().cancel_all();
        assert_eq!(engine.status(), StatusType::Offline);
    }

    #[test]
    fn timestamps_parse_to_unix_seconds() {
        assert_eq!(unix_seconds("1970-01-01T00:01:00.123456789Z"), 60);
        assert_eq!(unix_seconds("garbage"), 0);
    }
}
