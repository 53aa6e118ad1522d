//! Vocex: the explorer sync daemon.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};
use vocex_common::{GatewayConfig, NodeConfig, SyncConfig};
use vocex_fetch::{gateway::connector::GatewayConnector, rpc::connector::NodeConnector};
use vocex_state::{
    ExplorerDb, Routine, RoutineTokens, StatusType, SyncEngine, SyncEngineConfig,
};

use crate::{config::VocexdConfig, error::IndexerError};

/// Pause between start-up connection attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Vocex, the explorer indexer.
pub struct Indexer {
    /// Sync engine, absent when running detached.
    engine: Option<SyncEngine<NodeConnector, GatewayConnector>>,
    /// Node and gateway clients, closed on shutdown.
    clients: Option<(NodeConnector, GatewayConnector)>,
    /// Explorer store.
    db: ExplorerDb,
    /// Routine termination signals; cancelling all of them stops the daemon.
    tokens: RoutineTokens,
    sync: SyncConfig,
}

/// Starts Indexer service.
///
/// Returns the scheduler task and the routine tokens; cancelling every token shuts the
/// indexer down.
pub async fn start_indexer(
    config: VocexdConfig,
) -> Result<
    (
        tokio::task::JoinHandle<Result<(), IndexerError>>,
        RoutineTokens,
    ),
    IndexerError,
> {
    info!("Starting Vocex..");
    spawn_indexer(config).await
}

/// Spawns a new Indexer.
///
/// If the node or the gateway cannot be reached the indexer runs detached: the store is
/// opened but no routine is scheduled.
pub async fn spawn_indexer(
    config: VocexdConfig,
) -> Result<
    (
        tokio::task::JoinHandle<Result<(), IndexerError>>,
        RoutineTokens,
    ),
    IndexerError,
> {
    config.check_config()?;
    let config = SyncEngineConfig::from(config);

    info!("Checking connection with node..");
    let node = connect_node(&config.node).await;
    info!("Checking connection with gateway..");
    let gateway = connect_gateway(&config.gateway).await;

    let db = ExplorerDb::spawn(&config.database).await?;
    info!(
        " - Explorer store opened at {}.",
        config.database.env_path().display()
    );

    let indexer = match (node, gateway) {
        (Some(node), Some(gateway)) => {
            let engine = SyncEngine::new(
                node.clone(),
                gateway.clone(),
                db.clone(),
                config.sync.clone(),
            );
            Indexer {
                tokens: engine.tokens().clone(),
                engine: Some(engine),
                clients: Some((node, gateway)),
                db,
                sync: config.sync,
            }
        }
        (node, gateway) => {
            warn!("Upstream services unreachable, running detached without sync routines.");
            if let Some(node) = node {
                node.close().await;
            }
            if let Some(gateway) = gateway {
                gateway.close().await;
            }
            Indexer {
                engine: None,
                clients: None,
                db,
                tokens: RoutineTokens::new(),
                sync: config.sync,
            }
        }
    };

    let tokens = indexer.tokens.clone();
    Ok((indexer.launch(), tokens))
}

/// Dials the node, retrying up to the configured number of attempts.
async fn connect_node(config: &NodeConfig) -> Option<NodeConnector> {
    for attempt in 1..=config.connect_attempts {
        match NodeConnector::connect(config).await {
            Ok(node) => {
                info!(" - Connected to node at {}.", config.rpc_url);
                return Some(node);
            }
            Err(e) => {
                warn!(
                    "Node connection attempt {attempt}/{} failed: {e}",
                    config.connect_attempts
                );
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
    error!("Could not connect to node at {}.", config.rpc_url);
    None
}

/// Connects to the gateway, retrying up to the configured number of attempts.
async fn connect_gateway(config: &GatewayConfig) -> Option<GatewayConnector> {
    for attempt in 1..=config.connect_attempts {
        match GatewayConnector::connect(config).await {
            Ok(gateway) => {
                info!(" - Connected to gateway at {}.", config.url);
                return Some(gateway);
            }
            Err(e) => {
                warn!(
                    "Gateway connection attempt {attempt}/{} failed: {e}",
                    config.connect_attempts
                );
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
    error!("Could not connect to gateway at {}.", config.url);
    None
}

impl Indexer {
    /// Runs the scheduler loop until every routine has been terminated.
    ///
    /// Blocks run every iteration, validators every `validator_every`th iteration starting
    /// with the first, then entities and processes.
    fn launch(mut self) -> tokio::task::JoinHandle<Result<(), IndexerError>> {
        let tick_interval = Duration::from_millis(self.sync.tick_interval_ms);
        let validator_every = self.sync.validator_every.max(1);
        let mut last_log_time = Instant::now();
        let log_interval = Duration::from_secs(10);

        tokio::task::spawn(async move {
            let mut iteration: u64 = 0;
            loop {
                // Log the indexer status.
                if last_log_time.elapsed() >= log_interval {
                    self.log_status();
                    last_log_time = Instant::now();
                }

                // Check for shutdown signals.
                if self.check_for_shutdown() {
                    self.close().await;
                    return Ok(());
                }

                if let Some(engine) = &self.engine {
                    for routine in Routine::ALL {
                        if routine == Routine::Validators && iteration % validator_every != 0 {
                            continue;
                        }
                        if let Err(e) = engine.run_routine(routine).await {
                            if engine.tokens().is_cancelled(routine) {
                                error!("{routine} routine terminated: {e}");
                            }
                        }
                    }
                    iteration = iteration.wrapping_add(1);
                }

                tokio::time::sleep(tick_interval).await;
            }
        })
    }

    /// True once every routine has been terminated.
    fn check_for_shutdown(&self) -> bool {
        self.tokens.all_cancelled()
    }

    /// Closes the upstream connections and the store.
    async fn close(&mut self) {
        info!("Closing Vocex..");
        self.engine = None;
        if let Some((node, gateway)) = self.clients.take() {
            node.close().await;
            gateway.close().await;
        }
        self.db.close().await;
    }

    /// Returns the current StatusType of the indexer.
    pub fn status(&self) -> StatusType {
        match &self.engine {
            Some(engine) => StatusType::combine(engine.status(), self.db.status()),
            None => self.db.status(),
        }
    }

    /// Logs the indexer status, one entry per routine.
    pub fn log_status(&self) {
        let store_status = self.db.status();
        let Some(engine) = &self.engine else {
            info!(
                "Vocex status check (detached) - Store:{}{}",
                store_status.get_status_symbol(),
                store_status
            );
            return;
        };
        let routines = Routine::ALL
            .iter()
            .map(|routine| {
                let status = engine.routine_status(*routine);
                format!("{routine}:{}{status}", status.get_status_symbol())
            })
            .collect::<Vec<_>>()
            .join(" ");
        let status = self.status();
        info!(
            "Vocex status check - Engine:{}{} Store:{}{} {routines}",
            status.get_status_symbol(),
            status,
            store_status.get_status_symbol(),
            store_status,
        );
    }
}
