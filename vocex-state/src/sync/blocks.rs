//! Block tick: fetches new blocks concurrently, credits proposers in height order and
//! commits blocks, transactions and envelopes together.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vocex_fetch::rpc::response::{GenesisDoc, StatusResponse};

use super::{
    retry::retry_with_cap,
    txs::{EnvelopeLedger, TxIndexer},
    unix_seconds, Routine, SyncEngine,
};
use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    store::{
        keys::{self, id_key, scoped_seq_key, seq_key},
        WriteBatch,
    },
    types::{minute_of, BlockRecord, BlockchainInfo, HeightMap, TxStats},
};

/// State shared by the block fetches of one tick.
struct BlockTick {
    batch: Arc<WriteBatch>,
    ledger: Mutex<ProposerLedger>,
    fault: AtomicBool,
}

/// Updated in strict height order, one block at a time.
#[derive(Default)]
struct ProposerLedger {
    validators: HeightMap,
    stats: TxStats,
    txs_by_minute: BTreeMap<i64, u64>,
}

/// A block fetched and credited during the tick.
pub(super) struct FetchedBlock {
    pub(super) height: u64,
    pub(super) txs: Vec<Vec<u8>>,
}

impl<N: NodeSource, G: GatewaySource> SyncEngine<N, G> {
    /// Runs one block tick and returns the number of blocks committed.
    ///
    /// Sleeps for the idle interval and writes nothing when the node has no new blocks.
    pub async fn sync_blocks(&self) -> Result<u64, SyncError> {
        let token = self.token(Routine::Blocks).clone();
        let cap = self.config.retry_cap;

        let local = self.db.get_counter(keys::LATEST_BLOCK_HEIGHT, 0).await?;
        let status = retry_with_cap("status", cap, &token, || self.node.status()).await?;
        let remote = status.sync_info.latest_block_height;

        if remote <= local {
            tokio::time::sleep(Duration::from_millis(self.config.idle_wait_ms)).await;
            return Ok(0);
        }
        let batch_size = self.config.max_block_batch.min(remote - local);
        debug!("fetching blocks {} to {}", local + 1, local + batch_size);

        let batch = Arc::new(WriteBatch::new());
        let tick = Arc::new(BlockTick {
            batch: Arc::clone(&batch),
            ledger: Mutex::new(ProposerLedger {
                validators: self.db.get_height_map(keys::VALIDATOR_HEIGHT_MAP).await?,
                stats: self.db.tx_stats().await?,
                txs_by_minute: BTreeMap::new(),
            }),
            fault: AtomicBool::new(false),
        });

        // Relay baton: fetch(i) waits on the receiver whose sender fetch(i-1) holds.
        let mut handles = Vec::with_capacity(batch_size as usize);
        let mut baton: Option<oneshot::Receiver<()>> = None;
        for height in local + 1..=local + batch_size {
            let (next, next_baton) = oneshot::channel();
            let engine = self.clone();
            let tick = Arc::clone(&tick);
            handles.push(tokio::spawn(async move {
                engine.fetch_block(height, baton, next, tick).await
            }));
            baton = Some(next_baton);
        }

        let mut blocks = Vec::with_capacity(handles.len());
        for result in join_all(handles).await {
            if let Some(block) = result?? {
                blocks.push(block);
            }
        }
        if tick.fault.load(Ordering::SeqCst) || blocks.len() as u64 != batch_size {
            debug!("could not fetch blocks, abandoning tick");
            return Ok(0);
        }

        // Transaction heights are handed out in block order before the blocks fan out.
        let mut tx_height = self.db.get_counter(keys::LATEST_TX_HEIGHT, 0).await?;
        let envelopes = Arc::new(Mutex::new(EnvelopeLedger {
            height: self.db.get_counter(keys::LATEST_ENVELOPE_HEIGHT, 0).await?,
            processes: self.db.get_height_map(keys::PROCESS_ENVELOPE_MAP).await?,
        }));
        let mut handles = Vec::new();
        for block in blocks {
            if block.txs.is_empty() {
                continue;
            }
            let first_tx_height = tx_height + 1;
            tx_height += block.txs.len() as u64;
            let indexer = TxIndexer {
                engine: self.clone(),
                token: token.clone(),
                batch: Arc::clone(&batch),
                envelopes: Arc::clone(&envelopes),
            };
            handles.push(tokio::spawn(async move {
                indexer.index_block(block, first_tx_height).await
            }));
        }
        for result in join_all(handles).await {
            result??;
        }

        let genesis = self.genesis_doc(&token).await?;

        let ProposerLedger {
            validators,
            mut stats,
            txs_by_minute,
        } = std::mem::take(&mut *tick.ledger.lock().unwrap_or_else(PoisonError::into_inner));
        for (minute, count) in txs_by_minute {
            stats.observe_minute(minute, count);
        }
        let (envelope_height, processes) = {
            let ledger = envelopes.lock().unwrap_or_else(PoisonError::into_inner);
            (ledger.height, ledger.processes.clone())
        };

        batch.put_record(keys::VALIDATOR_HEIGHT_MAP.to_vec(), &validators);
        batch.put_record(keys::PROCESS_ENVELOPE_MAP.to_vec(), &processes);
        batch.put_record(keys::MAX_TXS_PER_BLOCK.to_vec(), &stats.per_block);
        batch.put_record(keys::MAX_TXS_PER_MINUTE.to_vec(), &stats.per_minute);
        batch.put_record(
            keys::BLOCKCHAIN_INFO.to_vec(),
            &blockchain_info(&status, &genesis),
        );
        batch.put_counter(keys::LATEST_BLOCK_HEIGHT, local + batch_size);
        batch.put_counter(keys::LATEST_TX_HEIGHT, tx_height);
        batch.put_counter(keys::LATEST_ENVELOPE_HEIGHT, envelope_height);
        batch.commit(&self.db).await?;

        info!("Setting block {}", local + batch_size);
        Ok(batch_size)
    }

    /// Fetches one block, waits for its turn on the baton, credits its proposer and queues
    /// its records.
    ///
    /// `next` is sent or dropped on every exit path, so a failed fetch never stalls the
    /// fetches after it.
    async fn fetch_block(
        self,
        height: u64,
        baton: Option<oneshot::Receiver<()>>,
        next: oneshot::Sender<()>,
        tick: Arc<BlockTick>,
    ) -> Result<Option<FetchedBlock>, SyncError> {
        let token = self.token(Routine::Blocks).clone();
        if tick.fault.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let operation = format!("block {height}");
        let response = match retry_with_cap(&operation, self.config.retry_cap, &token, || {
            self.node.block(height)
        })
        .await
        {
            Ok(response) => response,
            Err(e) => {
                tick.fault.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        if let Some(baton) = baton {
            // A dropped sender releases us too.
            let _ = baton.await;
        }
        if tick.fault.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let header = response.block.header;
        let txs = response.block.data.txs;
        let record = BlockRecord {
            height: header.height,
            hash: response.block_id.hash,
            proposer: header.proposer_address,
            num_txs: txs.len() as u64,
            time: unix_seconds(&header.time),
        };

        let validator_seq = {
            let mut ledger = tick.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            let seq = ledger.validators.increment(&hex::encode(&record.proposer));
            ledger
                .stats
                .observe_block(record.height, &record.hash, record.num_txs);
            *ledger
                .txs_by_minute
                .entry(minute_of(record.time))
                .or_insert(0) += record.num_txs;
            seq
        };
        let _ = next.send(());

        tick.batch
            .put_record(id_key(keys::BLOCK_BY_HASH, &record.hash), &record);
        tick.batch.put(
            seq_key(keys::BLOCK_HASH_BY_HEIGHT, record.height),
            record.hash.clone(),
        );
        tick.batch.put(
            scoped_seq_key(keys::BLOCK_HASH_BY_VALIDATOR, &record.proposer, validator_seq),
            record.hash,
        );

        Ok(Some(FetchedBlock { height, txs }))
    }

    /// The genesis document, fetched once per engine.
    async fn genesis_doc(&self, token: &CancellationToken) -> Result<GenesisDoc, SyncError> {
        let genesis = self
            .genesis
            .get_or_try_init(|| async {
                retry_with_cap("genesis", self.config.retry_cap, token, || {
                    self.node.genesis()
                })
                .await
                .map(|response| response.genesis)
            })
            .await?;
        Ok(genesis.clone())
    }
}

fn blockchain_info(status: &StatusResponse, genesis: &GenesisDoc) -> BlockchainInfo {
    BlockchainInfo {
        network: status.node_info.network.clone(),
        version: status.node_info.version.clone(),
        chain_id: genesis.chain_id.clone(),
        latest_block_height: status.sync_info.latest_block_height,
        latest_block_hash: status.sync_info.latest_block_hash.clone(),
        latest_block_time: unix_seconds(&status.sync_info.latest_block_time),
        genesis_time: unix_seconds(&genesis.genesis_time),
        syncing: status.sync_info.catching_up,
    }
}
