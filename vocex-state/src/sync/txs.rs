//! Transaction indexing for the blocks of a tick, including vote envelopes.

use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vocex_fetch::rpc::response::TxResponse;

use super::{
    blocks::FetchedBlock,
    retry::retry_with_cap,
    vote::{self, ChainTx, VoteTx},
    SyncEngine,
};
use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    store::{
        keys::{self, decode_hex_id, id_key, normalize_hex, scoped_seq_key, seq_key},
        WriteBatch,
    },
    types::{EnvelopeRecord, HeightMap, TxExecution, TxRecord},
};

/// Envelope counters, guarded separately from the proposer ledger.
pub(super) struct EnvelopeLedger {
    /// Last global envelope height handed out.
    pub(super) height: u64,
    /// Envelopes per process id.
    pub(super) processes: HeightMap,
}

/// Indexes the transactions of one block.
pub(super) struct TxIndexer<N: NodeSource, G: GatewaySource> {
    pub(super) engine: SyncEngine<N, G>,
    pub(super) token: CancellationToken,
    pub(super) batch: Arc<WriteBatch>,
    pub(super) envelopes: Arc<Mutex<EnvelopeLedger>>,
}

impl<N: NodeSource, G: GatewaySource> TxIndexer<N, G> {
    /// Indexes `block`'s transactions under contiguous heights starting at
    /// `first_tx_height`, in block order.
    pub(super) async fn index_block(
        self,
        block: FetchedBlock,
        first_tx_height: u64,
    ) -> Result<(), SyncError> {
        let count = block.txs.len();
        for (index, raw) in block.txs.into_iter().enumerate() {
            let tx_height = first_tx_height + index as u64;
            let hash = Sha256::digest(&raw).to_vec();

            let operation = format!("tx {}", hex::encode(&hash));
            let response = retry_with_cap(
                &operation,
                self.engine.config.retry_cap,
                &self.token,
                || self.engine.node.tx(&hash, false),
            )
            .await?;

            let nullifier = match ChainTx::decode(&raw) {
                Ok(ChainTx::Vote(vote)) => self.index_envelope(vote, tx_height),
                Ok(ChainTx::Other) => String::new(),
                Err(e) => {
                    debug!("tx {} is not a chain transaction: {e}", hex::encode(&hash));
                    String::new()
                }
            };

            let record = TxRecord {
                hash,
                tx_height,
                block_height: block.height,
                index: index as u32,
                tx: raw,
                result: execution(&response),
                nullifier,
            };
            // Identical bytes in a later block keep the first record.
            self.batch
                .put_record_once(id_key(keys::TX_BY_HASH, &record.hash), &record);
            self.batch
                .put(seq_key(keys::TX_HASH_BY_HEIGHT, tx_height), record.hash);
        }
        debug!(
            "{count} transactions indexed at block {}, last height {}",
            block.height,
            first_tx_height + count as u64 - 1
        );
        Ok(())
    }

    /// Assigns the envelope its global and per-process heights, queues its records and
    /// returns its hex nullifier.
    ///
    /// A signer that cannot be recovered leaves the nullifier empty and the envelope
    /// unindexed by nullifier.
    fn index_envelope(&self, vote: VoteTx, tx_height: u64) -> String {
        let process_id = normalize_hex(&vote.process_id);
        let raw_process_id = match decode_hex_id(&process_id) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("vote carries an invalid process id {}: {e}", vote.process_id);
                None
            }
        };

        let nullifier = match (vote.signer(), &raw_process_id) {
            (Ok(address), Some(raw_pid)) => Some(vote::nullifier(&address, raw_pid)),
            (Err(e), _) => {
                warn!("cannot recover vote signer: {e}");
                None
            }
            (Ok(_), None) => None,
        };

        let (global_height, process_height) = {
            let mut ledger = self
                .envelopes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            ledger.height += 1;
            let process_height = ledger.processes.increment(&process_id);
            (ledger.height, process_height)
        };

        let record = EnvelopeRecord {
            process_id,
            package: vote.vote_package,
            nullifier: nullifier.map(hex::encode).unwrap_or_default(),
            global_height,
            process_height,
            tx_height,
            key_indexes: vote.encryption_key_indexes,
        };
        self.batch.put_record(
            seq_key(keys::ENVELOPE_BY_HEIGHT, global_height),
            &record,
        );
        if let Some(nullifier) = nullifier {
            self.batch
                .put_seq(id_key(keys::ENVELOPE_BY_NULLIFIER, &nullifier), global_height);
        }
        if let Some(raw_pid) = raw_process_id {
            self.batch.put_seq(
                scoped_seq_key(keys::ENVELOPE_BY_PROCESS, &raw_pid, process_height),
                global_height,
            );
        }
        record.nullifier
    }
}

fn execution(response: &TxResponse) -> TxExecution {
    let result = &response.tx_result;
    TxExecution {
        code: result.code,
        data: result.data.clone(),
        log: result.log.clone(),
        gas_wanted: result.gas_wanted,
        gas_used: result.gas_used,
    }
}
