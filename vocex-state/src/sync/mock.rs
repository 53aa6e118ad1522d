//! In-process node and gateway fakes driving the sync routines in tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use secp256k1::{Message, SecretKey, SECP256K1};
use vocex_common::SyncConfig;
use vocex_fetch::{
    gateway::{error::GatewayError, types::ProcessResults},
    rpc::{
        error::{RpcError, RpcRequestError},
        response::{
            Block, BlockData, BlockHeader, BlockId, BlockResponse, GenesisDoc, GenesisResponse,
            NodeInfo, PubKey, StatusResponse, SyncInfo, TxResponse, TxResult, Validator,
            ValidatorsResponse,
        },
    },
};

use super::{
    vote::{keccak256, personal_message_hash, VoteTx},
    SyncEngine,
};
use crate::{
    source::{GatewaySource, NodeSource},
    store::{tests::open_temp_db, ExplorerDb},
};

#[derive(Default)]
struct NodeState {
    latest: u64,
    blocks: BTreeMap<u64, (Vec<u8>, Vec<Vec<u8>>)>,
    delays: HashMap<u64, Duration>,
    validators: Vec<Validator>,
    failing: bool,
    block_calls: Vec<u64>,
    validator_pages: Vec<u32>,
}

/// A consensus node serving blocks and validators from memory.
#[derive(Clone, Default)]
pub(crate) struct MockNode {
    state: Arc<Mutex<NodeState>>,
}

impl MockNode {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds the block at `height` and raises the reported chain head to it.
    pub(crate) fn add_block(&self, height: u64, proposer: &[u8], txs: Vec<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        state.blocks.insert(height, (proposer.to_vec(), txs));
        state.latest = state.latest.max(height);
    }

    /// Reports `height` as the chain head without serving any block.
    pub(crate) fn set_latest(&self, height: u64) {
        self.state.lock().unwrap().latest = height;
    }

    /// Delays the response for the block at `height`.
    pub(crate) fn delay_block(&self, height: u64, delay: Duration) {
        self.state.lock().unwrap().delays.insert(height, delay);
    }

    /// Replaces the validator set with `count` validators.
    pub(crate) fn set_validators(&self, count: usize) {
        self.state.lock().unwrap().validators = (0..count)
            .map(|i| Validator {
                address: validator_address(i),
                pub_key: PubKey {
                    key_type: "tendermint/PubKeyEd25519".to_string(),
                    value: vec![i as u8; 32],
                },
                voting_power: 10,
                proposer_priority: 0,
            })
            .collect();
    }

    /// Makes every call fail until switched off.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Heights requested through `block`, in call order.
    pub(crate) fn block_calls(&self) -> Vec<u64> {
        self.state.lock().unwrap().block_calls.clone()
    }

    /// Pages requested through `validators`, in call order.
    pub(crate) fn validator_pages(&self) -> Vec<u32> {
        self.state.lock().unwrap().validator_pages.clone()
    }

    fn check_failing(&self) -> Result<(), RpcRequestError> {
        if self.state.lock().unwrap().failing {
            return Err(RpcRequestError::Timeout);
        }
        Ok(())
    }
}

/// Address of the `i`th mock validator.
pub(crate) fn validator_address(i: usize) -> Vec<u8> {
    let mut address = vec![0xa0; 12];
    address.extend_from_slice(&(i as u64).to_be_bytes());
    address
}

/// Hash the mock node gives the block at `height`.
pub(crate) fn block_hash(height: u64) -> Vec<u8> {
    let mut hash = vec![0xb1; 24];
    hash.extend_from_slice(&height.to_be_bytes());
    hash
}

fn block_time(height: u64) -> String {
    format!("2020-06-01T10:{:02}:{:02}Z", (height / 60) % 60, height % 60)
}

fn not_found(what: String) -> RpcRequestError {
    RpcRequestError::Method(RpcError {
        code: -32603,
        message: "Internal error".to_string(),
        data: Some(what),
    })
}

#[async_trait]
impl NodeSource for MockNode {
    async fn status(&self) -> Result<StatusResponse, RpcRequestError> {
        self.check_failing()?;
        let latest = self.state.lock().unwrap().latest;
        Ok(StatusResponse {
            node_info: NodeInfo {
                network: "vochain-test".to_string(),
                version: "0.34.0".to_string(),
                moniker: "mock".to_string(),
            },
            sync_info: SyncInfo {
                latest_block_hash: block_hash(latest),
                latest_block_height: latest,
                latest_block_time: block_time(latest),
                catching_up: false,
            },
        })
    }

    async fn genesis(&self) -> Result<GenesisResponse, RpcRequestError> {
        self.check_failing()?;
        Ok(GenesisResponse {
            genesis: GenesisDoc {
                genesis_time: "2020-06-01T10:00:00Z".to_string(),
                chain_id: "vochain-test".to_string(),
            },
        })
    }

    async fn block(&self, height: u64) -> Result<BlockResponse, RpcRequestError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.block_calls.push(height);
            state.delays.get(&height).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        let (proposer, txs) = self
            .state
            .lock()
            .unwrap()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| not_found(format!("height {height} is not available")))?;
        Ok(BlockResponse {
            block_id: BlockId {
                hash: block_hash(height),
            },
            block: Block {
                header: BlockHeader {
                    chain_id: "vochain-test".to_string(),
                    height,
                    time: block_time(height),
                    proposer_address: proposer,
                },
                data: BlockData { txs },
            },
        })
    }

    async fn validators(
        &self,
        height: u64,
        page: u32,
        per_page: u32,
    ) -> Result<ValidatorsResponse, RpcRequestError> {
        self.check_failing()?;
        let mut state = self.state.lock().unwrap();
        state.validator_pages.push(page);
        let total = state.validators.len();
        let start = (page as usize - 1) * per_page as usize;
        if start >= total && page > 1 {
            return Err(not_found(format!("page should be within [1, {}]", page - 1)));
        }
        let validators: Vec<Validator> = state
            .validators
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect();
        Ok(ValidatorsResponse {
            block_height: height,
            count: validators.len() as u64,
            total: total as u64,
            validators,
        })
    }

    async fn tx(&self, hash: &[u8], _prove: bool) -> Result<TxResponse, RpcRequestError> {
        self.check_failing()?;
        Ok(TxResponse {
            hash: hash.to_vec(),
            height: 0,
            index: 0,
            tx_result: TxResult {
                log: "ok".to_string(),
                gas_used: 1,
                ..Default::default()
            },
            tx: Vec::new(),
        })
    }
}

#[derive(Default)]
struct GatewayState {
    entities: Vec<String>,
    processes: BTreeMap<String, Vec<String>>,
    failing: bool,
}

/// An application gateway serving entities and processes from memory.
#[derive(Clone, Default)]
pub(crate) struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_entity(&self, id: &str) {
        self.state.lock().unwrap().entities.push(id.to_string());
    }

    /// Adds a process owned by `entity` (normalised hex).
    pub(crate) fn add_process(&self, entity: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .processes
            .entry(entity.to_string())
            .or_default()
            .push(id.to_string());
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    fn check_failing(&self, method: &str) -> Result<(), GatewayError> {
        if self.state.lock().unwrap().failing {
            return Err(GatewayError::Timeout(method.to_string()));
        }
        Ok(())
    }
}

/// Up to `list_size` ids listed after `from_id`, or from the start when it is empty.
fn page_after(ids: &[String], from_id: &str, list_size: u32) -> Vec<String> {
    let from = from_id.trim_start_matches("0x").to_lowercase();
    let start = if from.is_empty() {
        0
    } else {
        ids.iter()
            .position(|id| id.trim_start_matches("0x").to_lowercase() == from)
            .map_or(ids.len(), |position| position + 1)
    };
    ids.iter().skip(start).take(list_size as usize).cloned().collect()
}

#[async_trait]
impl GatewaySource for MockGateway {
    async fn entity_count(&self) -> Result<u64, GatewayError> {
        self.check_failing("getScrutinizerEntityCount")?;
        Ok(self.state.lock().unwrap().entities.len() as u64)
    }

    async fn process_count(&self) -> Result<u64, GatewayError> {
        self.check_failing("getProcessCount")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .processes
            .values()
            .map(|processes| processes.len() as u64)
            .sum())
    }

    async fn entity_list(
        &self,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        self.check_failing("getEntityList")?;
        Ok(page_after(&self.state.lock().unwrap().entities, from_id, list_size))
    }

    async fn process_list(
        &self,
        entity_id: &str,
        from_id: &str,
        list_size: u32,
    ) -> Result<Vec<String>, GatewayError> {
        self.check_failing("getProcessList")?;
        let state = self.state.lock().unwrap();
        let processes = state.processes.get(entity_id).cloned().unwrap_or_default();
        Ok(page_after(&processes, from_id, list_size))
    }

    async fn results(&self, _process_id: &str) -> Result<ProcessResults, GatewayError> {
        self.check_failing("getResults")?;
        Ok(ProcessResults::default())
    }
}

/// Tuning that keeps test ticks short.
pub(crate) fn test_config() -> SyncConfig {
    SyncConfig {
        max_block_batch: 100,
        validator_page_size: 100,
        list_page_size: 100,
        retry_cap: 2,
        idle_wait_ms: 1,
        tick_interval_ms: 1,
        validator_every: 1,
    }
}

/// An engine over the fakes and a fresh temporary store.
pub(crate) async fn test_engine(
    node: &MockNode,
    gateway: &MockGateway,
) -> (tempfile::TempDir, SyncEngine<MockNode, MockGateway>) {
    let (dir, db) = open_temp_db().await;
    let engine = SyncEngine::new(node.clone(), gateway.clone(), db, test_config());
    (dir, engine)
}

/// Stores `value` under the counter `key`.
pub(crate) async fn seed_counter(db: &ExplorerDb, key: &[u8], value: u64) {
    let batch = crate::store::WriteBatch::new();
    batch.put_counter(key, value);
    batch.commit(db).await.unwrap();
}

/// A raw vote transaction for `process_id` signed by `secret`, with the signer address.
pub(crate) fn signed_vote(process_id: &str, secret: &SecretKey) -> (Vec<u8>, [u8; 20]) {
    let vote = VoteTx {
        nonce: "5e1f".to_string(),
        process_id: process_id.to_string(),
        vote_package: "eyJ2b3RlcyI6WzFdfQ==".to_string(),
        ..Default::default()
    };
    let digest = Message::from_slice(&personal_message_hash(&vote.signed_bytes().unwrap())).unwrap();
    let (recovery_id, compact) = SECP256K1
        .sign_ecdsa_recoverable(&digest, secret)
        .serialize_compact();
    let mut signature = compact.to_vec();
    signature.push(recovery_id.to_i32() as u8 + 27);

    let mut json = serde_json::to_value(&vote).unwrap();
    json["type"] = serde_json::Value::from("vote");
    json["signature"] = serde_json::Value::from(hex::encode(signature));

    let public_key = secp256k1::PublicKey::from_secret_key(SECP256K1, secret);
    let hashed = keccak256(&public_key.serialize_uncompressed()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hashed[12..]);
    (serde_json::to_vec(&json).unwrap(), address)
}
