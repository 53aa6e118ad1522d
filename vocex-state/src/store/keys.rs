//! Key layout of the explorer store.
//!
//! Every record lives in one LMDB database under a three byte namespace prefix. Sequence
//! suffixes are 8-byte big-endian so that cursor order equals numeric order.

use crate::store::encoding::encode_seq;

/// Block record by block hash.
pub const BLOCK_BY_HASH: &[u8] = b"bid";
/// Block hash by block height.
pub const BLOCK_HASH_BY_HEIGHT: &[u8] = b"bh_";
/// Block hash by proposer address and proposer-local sequence.
pub const BLOCK_HASH_BY_VALIDATOR: &[u8] = b"bv_";
/// Transaction record by transaction hash.
pub const TX_BY_HASH: &[u8] = b"tid";
/// Transaction hash by global transaction height.
pub const TX_HASH_BY_HEIGHT: &[u8] = b"th_";
/// Validator record by address.
pub const VALIDATOR_BY_ADDRESS: &[u8] = b"vid";
/// Validator address by sequence.
pub const VALIDATOR_BY_SEQ: &[u8] = b"vh_";
/// Envelope record by global envelope height.
pub const ENVELOPE_BY_HEIGHT: &[u8] = b"evh";
/// Envelope height by nullifier.
pub const ENVELOPE_BY_NULLIFIER: &[u8] = b"evi";
/// Envelope height by process id and per-process sequence.
pub const ENVELOPE_BY_PROCESS: &[u8] = b"evp";
/// Entity id by entity sequence.
pub const ENTITY_BY_SEQ: &[u8] = b"eh_";
/// Entity sequence by entity id.
pub const ENTITY_BY_ID: &[u8] = b"eid";
/// Process record by global process sequence.
pub const PROCESS_BY_SEQ: &[u8] = b"ph_";
/// Global process sequence by process id.
pub const PROCESS_BY_ID: &[u8] = b"pid";
/// Global process sequence by entity id and entity-local sequence.
pub const PROCESS_BY_ENTITY: &[u8] = b"pe_";

/// Number of blocks stored.
pub const LATEST_BLOCK_HEIGHT: &[u8] = b"LatestBlockHeight";
/// Number of transactions stored.
pub const LATEST_TX_HEIGHT: &[u8] = b"LatestTxHeight";
/// Number of vote envelopes stored.
pub const LATEST_ENVELOPE_HEIGHT: &[u8] = b"LatestEnvHeight";
/// Number of validators stored.
pub const LATEST_VALIDATOR_COUNT: &[u8] = b"LatestValHeight";
/// Number of entities stored.
pub const LATEST_ENTITY_COUNT: &[u8] = b"LatestEntityCountKey";
/// Number of processes stored.
pub const LATEST_PROCESS_COUNT: &[u8] = b"LatestProcessCountKey";
/// Blocks proposed per validator address.
pub const VALIDATOR_HEIGHT_MAP: &[u8] = b"ValHeightMap";
/// Envelopes stored per process id.
pub const PROCESS_ENVELOPE_MAP: &[u8] = b"ProcEnvHeight";
/// Processes stored per entity id.
pub const ENTITY_PROCESS_MAP: &[u8] = b"EntityProcHeight";
/// Latest chain status snapshot.
pub const BLOCKCHAIN_INFO: &[u8] = b"BlockchainInfo";
/// Largest transaction count seen in a single block.
pub const MAX_TXS_PER_BLOCK: &[u8] = b"MaxTxsPerBlock";
/// Largest transaction count seen in a single minute.
pub const MAX_TXS_PER_MINUTE: &[u8] = b"MaxTxsPerMinute";

/// Cursor keys initialised to zero when a store is first opened.
pub const CURSOR_KEYS: [&[u8]; 6] = [
    LATEST_BLOCK_HEIGHT,
    LATEST_TX_HEIGHT,
    LATEST_ENVELOPE_HEIGHT,
    LATEST_VALIDATOR_COUNT,
    LATEST_ENTITY_COUNT,
    LATEST_PROCESS_COUNT,
];

/// Builds `prefix ‖ id`.
pub fn id_key(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

/// Builds `prefix ‖ seq`.
pub fn seq_key(prefix: &[u8], seq: u64) -> Vec<u8> {
    id_key(prefix, &encode_seq(seq))
}

/// Builds `prefix ‖ id ‖ seq`.
pub fn scoped_seq_key(prefix: &[u8], id: &[u8], seq: u64) -> Vec<u8> {
    let mut key = id_key(prefix, id);
    key.extend_from_slice(&encode_seq(seq));
    key
}

/// Strips an optional `0x` prefix and lowercases a hex identifier.
pub fn normalize_hex(id: &str) -> String {
    id.trim_start_matches("0x").to_ascii_lowercase()
}

/// Decodes a hex identifier, with or without a `0x` prefix.
pub fn decode_hex_id(id: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(normalize_hex(id))
}
