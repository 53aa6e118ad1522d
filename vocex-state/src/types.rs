//! Records persisted by the explorer store.
//!
//! Records are append-only: written once by the sync pipeline and never mutated. Only
//! [`HeightMap`], [`BlockchainInfo`] and the [`TxStats`] peaks are overwritten in place.

use std::collections::BTreeMap;

use core2::io::{self, Read, Write};

use crate::store::encoding::{
    read_bytes, read_i64_le, read_string, read_u32_le, read_u64_le, read_vec, write_bytes,
    write_i64_le, write_string, write_u32_le, write_u64_le, write_vec, CompactSize, DbSerde,
};

/// A block, indexed by hash, by height and by (proposer, proposer-local sequence).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRecord {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: Vec<u8>,
    /// Address of the proposing validator.
    pub proposer: Vec<u8>,
    /// Number of transactions in the block.
    pub num_txs: u64,
    /// Block time as unix seconds.
    pub time: i64,
}

impl DbSerde for BlockRecord {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u64_le(&mut *w, self.height)?;
        write_bytes(&mut *w, &self.hash)?;
        write_bytes(&mut *w, &self.proposer)?;
        write_u64_le(&mut *w, self.num_txs)?;
        write_i64_le(&mut *w, self.time)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(BlockRecord {
            height: read_u64_le(&mut *r)?,
            hash: read_bytes(&mut *r)?,
            proposer: read_bytes(&mut *r)?,
            num_txs: read_u64_le(&mut *r)?,
            time: read_i64_le(&mut *r)?,
        })
    }
}

/// Execution outcome of a transaction as reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxExecution {
    /// Result code, zero on success.
    pub code: u32,
    /// Result data.
    pub data: Vec<u8>,
    /// Execution log.
    pub log: String,
    /// Gas requested.
    pub gas_wanted: i64,
    /// Gas consumed.
    pub gas_used: i64,
}

impl DbSerde for TxExecution {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32_le(&mut *w, self.code)?;
        write_bytes(&mut *w, &self.data)?;
        write_string(&mut *w, &self.log)?;
        write_i64_le(&mut *w, self.gas_wanted)?;
        write_i64_le(&mut *w, self.gas_used)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(TxExecution {
            code: read_u32_le(&mut *r)?,
            data: read_bytes(&mut *r)?,
            log: read_string(&mut *r)?,
            gas_wanted: read_i64_le(&mut *r)?,
            gas_used: read_i64_le(&mut *r)?,
        })
    }
}

/// A transaction, indexed by hash and by global transaction height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRecord {
    /// Transaction hash (sha256 of the raw bytes).
    pub hash: Vec<u8>,
    /// Global 1-based transaction height.
    pub tx_height: u64,
    /// Height of the block holding the transaction.
    pub block_height: u64,
    /// Position inside the block.
    pub index: u32,
    /// Raw transaction bytes.
    pub tx: Vec<u8>,
    /// Execution outcome.
    pub result: TxExecution,
    /// Vote nullifier, empty unless the transaction is a vote.
    pub nullifier: String,
}

impl DbSerde for TxRecord {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_bytes(&mut *w, &self.hash)?;
        write_u64_le(&mut *w, self.tx_height)?;
        write_u64_le(&mut *w, self.block_height)?;
        write_u32_le(&mut *w, self.index)?;
        write_bytes(&mut *w, &self.tx)?;
        self.result.encode(w)?;
        write_string(&mut *w, &self.nullifier)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(TxRecord {
            hash: read_bytes(&mut *r)?,
            tx_height: read_u64_le(&mut *r)?,
            block_height: read_u64_le(&mut *r)?,
            index: read_u32_le(&mut *r)?,
            tx: read_bytes(&mut *r)?,
            result: TxExecution::decode(r)?,
            nullifier: read_string(&mut *r)?,
        })
    }
}

/// A validator, indexed by address and by sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorRecord {
    /// Validator address.
    pub address: Vec<u8>,
    /// Raw public key bytes.
    pub pub_key: Vec<u8>,
    /// Voting power.
    pub voting_power: i64,
    /// Proposer priority at the time of indexing.
    pub proposer_priority: i64,
    /// 1-based sequence in discovery order.
    pub seq: u64,
}

impl DbSerde for ValidatorRecord {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_bytes(&mut *w, &self.address)?;
        write_bytes(&mut *w, &self.pub_key)?;
        write_i64_le(&mut *w, self.voting_power)?;
        write_i64_le(&mut *w, self.proposer_priority)?;
        write_u64_le(&mut *w, self.seq)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(ValidatorRecord {
            address: read_bytes(&mut *r)?,
            pub_key: read_bytes(&mut *r)?,
            voting_power: read_i64_le(&mut *r)?,
            proposer_priority: read_i64_le(&mut *r)?,
            seq: read_u64_le(&mut *r)?,
        })
    }
}

/// A vote envelope, indexed by global height, by nullifier and by (process, process sequence).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeRecord {
    /// Hex process id.
    pub process_id: String,
    /// Vote package as submitted.
    pub package: String,
    /// Hex nullifier.
    pub nullifier: String,
    /// Global 1-based envelope sequence.
    pub global_height: u64,
    /// 1-based sequence within the process.
    pub process_height: u64,
    /// Global height of the carrying transaction.
    pub tx_height: u64,
    /// Encryption key indexes used by the vote.
    pub key_indexes: Vec<u32>,
}

impl DbSerde for EnvelopeRecord {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_string(&mut *w, &self.process_id)?;
        write_string(&mut *w, &self.package)?;
        write_string(&mut *w, &self.nullifier)?;
        write_u64_le(&mut *w, self.global_height)?;
        write_u64_le(&mut *w, self.process_height)?;
        write_u64_le(&mut *w, self.tx_height)?;
        write_vec(&mut *w, &self.key_indexes, |w, index| write_u32_le(w, *index))
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(EnvelopeRecord {
            process_id: read_string(&mut *r)?,
            package: read_string(&mut *r)?,
            nullifier: read_string(&mut *r)?,
            global_height: read_u64_le(&mut *r)?,
            process_height: read_u64_le(&mut *r)?,
            tx_height: read_u64_le(&mut *r)?,
            key_indexes: read_vec(&mut *r, |r| read_u32_le(r))?,
        })
    }
}

/// An entity, stored as its raw id under its sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    /// Raw entity id.
    pub id: Vec<u8>,
    /// 1-based sequence in discovery order.
    pub seq: u64,
}

/// A voting process, indexed by global sequence, by id and by (entity, local sequence).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Hex process id.
    pub id: String,
    /// Hex id of the owning entity.
    pub entity_id: String,
    /// 1-based sequence within the entity.
    pub local_seq: u64,
    /// 1-based sequence across all entities.
    pub global_seq: u64,
}

impl DbSerde for ProcessRecord {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_string(&mut *w, &self.id)?;
        write_string(&mut *w, &self.entity_id)?;
        write_u64_le(&mut *w, self.local_seq)?;
        write_u64_le(&mut *w, self.global_seq)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(ProcessRecord {
            id: read_string(&mut *r)?,
            entity_id: read_string(&mut *r)?,
            local_seq: read_u64_le(&mut *r)?,
            global_seq: read_u64_le(&mut *r)?,
        })
    }
}

/// Durable key to counter mapping.
///
/// Keys are hex strings (validator addresses, process ids, entity ids).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeightMap(BTreeMap<String, u64>);

impl HeightMap {
    /// Returns an empty map.
    pub fn new() -> Self {
        HeightMap(BTreeMap::new())
    }

    /// Returns the counter for `key`, zero when absent.
    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Returns true if `key` has an entry, even a zero one.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets the counter for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: u64) {
        self.0.insert(key.into(), value);
    }

    /// Increments the counter for `key` and returns the new value.
    pub fn increment(&mut self, key: &str) -> u64 {
        let counter = self.0.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the map holds no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, u64)> for HeightMap {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        HeightMap(iter.into_iter().collect())
    }
}

impl DbSerde for HeightMap {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        CompactSize::write(&mut *w, self.0.len() as u64)?;
        for (key, value) in &self.0 {
            write_string(&mut *w, key)?;
            CompactSize::write(&mut *w, *value)?;
        }
        Ok(())
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let entries = read_vec(&mut *r, |r| {
            let key = read_string(&mut *r)?;
            let value = CompactSize::read_u64(&mut *r)?;
            Ok((key, value))
        })?;
        Ok(entries.into_iter().collect())
    }
}

/// Snapshot of the chain status, refreshed by every block tick that commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockchainInfo {
    /// Network name reported by the node.
    pub network: String,
    /// Node software version.
    pub version: String,
    /// Chain id from the genesis document.
    pub chain_id: String,
    /// Latest height reported by the node.
    pub latest_block_height: u64,
    /// Hash of the latest block.
    pub latest_block_hash: Vec<u8>,
    /// Latest block time as unix seconds.
    pub latest_block_time: i64,
    /// Genesis time as unix seconds.
    pub genesis_time: i64,
    /// True while the node reports it is catching up.
    pub syncing: bool,
}

impl DbSerde for BlockchainInfo {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_string(&mut *w, &self.network)?;
        write_string(&mut *w, &self.version)?;
        write_string(&mut *w, &self.chain_id)?;
        write_u64_le(&mut *w, self.latest_block_height)?;
        write_bytes(&mut *w, &self.latest_block_hash)?;
        write_i64_le(&mut *w, self.latest_block_time)?;
        write_i64_le(&mut *w, self.genesis_time)?;
        w.write_all(&[self.syncing as u8])
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        let network = read_string(&mut *r)?;
        let version = read_string(&mut *r)?;
        let chain_id = read_string(&mut *r)?;
        let latest_block_height = read_u64_le(&mut *r)?;
        let latest_block_hash = read_bytes(&mut *r)?;
        let latest_block_time = read_i64_le(&mut *r)?;
        let genesis_time = read_i64_le(&mut *r)?;
        let mut flag = [0u8; 1];
        r.read_exact(&mut flag)?;
        Ok(BlockchainInfo {
            network,
            version,
            chain_id,
            latest_block_height,
            latest_block_hash,
            latest_block_time,
            genesis_time,
            syncing: flag[0] != 0,
        })
    }
}

/// The block holding the most transactions seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTxPeak {
    /// Transaction count.
    pub count: u64,
    /// Hash of the block.
    pub hash: Vec<u8>,
    /// Height of the block.
    pub height: u64,
}

impl DbSerde for BlockTxPeak {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        CompactSize::write(&mut *w, self.count)?;
        write_bytes(&mut *w, &self.hash)?;
        write_u64_le(&mut *w, self.height)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(BlockTxPeak {
            count: CompactSize::read_u64(&mut *r)?,
            hash: read_bytes(&mut *r)?,
            height: read_u64_le(&mut *r)?,
        })
    }
}

/// The wall-clock minute holding the most transactions seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinuteTxPeak {
    /// Transaction count.
    pub count: u64,
    /// Start of the minute as unix seconds.
    pub minute: i64,
}

impl DbSerde for MinuteTxPeak {
    fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        CompactSize::write(&mut *w, self.count)?;
        write_i64_le(&mut *w, self.minute)
    }

    fn decode<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(MinuteTxPeak {
            count: CompactSize::read_u64(&mut *r)?,
            minute: read_i64_le(&mut *r)?,
        })
    }
}

/// Transaction throughput peaks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxStats {
    /// Busiest block.
    pub per_block: BlockTxPeak,
    /// Busiest minute.
    pub per_minute: MinuteTxPeak,
}

impl TxStats {
    /// Records a block, replacing the per-block peak if it holds more transactions.
    ///
    /// Returns true if the peak changed.
    pub fn observe_block(&mut self, height: u64, hash: &[u8], num_txs: u64) -> bool {
        if num_txs > self.per_block.count {
            self.per_block = BlockTxPeak {
                count: num_txs,
                hash: hash.to_vec(),
                height,
            };
            return true;
        }
        false
    }

    /// Records a minute total, replacing the per-minute peak if it is larger.
    ///
    /// Returns true if the peak changed.
    pub fn observe_minute(&mut self, minute: i64, count: u64) -> bool {
        if count > self.per_minute.count {
            self.per_minute = MinuteTxPeak { count, minute };
            return true;
        }
        false
    }
}

/// Truncates unix seconds to the start of their minute.
pub fn minute_of(unix_seconds: i64) -> i64 {
    unix_seconds.div_euclid(60) * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_record_round_trips() {
        let block = BlockRecord {
            height: 101,
            hash: vec![0xaa; 32],
            proposer: vec![0x01; 20],
            num_txs: 3,
            time: 1_600_000_000,
        };
        let bytes = block.to_bytes().unwrap();
        assert_eq!(BlockRecord::from_bytes(&bytes).unwrap(), block);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = ProcessRecord::default().to_bytes().unwrap();
        bytes.push(0);
        assert!(ProcessRecord::from_bytes(&bytes).is_err());
    }

    #[test]
    fn height_map_counts_and_persists() {
        let mut map = HeightMap::new();
        assert_eq!(map.increment("ab"), 1);
        assert_eq!(map.increment("ab"), 2);
        map.insert("cd", 300);
        assert_eq!(map.get("missing"), 0);

        let decoded = HeightMap::from_bytes(&map.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(decoded.get("cd"), 300);
    }

    #[test]
    fn tx_stats_keep_the_peak() {
        let mut stats = TxStats::default();
        assert!(stats.observe_block(5, &[1], 4));
        assert!(!stats.observe_block(6, &[2], 4));
        assert_eq!(stats.per_block.height, 5);

        assert!(stats.observe_minute(minute_of(125), 9));
        assert_eq!(stats.per_minute.minute, 120);
        assert!(!stats.observe_minute(180, 2));
    }
}
