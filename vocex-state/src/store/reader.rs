//! Typed lookups for consumers of the explorer store.
//!
//! Secondary indexes hold the primary key (a hash, an address or a global sequence) of
//! the record they point at; these readers follow that hop.

use tracing::warn;

use super::{
    keys::{self, decode_hex_id, id_key, scoped_seq_key, seq_key},
    ExplorerDb,
};
use crate::{
    error::StoreError,
    types::{
        BlockRecord, BlockTxPeak, BlockchainInfo, EntityRecord, EnvelopeRecord, MinuteTxPeak,
        ProcessRecord, TxRecord, TxStats, ValidatorRecord,
    },
};

impl ExplorerDb {
    /// Block by hash.
    pub async fn block_by_hash(&self, hash: &[u8]) -> Result<Option<BlockRecord>, StoreError> {
        self.get_record(&id_key(keys::BLOCK_BY_HASH, hash)).await
    }

    /// Block by height.
    pub async fn block_by_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
        match self.get(&seq_key(keys::BLOCK_HASH_BY_HEIGHT, height)).await? {
            Some(hash) => self.block_by_hash(&hash).await,
            None => Ok(None),
        }
    }

    /// The `seq`th block proposed by `proposer`.
    pub async fn block_by_validator(
        &self,
        proposer: &[u8],
        seq: u64,
    ) -> Result<Option<BlockRecord>, StoreError> {
        let key = scoped_seq_key(keys::BLOCK_HASH_BY_VALIDATOR, proposer, seq);
        match self.get(&key).await? {
            Some(hash) => self.block_by_hash(&hash).await,
            None => Ok(None),
        }
    }

    /// Transaction by hash.
    pub async fn tx_by_hash(&self, hash: &[u8]) -> Result<Option<TxRecord>, StoreError> {
        self.get_record(&id_key(keys::TX_BY_HASH, hash)).await
    }

    /// Transaction by global transaction height. A height whose bytes repeat an earlier
    /// transaction resolves to that earlier record.
    pub async fn tx_by_height(&self, tx_height: u64) -> Result<Option<TxRecord>, StoreError> {
        match self.get(&seq_key(keys::TX_HASH_BY_HEIGHT, tx_height)).await? {
            Some(hash) => self.tx_by_hash(&hash).await,
            None => Ok(None),
        }
    }

    /// Envelope by global envelope height.
    pub async fn envelope_by_height(
        &self,
        height: u64,
    ) -> Result<Option<EnvelopeRecord>, StoreError> {
        self.get_record(&seq_key(keys::ENVELOPE_BY_HEIGHT, height))
            .await
    }

    /// Envelope by hex nullifier.
    pub async fn envelope_by_nullifier(
        &self,
        nullifier: &str,
    ) -> Result<Option<EnvelopeRecord>, StoreError> {
        let Some(raw) = decode_id(nullifier) else {
            return Ok(None);
        };
        let key = id_key(keys::ENVELOPE_BY_NULLIFIER, &raw);
        match self.get_seq(&key).await? {
            Some(height) => self.envelope_by_height(height).await,
            None => Ok(None),
        }
    }

    /// The `seq`th envelope cast in `process_id` (hex).
    pub async fn envelope_by_process(
        &self,
        process_id: &str,
        seq: u64,
    ) -> Result<Option<EnvelopeRecord>, StoreError> {
        let Some(raw) = decode_id(process_id) else {
            return Ok(None);
        };
        let key = scoped_seq_key(keys::ENVELOPE_BY_PROCESS, &raw, seq);
        match self.get_seq(&key).await? {
            Some(height) => self.envelope_by_height(height).await,
            None => Ok(None),
        }
    }

    /// Validator by address.
    pub async fn validator_by_address(
        &self,
        address: &[u8],
    ) -> Result<Option<ValidatorRecord>, StoreError> {
        self.get_record(&id_key(keys::VALIDATOR_BY_ADDRESS, address))
            .await
    }

    /// Validator by sequence.
    pub async fn validator_by_seq(
        &self,
        seq: u64,
    ) -> Result<Option<ValidatorRecord>, StoreError> {
        match self.get(&seq_key(keys::VALIDATOR_BY_SEQ, seq)).await? {
            Some(address) => self.validator_by_address(&address).await,
            None => Ok(None),
        }
    }

    /// Entity by sequence.
    pub async fn entity_by_seq(&self, seq: u64) -> Result<Option<EntityRecord>, StoreError> {
        Ok(self
            .get(&seq_key(keys::ENTITY_BY_SEQ, seq))
            .await?
            .map(|id| EntityRecord { id, seq }))
    }

    /// Sequence of the entity with raw id `id`.
    pub async fn entity_seq(&self, id: &[u8]) -> Result<Option<u64>, StoreError> {
        self.get_seq(&id_key(keys::ENTITY_BY_ID, id)).await
    }

    /// Process by global sequence.
    pub async fn process_by_seq(&self, seq: u64) -> Result<Option<ProcessRecord>, StoreError> {
        self.get_record(&seq_key(keys::PROCESS_BY_SEQ, seq)).await
    }

    /// Process by hex id.
    pub async fn process_by_id(
        &self,
        process_id: &str,
    ) -> Result<Option<ProcessRecord>, StoreError> {
        let Some(raw) = decode_id(process_id) else {
            return Ok(None);
        };
        let key = id_key(keys::PROCESS_BY_ID, &raw);
        match self.get_seq(&key).await? {
            Some(seq) => self.process_by_seq(seq).await,
            None => Ok(None),
        }
    }

    /// The `local_seq`th process of `entity_id` (hex).
    pub async fn process_by_entity(
        &self,
        entity_id: &str,
        local_seq: u64,
    ) -> Result<Option<ProcessRecord>, StoreError> {
        let Some(raw) = decode_id(entity_id) else {
            return Ok(None);
        };
        let key = scoped_seq_key(keys::PROCESS_BY_ENTITY, &raw, local_seq);
        match self.get_seq(&key).await? {
            Some(seq) => self.process_by_seq(seq).await,
            None => Ok(None),
        }
    }

    /// Latest chain status snapshot.
    pub async fn blockchain_info(&self) -> Result<Option<BlockchainInfo>, StoreError> {
        self.get_record(keys::BLOCKCHAIN_INFO).await
    }

    /// Transaction throughput peaks, zero until the first block with transactions.
    pub async fn tx_stats(&self) -> Result<TxStats, StoreError> {
        Ok(TxStats {
            per_block: self
                .get_record::<BlockTxPeak>(keys::MAX_TXS_PER_BLOCK)
                .await?
                .unwrap_or_default(),
            per_minute: self
                .get_record::<MinuteTxPeak>(keys::MAX_TXS_PER_MINUTE)
                .await?
                .unwrap_or_default(),
        })
    }
}

fn decode_id(id: &str) -> Option<Vec<u8>> {
    match decode_hex_id(id) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!("invalid hex id {id}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{tests::open_temp_db, WriteBatch};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn secondary_indexes_resolve_to_the_primary_record() {
        let (_dir, db) = open_temp_db().await;
        let process = ProcessRecord {
            id: "aa01".to_string(),
            entity_id: "ee".to_string(),
            local_seq: 2,
            global_seq: 9,
        };
        let batch = WriteBatch::new();
        batch.put_record(seq_key(keys::PROCESS_BY_SEQ, 9), &process);
        batch.put_seq(id_key(keys::PROCESS_BY_ID, &[0xaa, 0x01]), 9);
        batch.put_seq(scoped_seq_key(keys::PROCESS_BY_ENTITY, &[0xee], 2), 9);
        batch.put(seq_key(keys::ENTITY_BY_SEQ, 1), vec![0xee]);
        batch.commit(&db).await.unwrap();

        assert_eq!(db.process_by_seq(9).await.unwrap(), Some(process.clone()));
        assert_eq!(db.process_by_id("0xAA01").await.unwrap(), Some(process.clone()));
        assert_eq!(db.process_by_entity("ee", 2).await.unwrap(), Some(process));
        assert_eq!(db.process_by_id("not hex").await.unwrap(), None);
        assert_eq!(db.process_by_entity("ee", 3).await.unwrap(), None);
        assert_eq!(
            db.entity_by_seq(1).await.unwrap(),
            Some(EntityRecord {
                id: vec![0xee],
                seq: 1
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tx_stats_default_to_zero() {
        let (_dir, db) = open_temp_db().await;
        assert_eq!(db.tx_stats().await.unwrap(), TxStats::default());
        assert_eq!(db.blockchain_info().await.unwrap(), None);
    }
}
