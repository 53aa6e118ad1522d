//! Bounded listing and substring search over the explorer store.

use tracing::warn;

use super::{
    encoding::{encode_seq, DbSerde},
    keys, ExplorerDb,
};
use crate::{error::StoreError, types::BlockRecord};

/// Upper bound on the number of items any listing or search returns.
pub const MAX_LIST_ITEMS: usize = 64;

impl ExplorerDb {
    /// Returns up to `max` values stored under `prefix ‖ height`, walking down from `height`.
    ///
    /// Every probed height consumes one slot of the budget whether or not it exists, and
    /// the walk stops after height 0.
    pub async fn list_items_by_height(
        &self,
        max: usize,
        height: u64,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut items = Vec::new();
        let mut height = Some(height);
        for _ in 0..max.min(MAX_LIST_ITEMS) {
            let Some(current) = height else {
                break;
            };
            let mut key = prefix.to_vec();
            key.extend_from_slice(&encode_seq(current));
            if let Some(value) = self.get(&key).await? {
                items.push(value);
            }
            height = current.checked_sub(1);
        }
        Ok(items)
    }

    /// Returns up to `max` values under `prefix` whose hex-encoded key suffix contains `term`.
    pub async fn search_items(
        &self,
        max: usize,
        term: &str,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        self.search(max, term, prefix, false)
    }

    /// Returns up to `max` key suffixes under `prefix` whose hex encoding contains `term`.
    pub async fn search_keys(
        &self,
        max: usize,
        term: &str,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        self.search(max, term, prefix, true)
    }

    /// Returns up to `max` blocks proposed by `validator` (hex) whose hex hash contains `term`.
    ///
    /// An undecodable validator address is logged and yields no blocks.
    pub async fn search_blocks_by_validator(
        &self,
        max: usize,
        term: &str,
        validator: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        let proposer = match keys::decode_hex_id(validator) {
            Ok(proposer) => proposer,
            Err(e) => {
                warn!("invalid validator address {validator}: {e}");
                return Ok(Vec::new());
            }
        };
        let max = max.min(MAX_LIST_ITEMS);
        let prefix = keys::BLOCK_BY_HASH;

        let mut blocks = Vec::new();
        self.scan_prefix(prefix, |key, value| {
            if blocks.len() >= max {
                return false;
            }
            if hex::encode(&key[prefix.len()..]).contains(term) {
                match BlockRecord::from_bytes(value) {
                    Ok(block) if block.proposer == proposer => blocks.push(block),
                    Ok(_) => {}
                    Err(e) => warn!("could not decode block {}: {e}", hex::encode(key)),
                }
            }
            true
        })?;
        Ok(blocks)
    }

    fn search(
        &self,
        max: usize,
        term: &str,
        prefix: &[u8],
        return_keys: bool,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let max = max.min(MAX_LIST_ITEMS);
        let mut items = Vec::new();
        self.scan_prefix(prefix, |key, value| {
            if items.len() >= max {
                return false;
            }
            let suffix = &key[prefix.len()..];
            if hex::encode(suffix).contains(term) {
                let item = if return_keys { suffix } else { value };
                items.push(item.to_vec());
            }
            true
        })?;
        Ok(items)
    }
}
