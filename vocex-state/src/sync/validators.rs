//! Validator tick: pages through the validator set at the latest stored block.

use tracing::{debug, info};

use super::{retry::retry_with_cap, Routine, SyncEngine};
use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    store::{
        keys::{self, id_key, seq_key},
        WriteBatch,
    },
    types::ValidatorRecord,
};

impl<N: NodeSource, G: GatewaySource> SyncEngine<N, G> {
    /// Runs one validator tick and returns the number of validators added.
    ///
    /// Validators already recorded are recognised by their position in the returned set.
    pub async fn sync_validators(&self) -> Result<u64, SyncError> {
        let token = self.token(Routine::Validators).clone();
        let height = self.db.get_counter(keys::LATEST_BLOCK_HEIGHT, 0).await?;
        if height == 0 {
            return Ok(0);
        }
        let stored = self.db.get_counter(keys::LATEST_VALIDATOR_COUNT, 0).await?;
        let per_page = self.config.validator_page_size;

        let batch = WriteBatch::new();
        let mut count = stored;
        let mut position: u64 = 0;
        let mut page: u32 = 1;
        loop {
            let operation = format!("validators page {page}");
            let response = retry_with_cap(&operation, self.config.retry_cap, &token, || {
                self.node.validators(height, page, per_page)
            })
            .await?;
            let returned = response.validators.len();

            for validator in response.validators {
                position += 1;
                if position <= stored {
                    continue;
                }
                count += 1;
                let record = ValidatorRecord {
                    address: validator.address,
                    pub_key: validator.pub_key.value,
                    voting_power: validator.voting_power,
                    proposer_priority: validator.proposer_priority,
                    seq: count,
                };
                batch.put_record(id_key(keys::VALIDATOR_BY_ADDRESS, &record.address), &record);
                batch.put(seq_key(keys::VALIDATOR_BY_SEQ, count), record.address);
            }

            // A full page may be followed by more, unless the node says that was all.
            let exhausted = response.total > 0 && position >= response.total;
            if returned < per_page as usize || exhausted {
                break;
            }
            page += 1;
        }

        if count == stored {
            debug!("no new validators at height {height}");
            return Ok(0);
        }
        batch.put_counter(keys::LATEST_VALIDATOR_COUNT, count);
        batch.commit(&self.db).await?;
        info!("Retrieved {} validators at block height {height}", count - stored);
        Ok(count - stored)
    }
}
