//! Entity tick: appends the entities the gateway lists after the last one stored.

use tracing::{debug, info, warn};

use super::{retry::retry_with_cap, Routine, SyncEngine};
use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    store::{
        keys::{self, id_key, normalize_hex, seq_key},
        WriteBatch,
    },
};

impl<N: NodeSource, G: GatewaySource> SyncEngine<N, G> {
    /// Runs one entity tick and returns the number of entities added.
    pub async fn sync_entities(&self) -> Result<u64, SyncError> {
        let token = self.token(Routine::Entities).clone();
        let cap = self.config.retry_cap;

        let local = self.db.get_counter(keys::LATEST_ENTITY_COUNT, 0).await?;
        let remote = retry_with_cap("entity count", cap, &token, || {
            self.gateway.entity_count()
        })
        .await?;
        if local >= remote {
            return Ok(0);
        }

        let from_id = if local == 0 {
            String::new()
        } else {
            match self.db.get(&seq_key(keys::ENTITY_BY_SEQ, local)).await? {
                Some(raw) => hex::encode(raw),
                None => {
                    warn!("entity {local} missing, listing from the start");
                    String::new()
                }
            }
        };
        debug!("getting entities from id {from_id:?}");
        let list_size = self.config.list_page_size;
        let ids = retry_with_cap("entity list", cap, &token, || {
            self.gateway.entity_list(&from_id, list_size)
        })
        .await?;
        if ids.is_empty() {
            warn!("No new entities retrieved");
            return Ok(0);
        }

        let mut process_counts = self.db.get_height_map(keys::ENTITY_PROCESS_MAP).await?;
        let batch = WriteBatch::new();
        let mut seq = local;
        for id in ids {
            let id = normalize_hex(&id);
            let raw = match hex::decode(&id) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("skipping entity with invalid id {id}: {e}");
                    continue;
                }
            };
            if process_counts.contains(&id) {
                warn!("Retrieved entity {id} already stored");
                continue;
            }
            seq += 1;
            batch.put(seq_key(keys::ENTITY_BY_SEQ, seq), raw.clone());
            batch.put_seq(id_key(keys::ENTITY_BY_ID, &raw), seq);
            process_counts.insert(id, 0);
        }
        if seq == local {
            return Ok(0);
        }

        batch.put_record(keys::ENTITY_PROCESS_MAP.to_vec(), &process_counts);
        batch.put_counter(keys::LATEST_ENTITY_COUNT, seq);
        batch.commit(&self.db).await?;
        info!("Retrieved {} new entities, {seq} stored", seq - local);
        Ok(seq - local)
    }
}
