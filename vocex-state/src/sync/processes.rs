//! Process tick: one concurrent page request per known entity.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{retry::retry_with_cap, Routine, SyncEngine};
use crate::{
    error::SyncError,
    source::{GatewaySource, NodeSource},
    store::{
        keys::{self, decode_hex_id, id_key, normalize_hex, scoped_seq_key, seq_key},
        WriteBatch,
    },
    types::{HeightMap, ProcessRecord},
};

/// State shared by the per-entity fetches of one tick.
struct ProcessTick {
    batch: WriteBatch,
    counters: Mutex<ProcessCounters>,
    /// Serialises gateway requests.
    request_lock: tokio::sync::Mutex<()>,
}

struct ProcessCounters {
    /// Global sequence of the last process stored before the tick.
    base: u64,
    /// New processes found so far in the tick.
    found: u64,
    /// Processes per entity.
    per_entity: HeightMap,
}

impl<N: NodeSource, G: GatewaySource> SyncEngine<N, G> {
    /// Runs one process tick and returns the number of processes added.
    ///
    /// Any failing entity abandons the whole tick.
    pub async fn sync_processes(&self) -> Result<u64, SyncError> {
        let token = self.token(Routine::Processes).clone();

        let local = self.db.get_counter(keys::LATEST_PROCESS_COUNT, 0).await?;
        let remote = retry_with_cap("process count", self.config.retry_cap, &token, || {
            self.gateway.process_count()
        })
        .await?;
        if local >= remote {
            return Ok(0);
        }

        let per_entity = self.db.get_height_map(keys::ENTITY_PROCESS_MAP).await?;
        debug!("Found {} stored entities", per_entity.len());
        let entities: Vec<(String, u64)> = per_entity
            .iter()
            .map(|(entity, count)| (entity.clone(), *count))
            .collect();
        let tick = Arc::new(ProcessTick {
            batch: WriteBatch::new(),
            counters: Mutex::new(ProcessCounters {
                base: local,
                found: 0,
                per_entity,
            }),
            request_lock: tokio::sync::Mutex::new(()),
        });

        let handles = entities.into_iter().map(|(entity, stored)| {
            let engine = self.clone();
            let tick = Arc::clone(&tick);
            tokio::spawn(async move { engine.fetch_processes(entity, stored, tick).await })
        });
        for result in join_all(handles).await {
            result??;
        }

        let (found, per_entity) = {
            let counters = tick.counters.lock().unwrap_or_else(PoisonError::into_inner);
            (counters.found, counters.per_entity.clone())
        };
        if found == 0 {
            debug!("no new processes");
            return Ok(0);
        }
        tick.batch
            .put_record(keys::ENTITY_PROCESS_MAP.to_vec(), &per_entity);
        tick.batch
            .put_counter(keys::LATEST_PROCESS_COUNT, local + found);
        tick.batch.commit(&self.db).await?;
        info!("Retrieved {found} new processes");
        Ok(found)
    }

    /// Fetches the processes `entity` gained after its `stored`th and queues their records.
    async fn fetch_processes(
        self,
        entity: String,
        stored: u64,
        tick: Arc<ProcessTick>,
    ) -> Result<(), SyncError> {
        let token = self.token(Routine::Processes).clone();
        let raw_entity = match decode_hex_id(&entity) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping entity with invalid id {entity}: {e}");
                return Ok(());
            }
        };

        let from_id = self.last_process_id(&raw_entity, stored).await?;
        debug!("Getting processes from id {from_id:?}, entity {entity}");

        let process_ids = {
            let _request = tick.request_lock.lock().await;
            let list_size = self.config.list_page_size;
            retry_with_cap("process list", self.config.retry_cap, &token, || {
                self.gateway.process_list(&entity, &from_id, list_size)
            })
            .await?
        };

        for process_id in process_ids {
            let id = normalize_hex(&process_id);
            let raw_id = match hex::decode(&id) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("skipping process with invalid id {process_id}: {e}");
                    continue;
                }
            };
            let (global_seq, local_seq) = {
                let mut counters = tick.counters.lock().unwrap_or_else(PoisonError::into_inner);
                counters.found += 1;
                let local_seq = counters.per_entity.increment(&entity);
                (counters.base + counters.found, local_seq)
            };

            let record = ProcessRecord {
                id,
                entity_id: entity.clone(),
                local_seq,
                global_seq,
            };
            tick.batch
                .put_record(seq_key(keys::PROCESS_BY_SEQ, global_seq), &record);
            tick.batch
                .put_seq(id_key(keys::PROCESS_BY_ID, &raw_id), global_seq);
            tick.batch.put_seq(
                scoped_seq_key(keys::PROCESS_BY_ENTITY, &raw_entity, local_seq),
                global_seq,
            );
        }
        Ok(())
    }

    /// Id of the `stored`th process of the entity, empty if it has none.
    async fn last_process_id(&self, raw_entity: &[u8], stored: u64) -> Result<String, SyncError> {
        if stored == 0 {
            return Ok(String::new());
        }
        let key = scoped_seq_key(keys::PROCESS_BY_ENTITY, raw_entity, stored);
        let Some(global_seq) = self.db.get_seq(&key).await? else {
            debug!("process {stored} of entity {} not found", hex::encode(raw_entity));
            return Ok(String::new());
        };
        Ok(self
            .db
            .process_by_seq(global_seq)
            .await?
            .map(|process| process.id)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::super::{
        mock::{test_engine, MockGateway, MockNode},
        Routine,
    };
    use crate::{error::SyncError, store::keys};

    fn two_entities() -> MockGateway {
        let gateway = MockGateway::new();
        gateway.add_entity("0xaa01");
        gateway.add_entity("0xaa02");
        gateway.add_process("aa01", "0x0101");
        gateway.add_process("aa01", "0x0102");
        gateway.add_process("aa02", "0x0201");
        gateway
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn indexes_processes_per_entity() {
        let gateway = two_entities();
        let (_dir, engine) = test_engine(&MockNode::new(), &gateway).await;
        engine.sync_entities().await.unwrap();

        assert_eq!(engine.sync_processes().await.unwrap(), 3);
        let db = engine.db();
        let second = db.process_by_entity("aa01", 2).await.unwrap().unwrap();
        assert_eq!(second.id, "0102");
        assert_eq!(second.entity_id, "aa01");
        assert_eq!(db.process_by_id("0x0102").await.unwrap(), Some(second));

        let mut globals = BTreeSet::new();
        for seq in 1..=3 {
            globals.insert(db.process_by_seq(seq).await.unwrap().unwrap().id);
        }
        assert_eq!(globals.len(), 3);

        gateway.add_process("aa01", "0x0103");
        assert_eq!(engine.sync_processes().await.unwrap(), 1);
        let newest = db.process_by_seq(4).await.unwrap().unwrap();
        assert_eq!((newest.id.as_str(), newest.local_seq), ("0103", 3));
        let counts = db.get_height_map(keys::ENTITY_PROCESS_MAP).await.unwrap();
        assert_eq!((counts.get("aa01"), counts.get("aa02")), (3, 1));
        assert_eq!(db.get_counter(keys::LATEST_PROCESS_COUNT, 0).await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_gateway_terminates_only_this_routine() {
        let gateway = two_entities();
        let (_dir, engine) = test_engine(&MockNode::new(), &gateway).await;
        engine.sync_entities().await.unwrap();
        let before = engine.db().entry_count().unwrap();

        gateway.set_failing(true);
        let result = engine.run_routine(Routine::Processes).await;
        assert!(matches!(result, Err(SyncError::RetryLimit { attempts: 3, .. })));
        assert_eq!(engine.db().entry_count().unwrap(), before);

        let tokens = engine.tokens();
        assert!(tokens.is_cancelled(Routine::Processes));
        for routine in [Routine::Blocks, Routine::Validators, Routine::Entities] {
            assert!(!tokens.is_cancelled(routine));
        }

        gateway.set_failing(false);
        assert_eq!(engine.run_routine(Routine::Processes).await.unwrap(), 0);
        assert_eq!(engine.db().entry_count().unwrap(), before);
        assert_eq!(
            engine.routine_status(Routine::Processes),
            crate::status::StatusType::CriticalError
        );
    }
}
