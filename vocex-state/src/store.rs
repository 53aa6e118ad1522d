//! The explorer store: one LMDB environment holding every index, cursor and height map.
//!
//! Writes are only ever made through a [`WriteBatch`], committed as a single LMDB write
//! transaction, so a tick's records become visible together with the cursors that cover them.

pub mod encoding;
pub mod keys;
pub mod reader;
pub mod search;

use std::{
    fs,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use lmdb::{
    Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags,
};
use tracing::{debug, info, warn};
use vocex_common::DatabaseConfig;

use crate::{
    error::StoreError,
    status::{AtomicStatus, StatusType},
    types::HeightMap,
};
use encoding::{CompactSize, DbSerde};

const DB_NAME: &str = "explorer";

/// Handle to the explorer store. Cheap to clone; clones share the environment.
#[derive(Debug, Clone)]
pub struct ExplorerDb {
    env: Arc<Environment>,
    db: Database,
    status: AtomicStatus,
}

impl ExplorerDb {
    /// Opens (creating if needed) the store described by `config` and initialises missing
    /// cursors to zero.
    pub async fn spawn(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Launching explorer store");

        let db_path = config.env_path();
        if !db_path.exists() {
            fs::create_dir_all(&db_path)?;
        }

        // LMDB max_readers from CPU count (cpu * 32), clamped between 512 and 4096.
        let cpu_cnt = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let max_readers = (cpu_cnt * 32).clamp(512, 4096) as u32;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(config.size.to_byte_count())
            .set_max_readers(max_readers)
            .set_flags(EnvironmentFlags::NO_TLS | EnvironmentFlags::NO_READAHEAD)
            .open(&db_path)?;
        let db = Self::open_or_create_db(&env, DB_NAME)?;

        let explorer_db = ExplorerDb {
            env: Arc::new(env),
            db,
            status: AtomicStatus::new(StatusType::Spawning),
        };
        explorer_db.init_cursors().await?;
        explorer_db.status.store(StatusType::Ready);
        info!("Explorer store ready at {}", db_path.display());

        Ok(explorer_db)
    }

    fn open_or_create_db(env: &Environment, name: &str) -> Result<Database, StoreError> {
        match env.open_db(Some(name)) {
            Ok(db) => Ok(db),
            Err(lmdb::Error::NotFound) => env
                .create_db(Some(name), DatabaseFlags::empty())
                .map_err(StoreError::LmdbError),
            Err(e) => Err(StoreError::LmdbError(e)),
        }
    }

    /// Writes a zero value for every cursor key that does not exist yet.
    pub async fn init_cursors(&self) -> Result<(), StoreError> {
        let batch = WriteBatch::new();
        for key in keys::CURSOR_KEYS {
            if self.get(key).await?.is_none() {
                debug!("initialising cursor {}", String::from_utf8_lossy(key));
                batch.put_counter(key, 0);
            }
        }
        batch.commit(self).await?;
        Ok(())
    }

    /// Returns the current store status.
    pub fn status(&self) -> StatusType {
        self.status.load()
    }

    /// Flushes the environment to disk and marks the store offline.
    pub async fn close(&self) {
        self.status.store(StatusType::Closing);
        // Give in-flight commits a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Err(e) = self.env.sync(true) {
            warn!("LMDB fsync before close failed: {e}");
        }
        self.status.store(StatusType::Offline);
    }

    /// Returns the raw value stored under `key`.
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        tokio::task::block_in_place(|| {
            let ro = self.env.begin_ro_txn()?;
            match ro.get(self.db, &key) {
                Ok(bytes) => Ok(Some(bytes.to_vec())),
                Err(lmdb::Error::NotFound) => Ok(None),
                Err(e) => Err(StoreError::LmdbError(e)),
            }
        })
    }

    /// Returns the record stored under `key`.
    ///
    /// A value that fails to decode is logged and reported as absent.
    pub async fn get_record<T: DbSerde>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.get(key).await? else {
            return Ok(None);
        };
        match T::from_bytes(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("could not decode record at {}: {e}", hex::encode(key));
                Ok(None)
            }
        }
    }

    /// Returns the counter stored under `key`, or `default` if it is missing or smaller.
    ///
    /// A counter that fails to decode is logged and read as zero.
    pub async fn get_counter(&self, key: &[u8], default: u64) -> Result<u64, StoreError> {
        let stored = match self.get(key).await? {
            Some(bytes) => match CompactSize::read_u64(&bytes[..]) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        "could not decode counter {}: {e}",
                        String::from_utf8_lossy(key)
                    );
                    0
                }
            },
            None => 0,
        };
        Ok(stored.max(default))
    }

    /// Returns the height map stored under `key`, empty if missing or undecodable.
    pub async fn get_height_map(&self, key: &[u8]) -> Result<HeightMap, StoreError> {
        Ok(self.get_record::<HeightMap>(key).await?.unwrap_or_default())
    }

    /// Returns the sequence value (8-byte big-endian) stored under `key`.
    pub async fn get_seq(&self, key: &[u8]) -> Result<Option<u64>, StoreError> {
        let Some(bytes) = self.get(key).await? else {
            return Ok(None);
        };
        match encoding::decode_seq(&bytes) {
            Ok(seq) => Ok(Some(seq)),
            Err(e) => {
                warn!("could not decode sequence at {}: {e}", hex::encode(key));
                Ok(None)
            }
        }
    }

    /// Visits entries whose key starts with `prefix`, in key order, until `visit` returns
    /// false.
    pub(crate) fn scan_prefix<F>(&self, prefix: &[u8], mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        tokio::task::block_in_place(|| {
            let ro = self.env.begin_ro_txn()?;
            let cursor = ro.open_ro_cursor(self.db)?;

            // LMDB rejects zero-length keys, so an empty prefix starts at the first entry.
            let mut entry = if prefix.is_empty() {
                cursor.get(None, None, lmdb_sys::MDB_FIRST)
            } else {
                cursor.get(Some(prefix), None, lmdb_sys::MDB_SET_RANGE)
            };
            loop {
                match entry {
                    Ok((Some(key), value)) => {
                        if !key.starts_with(prefix) || !visit(key, value) {
                            break;
                        }
                    }
                    Ok((None, _)) | Err(lmdb::Error::NotFound) => break,
                    Err(e) => return Err(StoreError::LmdbError(e)),
                }
                entry = cursor.get(None, None, lmdb_sys::MDB_NEXT);
            }
            Ok(())
        })
    }

    /// Returns the number of entries in the store.
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        let mut count = 0;
        self.scan_prefix(&[], |_, _| {
            count += 1;
            true
        })?;
        Ok(count)
    }

    fn write_entries(&self, entries: &[BatchEntry]) -> Result<usize, StoreError> {
        tokio::task::block_in_place(|| {
            let mut txn = self.env.begin_rw_txn()?;
            let mut written = 0;
            for entry in entries {
                let flags = if entry.keep_first {
                    WriteFlags::NO_OVERWRITE
                } else {
                    WriteFlags::empty()
                };
                match txn.put(self.db, &entry.key, &entry.value, flags) {
                    Ok(()) => written += 1,
                    Err(lmdb::Error::KeyExist) => {
                        debug!("keeping existing record at {}", hex::encode(&entry.key))
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            txn.commit()?;
            Ok(written)
        })
    }
}

/// One queued write.
#[derive(Debug)]
struct BatchEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Leaves an existing value under `key` untouched.
    keep_first: bool,
}

/// Writes accumulated during a tick and committed atomically.
///
/// Appends are serialised by an internal mutex so concurrent workers may share one batch.
#[derive(Debug, Default)]
pub struct WriteBatch {
    entries: Mutex<Vec<BatchEntry>>,
}

impl WriteBatch {
    /// Returns an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw write.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.push(key, value, false);
    }

    /// Queues a record write that is dropped at commit if `key` already holds a value,
    /// whether stored earlier or queued earlier in this batch.
    pub fn put_record_once<T: DbSerde>(&self, key: Vec<u8>, record: &T) {
        match record.to_bytes() {
            Ok(value) => self.push(key, value, true),
            Err(e) => warn!("skipping write to {}: {e}", hex::encode(&key)),
        }
    }

    fn push(&self, key: Vec<u8>, value: Vec<u8>, keep_first: bool) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BatchEntry {
                key,
                value,
                keep_first,
            });
    }

    /// Queues a record write. A record that fails to encode is logged and skipped.
    pub fn put_record<T: DbSerde>(&self, key: Vec<u8>, record: &T) {
        match record.to_bytes() {
            Ok(value) => self.put(key, value),
            Err(e) => warn!("skipping write to {}: {e}", hex::encode(&key)),
        }
    }

    /// Queues a counter write.
    pub fn put_counter(&self, key: &[u8], value: u64) {
        self.put(key.to_vec(), CompactSize::to_bytes(value));
    }

    /// Queues an 8-byte big-endian sequence value.
    pub fn put_seq(&self, key: Vec<u8>, seq: u64) {
        self.put(key, encoding::encode_seq(seq).to_vec());
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commits every queued write in one LMDB transaction and returns how many were
    /// written, excluding keep-first writes whose key was taken. The batch is left empty;
    /// an empty batch touches nothing.
    pub async fn commit(&self, db: &ExplorerDb) -> Result<usize, StoreError> {
        let entries = std::mem::take(
            &mut *self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if entries.is_empty() {
            return Ok(0);
        }
        let written = db.write_entries(&entries)?;
        debug!("committed {written} of {} writes", entries.len());
        Ok(written)
    }
}
