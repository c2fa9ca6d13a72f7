// src/core/storage/store.rs

//! The bounded in-memory key-value table and its concurrent access
//! discipline.
//!
//! A single mutex guards the table together with the write-ahead log handle.
//! Holding one lock across both the mutation and its log append keeps the log
//! a serialization of the in-memory effects: two concurrent puts cannot land
//! in the table in one order and in the log in another.

use crate::core::BasaltError;
use crate::core::persistence::log::unix_now;
use crate::core::persistence::{LogRecord, Wal, recovery, snapshot};
use crate::core::protocol::{KEY_LEN, VALUE_LEN, clamp};
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use std::path::Path;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The in-memory store. Entries keep their insertion order, which is the
/// order `list_keys` and snapshots emit them in.
#[derive(Debug)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    entries: IndexMap<Bytes, Bytes>,
    capacity: usize,
    snapshot_threshold: u64,
    wal: Option<Wal>,
}

impl Store {
    pub fn new(capacity: usize, snapshot_threshold: u64) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: IndexMap::with_capacity(capacity),
                capacity,
                snapshot_threshold,
                wal: None,
            }),
        }
    }

    /// Turns on durability: ensures `data_dir` exists, rebuilds the table
    /// from the newest snapshot plus newer logs, then opens the initial log
    /// for append.
    pub async fn enable_persistence(&self, data_dir: impl AsRef<Path>) -> Result<(), BasaltError> {
        let data_dir = data_dir.as_ref();
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        fs::create_dir_all(data_dir).await?;
        recovery::recover_into(&mut inner.entries, inner.capacity, data_dir).await?;
        inner.wal = Some(Wal::open_initial(data_dir).await?);
        info!(
            "persistence enabled, {} entries recovered from {}",
            inner.entries.len(),
            data_dir.display()
        );
        Ok(())
    }

    /// Inserts or overwrites a key. Fails with [`BasaltError::StoreFull`]
    /// when the key is new and the table is at capacity. With persistence
    /// enabled, the record is appended and flushed before the call returns;
    /// if the append fails, the in-memory change is rolled back and the
    /// operation fails.
    pub async fn put(
        &self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<(), BasaltError> {
        let key = clamp(key.into(), KEY_LEN);
        let value = clamp(value.into(), VALUE_LEN);
        let mut inner = self.inner.lock().await;
        let previous = match inner.entries.get(&key[..]) {
            Some(v) => Some(v.clone()),
            None if inner.entries.len() >= inner.capacity => {
                return Err(BasaltError::StoreFull);
            }
            None => None,
        };
        inner.entries.insert(key.clone(), value.clone());
        if let Err(e) = inner.log_mutation(LogRecord::put(key.clone(), value)).await {
            // The log and the table must agree; undo the in-memory change.
            match previous {
                Some(old) => {
                    inner.entries.insert(key, old);
                }
                None => {
                    inner.entries.shift_remove(&key[..]);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Looks a key up by exact byte equality.
    pub async fn get(&self, key: &[u8]) -> Option<Bytes> {
        let key = &key[..key.len().min(KEY_LEN - 1)];
        self.inner.lock().await.entries.get(key).cloned()
    }

    /// Removes a key. Returns `false` when the key is absent. A logged
    /// delete follows the same rollback rule as `put`.
    pub async fn delete(&self, key: &[u8]) -> Result<bool, BasaltError> {
        let key = &key[..key.len().min(KEY_LEN - 1)];
        let mut inner = self.inner.lock().await;
        let Some((index, key, previous)) = inner.entries.shift_remove_full(key) else {
            return Ok(false);
        };
        if let Err(e) = inner.log_mutation(LogRecord::delete(key.clone())).await {
            // Restore the entry in its original slot; a plain insert would
            // re-append it at the end and reorder the table.
            inner.entries.shift_insert(index, key, previous);
            return Err(e);
        }
        Ok(true)
    }

    /// Concatenates all keys in table order, each followed by a newline,
    /// stopping before a key that would not fit in `max` bytes. Keys already
    /// written stay in the output.
    pub async fn list_keys(&self, max: usize) -> Bytes {
        let inner = self.inner.lock().await;
        let mut out = BytesMut::new();
        for key in inner.entries.keys() {
            if out.len() + key.len() + 1 > max {
                break;
            }
            out.put_slice(key);
            out.put_u8(b'\n');
        }
        out.freeze()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub async fn persistence_enabled(&self) -> bool {
        self.inner.lock().await.wal.is_some()
    }

    /// Writes a final snapshot and leaves a fresh rotated log behind, so the
    /// on-disk layout after shutdown matches an ordinary rotation.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        let Some(wal) = inner.wal.take() else { return };
        let data_dir = wal.data_dir().to_path_buf();
        let ts = unix_now();
        if let Err(e) = snapshot::write(&data_dir, ts, &inner.entries).await {
            error!("final snapshot failed: {}", e);
            return;
        }
        if let Err(e) = Wal::open_rotated(&data_dir, ts).await {
            warn!("could not open post-shutdown log: {}", e);
        }
        info!(
            "final snapshot written to {}",
            data_dir.join(snapshot::snapshot_name(ts)).display()
        );
    }
}

impl StoreInner {
    /// Appends one record to the log, rotating when the snapshot threshold
    /// is reached. A no-op while persistence is off.
    async fn log_mutation(&mut self, record: LogRecord) -> Result<(), BasaltError> {
        let Some(wal) = self.wal.as_mut() else {
            return Ok(());
        };
        wal.append(&record)
            .await
            .map_err(|e| BasaltError::WalAppend(e.to_string()))?;
        if wal.op_count() >= self.snapshot_threshold {
            self.rotate().await;
        }
        Ok(())
    }

    /// Writes a snapshot and switches to a fresh timestamped log. Failure of
    /// either step disables persistence for the rest of the process; the
    /// in-memory store keeps serving.
    async fn rotate(&mut self) {
        let Some(wal) = self.wal.as_ref() else { return };
        let data_dir = wal.data_dir().to_path_buf();
        let ts = unix_now();
        if let Err(e) = snapshot::write(&data_dir, ts, &self.entries).await {
            error!("snapshot write failed, disabling persistence: {}", e);
            self.wal = None;
            return;
        }
        match Wal::open_rotated(&data_dir, ts).await {
            Ok(fresh) => self.wal = Some(fresh),
            Err(e) => {
                error!("could not open rotated log, disabling persistence: {}", e);
                self.wal = None;
            }
        }
    }
}
