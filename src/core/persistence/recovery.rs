// src/core/persistence/recovery.rs

//! Rebuilds the in-memory table at startup from the newest snapshot plus any
//! operation logs rotated at or after it.

use super::log::{INITIAL_LOG, LOG_RECORD_LEN, LogRecord};
use super::snapshot;
use crate::core::BasaltError;
use crate::core::protocol::OperationTag;
use bytes::Bytes;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Loads the newest snapshot into `entries`, then replays newer logs in
/// ascending timestamp order. Replay applies the normal put/delete semantics
/// (overwrite, capacity check) but never re-logs.
pub async fn recover_into(
    entries: &mut IndexMap<Bytes, Bytes>,
    capacity: usize,
    data_dir: &Path,
) -> Result<(), BasaltError> {
    let mut ts_snap = 0u64;

    if let Some((ts, path)) = newest_snapshot(data_dir).await? {
        ts_snap = ts;
        match snapshot::read(&path).await {
            Ok(snap) => {
                for (key, value) in snap {
                    if entries.len() >= capacity && !entries.contains_key(&key[..]) {
                        warn!(
                            "store full while loading snapshot {}, dropping an entry",
                            path.display()
                        );
                        continue;
                    }
                    entries.insert(key, value);
                }
                info!(
                    "loaded {} entries from snapshot {}",
                    entries.len(),
                    path.display()
                );
            }
            Err(e) => warn!("unreadable snapshot {}: {}", path.display(), e),
        }
    }

    let mut logs: Vec<(u64, PathBuf)> = timestamped_files(data_dir, "operations_", ".log")
        .await?
        .into_iter()
        .filter(|(ts, _)| *ts >= ts_snap)
        .collect();
    // Replay must be oldest-first for deterministic recovery.
    logs.sort_by_key(|(ts, _)| *ts);

    // Records written before the first rotation live in the unsuffixed log.
    // They predate every snapshot, so they only matter when none exists.
    if ts_snap == 0 {
        let initial = data_dir.join(INITIAL_LOG);
        if fs::try_exists(&initial).await? {
            logs.insert(0, (0, initial));
        }
    }

    for (_, path) in logs {
        replay_log(entries, capacity, &path).await?;
    }
    Ok(())
}

async fn newest_snapshot(data_dir: &Path) -> Result<Option<(u64, PathBuf)>, BasaltError> {
    let snapshots = timestamped_files(data_dir, "snapshot_", ".dat").await?;
    Ok(snapshots.into_iter().max_by_key(|(ts, _)| *ts))
}

/// Enumerates `data_dir` for files named `<prefix><ts><suffix>`; names that
/// do not parse are ignored.
async fn timestamped_files(
    data_dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<Vec<(u64, PathBuf)>, BasaltError> {
    let mut found = Vec::new();
    let mut dir = fs::read_dir(data_dir).await?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(raw_ts) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if let Ok(ts) = raw_ts.parse::<u64>() {
            found.push((ts, entry.path()));
        }
    }
    Ok(found)
}

async fn replay_log(
    entries: &mut IndexMap<Bytes, Bytes>,
    capacity: usize,
    path: &Path,
) -> Result<(), BasaltError> {
    let mut buf = Bytes::from(fs::read(path).await?);
    let mut applied = 0usize;
    while buf.len() >= LOG_RECORD_LEN {
        let record = LogRecord::decode(buf.split_to(LOG_RECORD_LEN));
        match OperationTag::from_wire(record.tag) {
            Some(OperationTag::Put) => {
                if entries.len() >= capacity && !entries.contains_key(&record.key[..]) {
                    warn!(
                        "store full during replay of {}, dropping a put",
                        path.display()
                    );
                    continue;
                }
                entries.insert(record.key, record.value);
                applied += 1;
            }
            Some(OperationTag::Delete) => {
                entries.shift_remove(&record.key[..]);
                applied += 1;
            }
            // Only PUT and DELETE are ever logged; anything else is noise.
            _ => {}
        }
    }
    if !buf.is_empty() {
        warn!(
            "trailing partial record in {} ignored ({} bytes)",
            path.display(),
            buf.len()
        );
    }
    debug!("replayed {} records from {}", applied, path.display());
    Ok(())
}
