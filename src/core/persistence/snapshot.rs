// src/core/persistence/snapshot.rs

//! Point-in-time binary snapshots of the store.
//!
//! A snapshot file is a little-endian entry count followed by that many
//! fixed-size entries in table order. Each entry is a null-padded key field,
//! a null-padded value field, and a validity flag byte (always 1 for written
//! entries; entries with a zero flag are skipped on load).

use crate::core::protocol::{KEY_LEN, VALUE_LEN, put_padded, take_terminated};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use std::io::{self, Error, ErrorKind};
use std::path::Path;
use tokio::fs;

/// Size of one serialized snapshot entry.
pub const SNAPSHOT_ENTRY_LEN: usize = KEY_LEN + VALUE_LEN + 1;

/// The file name of the snapshot taken at `ts`.
pub fn snapshot_name(ts: u64) -> String {
    format!("snapshot_{ts}.dat")
}

/// Writes a snapshot of `entries` into `data_dir`, named after `ts`.
pub async fn write(data_dir: &Path, ts: u64, entries: &IndexMap<Bytes, Bytes>) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(4 + entries.len() * SNAPSHOT_ENTRY_LEN);
    buf.put_u32_le(entries.len() as u32);
    for (key, value) in entries {
        put_padded(&mut buf, key, KEY_LEN);
        put_padded(&mut buf, value, VALUE_LEN);
        buf.put_u8(1);
    }
    fs::write(data_dir.join(snapshot_name(ts)), &buf).await
}

/// Reads a snapshot file back into (key, value) pairs, in file order.
pub async fn read(path: &Path) -> io::Result<Vec<(Bytes, Bytes)>> {
    let mut buf = Bytes::from(fs::read(path).await?);
    if buf.len() < 4 {
        return Err(Error::new(ErrorKind::InvalidData, "snapshot header truncated"));
    }
    let count = buf.get_u32_le() as usize;
    let mut entries = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        if buf.len() < SNAPSHOT_ENTRY_LEN {
            return Err(Error::new(ErrorKind::InvalidData, "snapshot entry truncated"));
        }
        let key = take_terminated(&mut buf, KEY_LEN);
        let value = take_terminated(&mut buf, VALUE_LEN);
        let valid = buf.get_u8();
        if valid != 0 {
            entries.push((key, value));
        }
    }
    Ok(entries)
}
