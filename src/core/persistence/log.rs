// src/core/persistence/log.rs

//! The append-only operation log.
//!
//! Every successful put or delete appends one fixed-size [`LogRecord`] and
//! flushes the writer, so the record has reached the operating system before
//! the mutation is acknowledged. The log is rotated to a timestamped file
//! whenever a snapshot is written.

use crate::core::protocol::{KEY_LEN, OperationTag, VALUE_LEN, put_padded, take_terminated};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Size of one serialized log record: tag, timestamp, key field, value field.
pub const LOG_RECORD_LEN: usize = 4 + 8 + KEY_LEN + VALUE_LEN;

/// Name of the log opened when persistence is first enabled. Rotated logs
/// carry the rotation timestamp in their name instead.
pub const INITIAL_LOG: &str = "operations.log";

/// The file name of the log opened by the rotation event at `ts`.
pub fn rotated_log_name(ts: u64) -> String {
    format!("operations_{ts}.log")
}

/// The current POSIX time in seconds. Used for log rotation and snapshot
/// file names, which only need second resolution.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One durable mutation record. Only PUT and DELETE records are produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub tag: u32,
    pub timestamp: u64,
    pub key: Bytes,
    pub value: Bytes,
}

impl LogRecord {
    pub fn put(key: Bytes, value: Bytes) -> Self {
        Self {
            tag: OperationTag::Put as u32,
            timestamp: unix_now(),
            key,
            value,
        }
    }

    pub fn delete(key: Bytes) -> Self {
        Self {
            tag: OperationTag::Delete as u32,
            timestamp: unix_now(),
            key,
            value: Bytes::new(),
        }
    }

    /// Serializes this record into exactly [`LOG_RECORD_LEN`] bytes.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(LOG_RECORD_LEN);
        dst.put_u32_le(self.tag);
        dst.put_u64_le(self.timestamp);
        put_padded(dst, &self.key, KEY_LEN);
        put_padded(dst, &self.value, VALUE_LEN);
    }

    /// Deserializes a record from a chunk of exactly [`LOG_RECORD_LEN`] bytes.
    pub fn decode(mut chunk: Bytes) -> Self {
        debug_assert_eq!(chunk.len(), LOG_RECORD_LEN);
        let tag = chunk.get_u32_le();
        let timestamp = chunk.get_u64_le();
        let key = take_terminated(&mut chunk, KEY_LEN);
        let value = take_terminated(&mut chunk, VALUE_LEN);
        Self {
            tag,
            timestamp,
            key,
            value,
        }
    }
}

/// An open write-ahead log file.
#[derive(Debug)]
pub struct Wal {
    writer: BufWriter<File>,
    data_dir: PathBuf,
    op_count: u64,
}

impl Wal {
    /// Opens the unsuffixed initial log for append.
    pub async fn open_initial(data_dir: &Path) -> io::Result<Self> {
        let path = data_dir.join(INITIAL_LOG);
        Self::open(data_dir, &path).await
    }

    /// Opens the rotated log produced by the snapshot event at `ts`.
    pub async fn open_rotated(data_dir: &Path, ts: u64) -> io::Result<Self> {
        let path = data_dir.join(rotated_log_name(ts));
        Self::open(data_dir, &path).await
    }

    async fn open(data_dir: &Path, path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
            data_dir: data_dir.to_path_buf(),
            op_count: 0,
        })
    }

    /// Appends one record and flushes it to the operating system.
    pub async fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(LOG_RECORD_LEN);
        record.encode(&mut buf);
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        self.op_count += 1;
        Ok(())
    }

    /// The number of records appended since this log file was opened.
    pub fn op_count(&self) -> u64 {
        self.op_count
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
