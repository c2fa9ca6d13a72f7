// src/core/persistence/mod.rs

//! Durability for the in-memory store: an append-only operation log plus
//! periodic binary snapshots, and the recovery path that replays them into a
//! fresh table at startup.

pub mod log;
pub mod recovery;
pub mod snapshot;

pub use log::{LogRecord, Wal};
