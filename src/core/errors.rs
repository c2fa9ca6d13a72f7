// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations.
#[derive(Error, Debug)]
pub enum BasaltError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete frame in stream")]
    IncompleteFrame,

    #[error("Store is full")]
    StoreFull,

    #[error("Write-ahead log append failed: {0}")]
    WalAppend(String),

    #[error("Membership table is full")]
    MembershipFull,

    #[error("Invalid peer address: {0}")]
    InvalidPeerAddress(String),

    #[error("Replication Error: {0}")]
    ReplicationError(String),
}

// `std::io::Error` is not cloneable; the Arc keeps this enum cheap to pass
// around between the codec, the persistence layer, and connection handlers.
impl From<std::io::Error> for BasaltError {
    fn from(e: std::io::Error) -> Self {
        BasaltError::Io(Arc::new(e))
    }
}
