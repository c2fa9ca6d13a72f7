// src/core/state.rs

//! Shared server state handed to every connection handler.

use crate::config::Config;
use crate::core::cluster::{Membership, Replicator};
use crate::core::storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// Everything a request handler needs: the configuration, the store, the
/// membership table, and the replicator. Handlers borrow shared access for
/// the duration of one request.
pub struct ServerState {
    pub config: Config,
    pub store: Store,
    pub membership: Arc<Membership>,
    pub replicator: Replicator,
}

impl ServerState {
    pub fn new(config: Config) -> Arc<Self> {
        let membership = Arc::new(Membership::new());
        let replicator = Replicator::new(
            membership.clone(),
            Duration::from_millis(config.cluster.replica_timeout_ms),
        );
        let store = Store::new(config.store.capacity, config.persistence.snapshot_threshold);
        Arc::new(Self {
            config,
            store,
            membership,
            replicator,
        })
    }
}
