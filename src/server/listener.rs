// src/server/listener.rs

//! Binds the data port, registers this node in its own membership table, and
//! hands each accepted connection to a one-shot handler task.

use crate::config::Config;
use crate::connection::ConnectionHandler;
use crate::core::BasaltError;
use crate::core::cluster::PeerAddr;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl Listener {
    /// Binds the configured endpoint, registers the announce address as the
    /// first membership entry, and enables persistence when configured. A
    /// persistence failure is logged and the node continues in memory-only
    /// mode; a bind failure is fatal.
    pub async fn bind(mut config: Config) -> Result<Self, BasaltError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;
        config.port = local_addr.port();

        let announce_ip = config
            .cluster
            .announce_ip
            .clone()
            .unwrap_or_else(|| config.host.clone());
        let self_addr = PeerAddr::new(announce_ip, local_addr.port());

        let state = ServerState::new(config);
        state.membership.register_self(self_addr.clone())?;
        info!("registered self as {} in the membership table", self_addr);

        if state.config.persistence.enabled {
            let data_dir = state.config.persistence.data_dir.clone();
            if let Err(e) = state.store.enable_persistence(&data_dir).await {
                error!(
                    "failed to enable persistence in {}, continuing without it: {}",
                    data_dir, e
                );
            }
        }

        info!("listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Accepts connections until the shutdown signal fires, then drains the
    /// in-flight handlers and writes the final snapshot.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, no longer accepting connections");
                    break;
                }

                res = self.listener.accept() => match res {
                    Ok((socket, addr)) => {
                        debug!("accepted connection from {}", addr);
                        let state = self.state.clone();
                        handlers.spawn(async move {
                            let handler = ConnectionHandler::new(socket, addr, state);
                            if let Err(e) = handler.run().await {
                                debug!("connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => warn!("failed to accept connection: {}", e),
                },

                // Reap completed handler tasks.
                Some(res) = handlers.join_next() => {
                    if let Err(e) = res
                        && e.is_panic()
                    {
                        error!("a connection handler panicked: {e:?}");
                    }
                }
            }
        }

        if tokio::time::timeout(Duration::from_secs(10), async {
            while handlers.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!("timed out waiting for connection handlers, aborting the rest");
            handlers.shutdown().await;
        }

        self.state.store.shutdown().await;
        info!("server shutdown complete");
    }
}
