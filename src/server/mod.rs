// src/server/mod.rs

//! The listener: socket setup, the accept loop, and graceful shutdown.

use crate::config::Config;
use anyhow::Result;
use tokio::sync::broadcast;
use tracing::info;

mod listener;

pub use listener::Listener;

/// Waits for a shutdown signal: SIGINT or SIGTERM on Unix.
#[cfg(unix)]
async fn await_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT stream");
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to create SIGTERM stream");

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
    }
}

/// Waits for a shutdown signal: Ctrl+C on Windows.
#[cfg(windows)]
async fn await_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to create Ctrl+C stream");
    info!("Ctrl-C received, initiating graceful shutdown.");
}

/// The main server startup function: binds the listener, wires the shutdown
/// signal, and runs the accept loop until the signal fires.
pub async fn run(config: Config) -> Result<()> {
    let listener = Listener::bind(config).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        await_shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    listener.run(shutdown_rx).await;
    Ok(())
}
