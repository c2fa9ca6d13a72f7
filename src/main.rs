// src/main.rs

//! The main entry point for the BasaltDB server application.

use anyhow::Result;
use basaltdb::config::Config;
use basaltdb::server;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

/// The default configuration file consulted when no `--config` flag is given.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // Collect command-line arguments to decide the execution mode.
    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("BasaltDB version {VERSION}");
        return Ok(());
    }

    // Determine the configuration path. It can be provided via a --config
    // flag; otherwise the default path is used when the file exists, and the
    // built-in defaults otherwise.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let mut config = match explicit_config {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e}");
                std::process::exit(1);
            }
        },
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            match Config::from_file(DEFAULT_CONFIG_PATH) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!(
                        "Failed to load configuration from \"{DEFAULT_CONFIG_PATH}\": {e}"
                    );
                    std::process::exit(1);
                }
            }
        }
        None => Config::default(),
    };

    // Override port if provided as a command-line argument.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
    }

    // Override the data directory if provided.
    if let Some(dir_index) = args.iter().position(|arg| arg == "--data-dir") {
        if let Some(dir) = args.get(dir_index + 1) {
            config.persistence.data_dir = dir.clone();
        } else {
            eprintln!("--data-dir flag requires a value");
            std::process::exit(1);
        }
    }

    // Disable persistence entirely if requested.
    if args.contains(&"--no-persistence".to_string()) {
        config.persistence.enabled = false;
    }

    // Setup logging. RUST_LOG wins over the configured level.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting BasaltDB {} on port {}", VERSION, config.port);
    if config.persistence.enabled {
        info!(
            "Persistence enabled, data directory: {}",
            config.persistence.data_dir
        );
    } else {
        info!("Persistence disabled, data will be lost on shutdown");
    }

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}
