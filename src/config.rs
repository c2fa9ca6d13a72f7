// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_capacity() -> usize {
    1000
}
fn default_persistence_enabled() -> bool {
    true
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_snapshot_threshold() -> u64 {
    100
}
fn default_replica_timeout_ms() -> u64 {
    1000
}

/// Settings for the in-memory key-value table.
#[derive(Deserialize, Debug, Clone)]
pub struct StoreConfig {
    /// The maximum number of entries the table will hold. A put of a new key
    /// beyond this limit is rejected with a store-full failure.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Settings for the write-ahead log and snapshot files.
#[derive(Deserialize, Debug, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,
    /// The directory holding `operations*.log` and `snapshot_*.dat` files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// The number of logged operations after which a snapshot is written and
    /// the log is rotated.
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            data_dir: default_data_dir(),
            snapshot_threshold: default_snapshot_threshold(),
        }
    }
}

/// Settings for cluster membership and peer replication.
#[derive(Deserialize, Debug, Clone)]
pub struct ClusterConfig {
    /// The IPv4 address this node registers itself under in the membership
    /// table. Required when binding a wildcard address; falls back to `host`.
    #[serde(default)]
    pub announce_ip: Option<String>,
    /// The per-peer socket deadline for replication fan-out, in milliseconds.
    #[serde(default = "default_replica_timeout_ms")]
    pub replica_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            announce_ip: None,
            replica_timeout_ms: default_replica_timeout_ms(),
        }
    }
}

/// Represents the final, validated server configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            store: StoreConfig::default(),
            persistence: PersistenceConfig::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.store.capacity == 0 {
            return Err(anyhow!("store.capacity cannot be 0"));
        }
        if self.persistence.enabled && self.persistence.snapshot_threshold == 0 {
            return Err(anyhow!(
                "persistence.snapshot_threshold cannot be 0 when persistence is enabled"
            ));
        }
        if self.cluster.replica_timeout_ms == 0 {
            return Err(anyhow!("cluster.replica_timeout_ms cannot be 0"));
        }
        if let Some(ip) = &self.cluster.announce_ip
            && ip.parse::<std::net::Ipv4Addr>().is_err()
        {
            return Err(anyhow!(
                "cluster.announce_ip must be an IPv4 dotted quad, got '{ip}'"
            ));
        }
        Ok(())
    }
}
