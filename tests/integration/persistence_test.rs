// tests/integration/persistence_test.rs

//! Recovery scenarios: a node is restarted against the same data directory
//! and must come back with the state it acknowledged.

use super::test_helpers::{TestNode, assert_status};
use basaltdb::config::Config;
use basaltdb::core::protocol::Status;
use bytes::Bytes;
use tempfile::TempDir;

fn persistent_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.enabled = true;
    config.persistence.data_dir = dir.path().to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn test_recovery_after_clean_shutdown() {
    let dir = TempDir::new().unwrap();

    let node = TestNode::spawn_with_config(persistent_config(&dir)).await;
    assert_status(&node.put("k1", "v1").await, Status::Ok);
    assert_status(&node.put("k2", "v2").await, Status::Ok);
    assert_status(&node.delete("k1").await, Status::Ok);
    node.shutdown().await;

    let restarted = TestNode::spawn_with_config(persistent_config(&dir)).await;
    assert_status(&restarted.get("k1").await, Status::Fail);
    let response = restarted.get("k2").await;
    assert_status(&response, Status::Ok);
    assert_eq!(response.value, Bytes::from_static(b"v2"));
    restarted.shutdown().await;
}

#[tokio::test]
async fn test_recovery_after_crash_replays_the_log() {
    let dir = TempDir::new().unwrap();

    let node = TestNode::spawn_with_config(persistent_config(&dir)).await;
    assert_status(&node.put("k1", "v1").await, Status::Ok);
    assert_status(&node.put("k2", "v2").await, Status::Ok);
    // Every acknowledged mutation was flushed to the log before the
    // response; an abrupt kill must not lose it.
    node.kill().await;

    let restarted = TestNode::spawn_with_config(persistent_config(&dir)).await;
    let response = restarted.get("k1").await;
    assert_status(&response, Status::Ok);
    assert_eq!(response.value, Bytes::from_static(b"v1"));
    assert_status(&restarted.get("k2").await, Status::Ok);
    restarted.shutdown().await;
}

#[tokio::test]
async fn test_rotation_then_recovery() {
    let dir = TempDir::new().unwrap();

    let mut config = persistent_config(&dir);
    config.persistence.snapshot_threshold = 5;
    let node = TestNode::spawn_with_config(config.clone()).await;
    for i in 0..8 {
        assert_status(&node.put(&format!("key-{i}"), &format!("val-{i}")).await, Status::Ok);
    }
    node.shutdown().await;

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("snapshot_")));

    let restarted = TestNode::spawn_with_config(config).await;
    for i in 0..8 {
        let response = restarted.get(&format!("key-{i}")).await;
        assert_status(&response, Status::Ok);
        assert_eq!(response.value, Bytes::from(format!("val-{i}")));
    }
    restarted.shutdown().await;
}

#[tokio::test]
async fn test_repeated_recovery_is_stable() {
    let dir = TempDir::new().unwrap();

    let node = TestNode::spawn_with_config(persistent_config(&dir)).await;
    assert_status(&node.put("k", "v").await, Status::Ok);
    node.shutdown().await;

    // Restart twice with no new operations in between; the observable state
    // must not drift.
    for _ in 0..2 {
        let restarted = TestNode::spawn_with_config(persistent_config(&dir)).await;
        let response = restarted.get("k").await;
        assert_status(&response, Status::Ok);
        assert_eq!(response.value, Bytes::from_static(b"v"));
        assert_eq!(restarted.state.store.len().await, 1);
        restarted.shutdown().await;
    }
}
