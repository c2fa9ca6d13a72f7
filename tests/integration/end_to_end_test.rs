// tests/integration/end_to_end_test.rs

//! Single-node scenarios over the wire.

use super::test_helpers::{TestNode, assert_status};
use basaltdb::config::Config;
use basaltdb::core::protocol::{Frame, OperationTag, Status};
use bytes::Bytes;

#[tokio::test]
async fn test_put_get_delete_cycle() {
    let node = TestNode::spawn().await;

    assert_status(&node.put("alpha", "1").await, Status::Ok);

    let response = node.get("alpha").await;
    assert_status(&response, Status::Ok);
    assert_eq!(response.value, Bytes::from_static(b"1"));

    assert_status(&node.delete("alpha").await, Status::Ok);
    assert_status(&node.get("alpha").await, Status::Fail);

    node.shutdown().await;
}

#[tokio::test]
async fn test_overwrite_returns_latest_value() {
    let node = TestNode::spawn().await;

    assert_status(&node.put("k", "a").await, Status::Ok);
    assert_status(&node.put("k", "b").await, Status::Ok);

    let response = node.get("k").await;
    assert_status(&response, Status::Ok);
    assert_eq!(response.value, Bytes::from_static(b"b"));
    assert_eq!(node.state.store.len().await, 1);

    node.shutdown().await;
}

#[tokio::test]
async fn test_full_store_rejects_new_keys() {
    let mut config = Config::default();
    config.persistence.enabled = false;
    config.store.capacity = 2;
    let node = TestNode::spawn_with_config(config).await;

    assert_status(&node.put("a", "1").await, Status::Ok);
    assert_status(&node.put("b", "2").await, Status::Ok);
    assert_status(&node.put("c", "3").await, Status::Fail);
    // Existing keys keep serving.
    assert_status(&node.get("a").await, Status::Ok);

    node.shutdown().await;
}

#[tokio::test]
async fn test_list_keys_reports_stored_keys() {
    let node = TestNode::spawn().await;
    node.put("a", "1").await;
    node.put("b", "2").await;

    let response = node.list_keys().await;
    assert_status(&response, Status::Ok);
    let listing = String::from_utf8(response.value.to_vec()).unwrap();
    assert!(listing.contains("a\n"));
    assert!(listing.contains("b\n"));

    node.shutdown().await;
}

#[tokio::test]
async fn test_delete_missing_key_reports_not_found() {
    let node = TestNode::spawn().await;
    assert_status(&node.delete("ghost").await, Status::Fail);
    node.shutdown().await;
}

#[tokio::test]
async fn test_unknown_tag_answered_with_unknown_op() {
    let node = TestNode::spawn().await;

    let response = node
        .request(Frame {
            tag: 99,
            key: Bytes::from_static(b"k"),
            value: Bytes::from_static(b"v"),
            status: 0,
        })
        .await;
    assert_status(&response, Status::UnknownOp);
    // The response echoes the request's buffers.
    assert_eq!(response.key, Bytes::from_static(b"k"));
    assert_eq!(response.value, Bytes::from_static(b"v"));

    node.shutdown().await;
}

#[tokio::test]
async fn test_bare_replicate_tag_is_rejected() {
    let node = TestNode::spawn().await;

    let response = node
        .request(Frame::request(
            OperationTag::Replicate,
            Bytes::from_static(b"k"),
            Bytes::from_static(b"v"),
        ))
        .await;
    assert_status(&response, Status::UnknownOp);
    assert_eq!(node.state.store.len().await, 0);

    node.shutdown().await;
}

#[tokio::test]
async fn test_each_connection_carries_one_request() {
    let node = TestNode::spawn().await;
    // Two sequential requests on separate connections both succeed.
    assert_status(&node.put("a", "1").await, Status::Ok);
    assert_status(&node.get("a").await, Status::Ok);
    node.shutdown().await;
}
