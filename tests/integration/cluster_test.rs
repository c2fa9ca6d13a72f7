// tests/integration/cluster_test.rs

//! Multi-node scenarios: membership changes, redirection, and eager
//! replication between live nodes.
//!
//! Key choice in these tests leans on the routing hash: with two active
//! entries, "a" (hash 97, odd) routes to the second entry and "b" (hash 98,
//! even) to the first, which is always the node itself.

use super::test_helpers::{TestNode, assert_status};
use basaltdb::config::Config;
use basaltdb::core::protocol::Status;
use bytes::Bytes;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_node_join_and_leave() {
    let node = TestNode::spawn().await;
    assert_eq!(node.state.membership.active_count(), 1);

    assert_status(&node.join_peer("10.0.0.9", 9999).await, Status::Ok);
    assert_eq!(node.state.membership.active_count(), 2);

    assert_status(&node.leave_peer("10.0.0.9", 9999).await, Status::Ok);
    assert_eq!(node.state.membership.active_count(), 1);

    node.shutdown().await;
}

#[tokio::test]
async fn test_join_with_malformed_endpoint_fails() {
    let node = TestNode::spawn().await;

    let response = node.join_peer("not-an-ip", 9999).await;
    assert_status(&response, Status::Fail);

    let response = node
        .request(basaltdb::core::protocol::Frame::request(
            basaltdb::core::protocol::OperationTag::NodeJoin,
            Bytes::from_static(b"10.0.0.9"),
            Bytes::from_static(b"not-a-port"),
        ))
        .await;
    assert_status(&response, Status::Fail);
    assert_eq!(node.state.membership.active_count(), 1);

    node.shutdown().await;
}

#[tokio::test]
async fn test_remote_key_is_redirected_without_local_mutation() {
    let node = TestNode::spawn().await;
    assert_status(&node.join_peer("10.0.0.9", 9999).await, Status::Ok);

    // "a" routes to the peer; this node must not store it.
    assert_status(&node.put("a", "1").await, Status::Redirect);
    assert_eq!(node.state.store.get(b"a").await, None);

    assert_status(&node.get("a").await, Status::Redirect);
    assert_status(&node.delete("a").await, Status::Redirect);

    node.shutdown().await;
}

#[tokio::test]
async fn test_replication_reaches_live_peer() {
    let primary = TestNode::spawn().await;
    let replica = TestNode::spawn().await;

    assert_status(
        &primary.join_peer("127.0.0.1", replica.addr.port()).await,
        Status::Ok,
    );

    // "b" stays on the primary and is fanned out to the replica before the
    // client sees the acknowledgement.
    assert_status(&primary.put("b", "1").await, Status::Ok);
    assert_eq!(
        replica.state.store.get(b"b").await,
        Some(Bytes::from_static(b"1"))
    );

    assert_status(&primary.delete("b").await, Status::Ok);
    assert_eq!(replica.state.store.get(b"b").await, None);

    primary.shutdown().await;
    replica.shutdown().await;
}

#[tokio::test]
async fn test_departed_peer_no_longer_receives_mutations() {
    let primary = TestNode::spawn().await;
    let replica = TestNode::spawn().await;

    assert_status(
        &primary.join_peer("127.0.0.1", replica.addr.port()).await,
        Status::Ok,
    );
    assert_status(&primary.put("b", "1").await, Status::Ok);
    assert_eq!(
        replica.state.store.get(b"b").await,
        Some(Bytes::from_static(b"1"))
    );

    assert_status(
        &primary.leave_peer("127.0.0.1", replica.addr.port()).await,
        Status::Ok,
    );
    assert_status(&primary.put("b", "2").await, Status::Ok);
    // The replica keeps its last value; nothing was sent.
    assert_eq!(
        replica.state.store.get(b"b").await,
        Some(Bytes::from_static(b"1"))
    );

    primary.shutdown().await;
    replica.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_peer_is_marked_inactive() {
    let mut config = Config::default();
    config.persistence.enabled = false;
    config.cluster.replica_timeout_ms = 200;
    let node = TestNode::spawn_with_config(config).await;

    // Reserve a port, then free it so connections to it are refused.
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    assert_status(&node.join_peer("127.0.0.1", closed_port).await, Status::Ok);
    assert_eq!(node.state.membership.active_count(), 2);

    // "b" is served locally; the fan-out to the dead peer fails and must not
    // fail the client request.
    assert_status(&node.put("b", "1").await, Status::Ok);
    assert_eq!(node.state.membership.active_count(), 1);

    // With the peer inactive, every key is local again.
    assert_status(&node.put("a", "2").await, Status::Ok);

    node.shutdown().await;
}
