// src/core/dispatcher.rs

//! The per-request state machine.
//!
//! Each connection carries exactly one request. The dispatcher routes the
//! frame by its operation tag to the store or the membership table, triggers
//! replication for locally-applied mutations, and returns the response frame.
//! The response reuses the request's buffers: fields a handler does not touch
//! echo the client-supplied bytes back.

use crate::core::cluster::{Owner, PeerAddr};
use crate::core::protocol::{Frame, OperationTag, Status, VALUE_LEN};
use crate::core::state::ServerState;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles one decoded request frame and produces the response frame.
pub async fn dispatch(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    let Some(op) = frame.op() else {
        debug!("unknown operation tag {}", frame.tag);
        frame.set_status(Status::UnknownOp);
        return frame;
    };

    match op {
        OperationTag::Get => handle_get(state, frame).await,
        OperationTag::Put => handle_put(state, frame).await,
        OperationTag::Delete => handle_delete(state, frame).await,
        OperationTag::ReplicatePut => apply_replicated_put(state, frame).await,
        OperationTag::ReplicateDelete => apply_replicated_delete(state, frame).await,
        OperationTag::Replicate => {
            // The retired carrier tag does not say whether the embedded
            // mutation was a put or a delete; it cannot be applied.
            debug!("bare replicate frame rejected");
            frame.set_status(Status::UnknownOp);
            frame
        }
        OperationTag::NodeJoin => handle_node_join(state, frame),
        OperationTag::NodeLeave => handle_node_leave(state, frame),
        OperationTag::ListKeys => handle_list_keys(state, frame).await,
    }
}

/// True when this node serves the key: it either owns it, or no active peers
/// exist to own anything.
fn owned_locally(state: &ServerState, key: &[u8]) -> bool {
    matches!(
        state.membership.owner_of(key),
        Owner::Local | Owner::Unrouted
    )
}

async fn handle_get(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    if !owned_locally(state, &frame.key) {
        frame.set_status(Status::Redirect);
        return frame;
    }
    match state.store.get(&frame.key).await {
        Some(value) => {
            frame.set_value(value);
            frame.set_status(Status::Ok);
        }
        None => {
            frame.set_value(Bytes::new());
            frame.set_status(Status::Fail);
        }
    }
    frame
}

async fn handle_put(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    if !owned_locally(state, &frame.key) {
        frame.set_status(Status::Redirect);
        return frame;
    }
    match state.store.put(frame.key.clone(), frame.value.clone()).await {
        Ok(()) => {
            let fanout = Frame::request(
                OperationTag::ReplicatePut,
                frame.key.clone(),
                frame.value.clone(),
            );
            state.replicator.replicate(fanout).await;
            frame.set_status(Status::Ok);
        }
        Err(e) => {
            debug!("put rejected: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

async fn handle_delete(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    if !owned_locally(state, &frame.key) {
        frame.set_status(Status::Redirect);
        return frame;
    }
    match state.store.delete(&frame.key).await {
        Ok(true) => {
            let fanout = Frame::request(
                OperationTag::ReplicateDelete,
                frame.key.clone(),
                Bytes::new(),
            );
            state.replicator.replicate(fanout).await;
            frame.set_status(Status::Ok);
        }
        Ok(false) => frame.set_status(Status::Fail),
        Err(e) => {
            debug!("delete rejected: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

/// Applies a forwarded put without fanning out again.
async fn apply_replicated_put(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    match state.store.put(frame.key.clone(), frame.value.clone()).await {
        Ok(()) => frame.set_status(Status::Ok),
        Err(e) => {
            warn!("replicated put rejected: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

/// Applies a forwarded delete without fanning out again. Deleting an absent
/// key on a replica is not an error.
async fn apply_replicated_delete(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    match state.store.delete(&frame.key).await {
        Ok(_) => frame.set_status(Status::Ok),
        Err(e) => {
            warn!("replicated delete rejected: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

fn handle_node_join(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    match PeerAddr::parse(&frame.key, &frame.value) {
        Ok(addr) => match state.membership.add(addr.clone()) {
            Ok(()) => {
                info!("peer {} joined the cluster", addr);
                frame.set_status(Status::Ok);
                note_redistribution(state);
            }
            Err(e) => {
                warn!("peer {} could not join: {}", addr, e);
                frame.set_status(Status::Fail);
            }
        },
        Err(e) => {
            warn!("malformed join request: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

fn handle_node_leave(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    match PeerAddr::parse(&frame.key, &frame.value) {
        Ok(addr) => {
            if state.membership.remove(&addr) {
                info!("peer {} left the cluster", addr);
            }
            frame.set_status(Status::Ok);
            note_redistribution(state);
        }
        Err(e) => {
            warn!("malformed leave request: {}", e);
            frame.set_status(Status::Fail);
        }
    }
    frame
}

async fn handle_list_keys(state: &Arc<ServerState>, mut frame: Frame) -> Frame {
    let keys = state.store.list_keys(VALUE_LEN - 1).await;
    frame.set_value(keys);
    frame.set_status(Status::Ok);
    frame
}

/// Placeholder for moving stored data after a membership change. Ownership
/// re-maps through the routing function immediately; the data itself stays
/// where it was written.
fn note_redistribution(state: &ServerState) {
    debug!(
        active = state.membership.active_count(),
        "membership changed, stored keys are not redistributed"
    );
}
