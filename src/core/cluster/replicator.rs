// src/core/cluster/replicator.rs

//! Eager, best-effort fan-out of applied mutations to peer nodes.
//!
//! After a node applies a locally-owned put or delete, it forwards the
//! mutation to every other active peer over a fresh connection, one peer at a
//! time, and waits for a single acknowledgement frame. A peer that cannot be
//! reached within the deadline is marked inactive and skipped on subsequent
//! mutations; the originating client request never fails because of a
//! replication error. Replicas receiving the forwarded frame apply it without
//! fanning out again.

use super::membership::{Membership, PeerAddr};
use crate::core::BasaltError;
use crate::core::protocol::{Frame, FrameCodec, Status};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

pub struct Replicator {
    membership: Arc<Membership>,
    /// Per-peer deadline covering connect, send, and acknowledgement.
    deadline: Duration,
}

impl Replicator {
    pub fn new(membership: Arc<Membership>, deadline: Duration) -> Self {
        Self {
            membership,
            deadline,
        }
    }

    /// Sends `frame` to every other active peer. The peer list is
    /// snapshotted up front, so membership changes arriving mid-fan-out are
    /// picked up by the next mutation.
    pub async fn replicate(&self, frame: Frame) {
        for peer in self.membership.replication_targets() {
            if let Err(e) = self.send_to_peer(&peer, frame.clone()).await {
                warn!("replication to {} failed, marking peer inactive: {}", peer, e);
                self.membership.mark_inactive(&peer);
            }
        }
    }

    async fn send_to_peer(&self, peer: &PeerAddr, frame: Frame) -> Result<(), BasaltError> {
        let exchange = async {
            let stream = TcpStream::connect((peer.ip.as_str(), peer.port)).await?;
            let mut framed = Framed::new(stream, FrameCodec);
            framed.send(frame).await?;
            match framed.next().await {
                Some(Ok(ack)) => {
                    if !ack.has_status(Status::Ok) {
                        debug!("peer {} acknowledged with status {}", peer, ack.status);
                    }
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Err(BasaltError::IncompleteFrame),
            }
        };
        timeout(self.deadline, exchange).await.map_err(|_| {
            BasaltError::ReplicationError(format!("no acknowledgement within {:?}", self.deadline))
        })?
    }
}
