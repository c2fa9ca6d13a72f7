// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the lifecycle of a client
//! connection: one request frame in, one response frame out, then close.

use crate::core::dispatcher;
use crate::core::protocol::FrameCodec;
use crate::core::state::ServerState;
use crate::core::BasaltError;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

pub struct ConnectionHandler {
    framed: Framed<TcpStream, FrameCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl ConnectionHandler {
    pub fn new(socket: TcpStream, addr: SocketAddr, state: Arc<ServerState>) -> Self {
        Self {
            framed: Framed::new(socket, FrameCodec),
            addr,
            state,
        }
    }

    /// Reads one frame, dispatches it, and writes the single response. A
    /// short or malformed read drops the connection without a response.
    pub async fn run(mut self) -> Result<(), BasaltError> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                debug!("request with tag {} from {}", frame.tag, self.addr);
                let response = dispatcher::dispatch(&self.state, frame).await;
                self.framed.send(response).await?;
            }
            Some(Err(e)) => {
                if is_normal_disconnect(&e) {
                    debug!("connection from {} closed by peer: {}", self.addr, e);
                } else {
                    warn!("protocol error from {}: {}", self.addr, e);
                }
                return Err(e);
            }
            None => {
                debug!("connection from {} closed before a frame arrived", self.addr);
            }
        }
        Ok(())
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &BasaltError) -> bool {
    matches!(e, BasaltError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
