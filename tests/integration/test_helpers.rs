// tests/integration/test_helpers.rs

//! Test helpers: a listener running on an ephemeral port plus a minimal
//! one-shot frame client.

use basaltdb::config::Config;
use basaltdb::core::protocol::{Frame, FrameCodec, OperationTag, Status};
use basaltdb::core::state::ServerState;
use basaltdb::server::Listener;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// A BasaltDB node bound to 127.0.0.1 on an ephemeral port.
pub struct TestNode {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl TestNode {
    /// Spawns a node with persistence disabled.
    pub async fn spawn() -> Self {
        let mut config = Config::default();
        config.persistence.enabled = false;
        Self::spawn_with_config(config).await
    }

    pub async fn spawn_with_config(mut config: Config) -> Self {
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        let listener = Listener::bind(config)
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr();
        let state = listener.state();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(listener.run(shutdown_rx));
        Self {
            addr,
            state,
            shutdown_tx,
            task,
        }
    }

    /// Stops the node gracefully and waits for its shutdown work, including
    /// the final snapshot when persistence is on.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }

    /// Kills the node without any shutdown work, simulating a crash.
    pub async fn kill(self) {
        self.task.abort();
        let _ = self.task.await;
    }

    /// Sends one request on a fresh connection and returns the response.
    pub async fn request(&self, frame: Frame) -> Frame {
        let stream = TcpStream::connect(self.addr).await.expect("connect failed");
        let mut framed = Framed::new(stream, FrameCodec);
        framed.send(frame).await.expect("send failed");
        framed
            .next()
            .await
            .expect("server closed without a response")
            .expect("response decode failed")
    }

    pub async fn put(&self, key: &str, value: &str) -> Frame {
        self.request(Frame::request(
            OperationTag::Put,
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
        ))
        .await
    }

    pub async fn get(&self, key: &str) -> Frame {
        self.request(Frame::request(
            OperationTag::Get,
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::new(),
        ))
        .await
    }

    pub async fn delete(&self, key: &str) -> Frame {
        self.request(Frame::request(
            OperationTag::Delete,
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::new(),
        ))
        .await
    }

    pub async fn list_keys(&self) -> Frame {
        self.request(Frame::request(OperationTag::ListKeys, Bytes::new(), Bytes::new()))
            .await
    }

    pub async fn join_peer(&self, ip: &str, port: u16) -> Frame {
        self.request(Frame::request(
            OperationTag::NodeJoin,
            Bytes::copy_from_slice(ip.as_bytes()),
            Bytes::from(port.to_string()),
        ))
        .await
    }

    pub async fn leave_peer(&self, ip: &str, port: u16) -> Frame {
        self.request(Frame::request(
            OperationTag::NodeLeave,
            Bytes::copy_from_slice(ip.as_bytes()),
            Bytes::from(port.to_string()),
        ))
        .await
    }
}

pub fn assert_status(frame: &Frame, status: Status) {
    assert_eq!(
        frame.status, status as i32,
        "unexpected status in {frame:?}"
    );
}
