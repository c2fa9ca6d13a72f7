// src/core/cluster/membership.rs

//! The cluster membership table and the key-to-node routing function.
//!
//! Peers are kept in join order and are never physically removed: a leave
//! deactivates the entry, and a later join of the same endpoint reactivates
//! it. The local node is identified by its announce address rather than by a
//! stored index, so deactivating any entry (including our own) never makes
//! this node impersonate another.

use super::hash::hash_key;
use crate::core::BasaltError;
use parking_lot::RwLock;
use std::fmt;
use std::net::Ipv4Addr;

/// The maximum number of peers a node will track, itself included.
pub const MAX_PEERS: usize = 10;

/// An IPv4 endpoint of a cluster node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddr {
    pub ip: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Parses the endpoint carried in a NODE_JOIN/NODE_LEAVE frame: the key
    /// field holds a dotted-quad IPv4 address, the value field a decimal
    /// port.
    pub fn parse(ip: &[u8], port: &[u8]) -> Result<Self, BasaltError> {
        let ip = std::str::from_utf8(ip)
            .ok()
            .and_then(|s| s.parse::<Ipv4Addr>().ok())
            .ok_or_else(|| {
                BasaltError::InvalidPeerAddress(String::from_utf8_lossy(ip).into_owned())
            })?;
        let port = std::str::from_utf8(port)
            .ok()
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                BasaltError::InvalidPeerAddress(String::from_utf8_lossy(port).into_owned())
            })?;
        Ok(Self::new(ip.to_string(), port))
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// One membership entry.
#[derive(Debug, Clone)]
pub struct Peer {
    pub addr: PeerAddr,
    pub active: bool,
}

/// The result of routing a key through the membership table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// This node owns the key.
    Local,
    /// Another node owns the key; the client should be redirected there.
    Remote(PeerAddr),
    /// No active peers exist; the request is served locally.
    Unrouted,
}

#[derive(Debug, Default)]
struct MembershipInner {
    peers: Vec<Peer>,
    self_addr: Option<PeerAddr>,
}

/// The ordered peer table. One lock covers the entries and the self address.
#[derive(Debug, Default)]
pub struct Membership {
    inner: RwLock<MembershipInner>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds this node's own endpoint and records it as the local identity.
    /// Called once by the listener before it starts accepting.
    pub fn register_self(&self, addr: PeerAddr) -> Result<(), BasaltError> {
        self.add(addr.clone())?;
        self.inner.write().self_addr = Some(addr);
        Ok(())
    }

    /// Adds a peer, reactivating it if the endpoint is already known. Fails
    /// when the table is full.
    pub fn add(&self, addr: PeerAddr) -> Result<(), BasaltError> {
        let mut inner = self.inner.write();
        if let Some(peer) = inner.peers.iter_mut().find(|p| p.addr == addr) {
            peer.active = true;
            return Ok(());
        }
        if inner.peers.len() >= MAX_PEERS {
            return Err(BasaltError::MembershipFull);
        }
        inner.peers.push(Peer { addr, active: true });
        Ok(())
    }

    /// Deactivates a peer. Returns `false` when the endpoint is unknown.
    pub fn remove(&self, addr: &PeerAddr) -> bool {
        let mut inner = self.inner.write();
        match inner.peers.iter_mut().find(|p| p.addr == *addr) {
            Some(peer) => {
                peer.active = false;
                true
            }
            None => false,
        }
    }

    /// Marks a peer inactive after a failed replication attempt.
    pub fn mark_inactive(&self, addr: &PeerAddr) {
        self.remove(addr);
    }

    /// The index of the entry owning `key`, or `None` when no entry is
    /// active. Pure for a fixed table: the hash picks among active entries
    /// in table order.
    pub fn node_for_key(&self, key: &[u8]) -> Option<usize> {
        self.inner.read().node_for_key(key)
    }

    /// Routes a key and compares the owner against the local identity.
    pub fn owner_of(&self, key: &[u8]) -> Owner {
        let inner = self.inner.read();
        match inner.node_for_key(key) {
            None => Owner::Unrouted,
            Some(idx) => {
                let addr = inner.peers[idx].addr.clone();
                if inner.self_addr.as_ref() == Some(&addr) {
                    Owner::Local
                } else {
                    Owner::Remote(addr)
                }
            }
        }
    }

    /// The endpoints a mutation fans out to: every active peer except this
    /// node. Snapshotted so replication I/O runs outside the lock.
    pub fn replication_targets(&self) -> Vec<PeerAddr> {
        let inner = self.inner.read();
        inner
            .peers
            .iter()
            .filter(|p| p.active && inner.self_addr.as_ref() != Some(&p.addr))
            .map(|p| p.addr.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().peers.iter().filter(|p| p.active).count()
    }

    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().peers.is_empty()
    }

    /// A copy of the entry at `idx`, if any.
    pub fn peer(&self, idx: usize) -> Option<Peer> {
        self.inner.read().peers.get(idx).cloned()
    }
}

impl MembershipInner {
    fn node_for_key(&self, key: &[u8]) -> Option<usize> {
        let active = self.peers.iter().filter(|p| p.active).count();
        if active == 0 {
            return None;
        }
        let target = (hash_key(key) as usize) % active;
        self.peers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .nth(target)
            .map(|(i, _)| i)
    }
}
