//! Connected display sessions, as seen from the capture side.
//!
//! The registry replaces any process-wide roster: whoever owns the
//! listener calls [`on_session_start`](SessionRegistry::on_session_start)
//! after a peer's hello and [`on_session_stop`](SessionRegistry::on_session_stop)
//! when its connection ends, and hands the registry to collaborators by
//! `Arc`. A broadcast never removes peers itself; it reports the dead ones
//! so the owner can stop them through its usual path.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::network::{ConnectionId, PeerSender};
use crate::packet::Packet;

/// One registered peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub id: ConnectionId,
    pub name: String,
    pub addr: Option<SocketAddr>,
    pub since: Instant,
}

impl PeerInfo {
    pub fn connected_for(&self) -> Duration {
        self.since.elapsed()
    }
}

#[derive(Debug)]
struct Entry {
    info: PeerInfo,
    sender: PeerSender,
}

/// Result of a best-effort fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Peers the packet was handed to, in fan-out order.
    pub delivered: Vec<ConnectionId>,
    /// Peers whose channel was closed. They are still registered.
    pub dropped: Vec<ConnectionId>,
}

impl BroadcastReport {
    pub fn reached_anyone(&self) -> bool {
        !self.delivered.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    // BTreeMap keeps fan-out order stable (connection order).
    peers: RwLock<BTreeMap<ConnectionId, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. A second start for the same connection replaces the
    /// first entry.
    pub fn on_session_start(
        &self,
        sender: PeerSender,
        name: impl Into<String>,
        addr: Option<SocketAddr>,
    ) -> PeerInfo {
        let info = PeerInfo {
            id: sender.id(),
            name: name.into(),
            addr,
            since: Instant::now(),
        };
        info!(connection = %info.id, name = %info.name, "display session started");
        self.write()
            .insert(info.id, Entry { info: info.clone(), sender });
        info
    }

    /// Remove a peer. Returns its info if it was registered.
    pub fn on_session_stop(&self, id: ConnectionId) -> Option<PeerInfo> {
        let removed = self.write().remove(&id).map(|e| e.info);
        if let Some(info) = &removed {
            info!(
                connection = %id,
                name = %info.name,
                "display session stopped after {:.1}s",
                info.connected_for().as_secs_f64()
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.read().contains_key(&id)
    }

    /// Registered connection ids, in fan-out order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.read().keys().copied().collect()
    }

    /// Send `packet` to every registered peer.
    ///
    /// Dead peers are skipped and listed in [`BroadcastReport::dropped`];
    /// a failed send is never an error for the caller.
    pub async fn broadcast(&self, packet: &Packet) -> BroadcastReport {
        // Clone the senders out so the lock is not held across an await.
        let senders: Vec<PeerSender> = self.read().values().map(|e| e.sender.clone()).collect();

        let mut report = BroadcastReport::default();
        for sender in senders {
            match sender.send(packet.clone()).await {
                Ok(()) => report.delivered.push(sender.id()),
                Err(e) => {
                    debug!("skipping peer during broadcast: {e}");
                    report.dropped.push(sender.id());
                }
            }
        }
        report
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ConnectionId, Entry>> {
        self.peers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ConnectionId, Entry>> {
        self.peers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
