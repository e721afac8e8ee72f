use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::codec::RelayCodec;
use crate::error::RelayError;
use crate::message::MessageType;
use crate::packet::Packet;

/// Interval between keep-alive packets on an idle or busy link.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Depth of the per-connection send and receive queues.
const CHANNEL_CAPACITY: usize = 100;

// ── ConnectionId ─────────────────────────────────────────────────

/// Process-unique identifier for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── PeerSender ───────────────────────────────────────────────────

/// Cloneable send half of a connection.
#[derive(Debug, Clone)]
pub struct PeerSender {
    id: ConnectionId,
    tx: mpsc::Sender<Packet>,
}

impl PeerSender {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Packet>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue `packet` for the peer.
    ///
    /// Fails with [`RelayError::ConnectionLost`] once the connection's
    /// writer has shut down.
    pub async fn send(&self, packet: Packet) -> Result<(), RelayError> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| RelayError::ConnectionLost(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Connection ───────────────────────────────────────────────────

/// A framed TCP connection to a single peer.
///
/// Three background tasks serve each connection: a writer draining the
/// send queue into the socket, a reader pushing decoded packets into the
/// receive queue, and a heartbeat ticking every [`HEARTBEAT_INTERVAL`].
/// Heartbeats are consumed by the reader and never surface from
/// [`recv`](Self::recv).
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    // Channel to send packets to background writer task
    tx: mpsc::Sender<Packet>,
    // Channel to receive packets from background reader task
    rx: mpsc::Receiver<Packet>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_heartbeat(stream, HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat(stream: TcpStream, heartbeat_interval: Duration) -> Self {
        let id = ConnectionId::next();
        let peer_addr = stream.peer_addr().ok();
        let (mut net_writer, mut net_reader) = Framed::new(stream, RelayCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Packet>(CHANNEL_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel::<Packet>(CHANNEL_CAPACITY);

        // Writer task: User -> Network
        tokio::spawn(async move {
            while let Some(packet) = network_rx.recv().await {
                if let Err(e) = net_writer.send(packet).await {
                    warn!(connection = %id, "network write error: {e}");
                    break;
                }
            }
            debug!(connection = %id, "writer stopped");
        });

        // Reader task: Network -> User
        tokio::spawn(async move {
            loop {
                let result = tokio::select! {
                    next = net_reader.next() => match next {
                        Some(result) => result,
                        None => break,
                    },
                    // user_rx was dropped, stop reading
                    _ = network_tx.closed() => break,
                };
                match result {
                    Ok(packet) => {
                        if packet.header().message_type() == MessageType::Heartbeat as u32 {
                            trace!(connection = %id, "heartbeat");
                            continue;
                        }
                        if network_tx.send(packet).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection = %id, "network read error: {e}");
                        break; // Stop on codec/network errors
                    }
                }
            }
            debug!(connection = %id, "reader stopped");
        });

        // Heartbeat task; holds only a weak sender so dropping every
        // user handle still shuts the writer down.
        let heartbeat_tx = user_tx.downgrade();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = heartbeat_tx.upgrade() else {
                    break;
                };
                if tx.send(Packet::heartbeat()).await.is_err() {
                    break;
                }
            }
        });

        Self {
            id,
            peer_addr,
            tx: user_tx,
            rx: user_rx,
        }
    }

    pub async fn connect(conn_info: &ConnectionInfo) -> Result<Self, RelayError> {
        let stream = TcpStream::connect(conn_info.to_socket_string()).await?;
        Ok(Self::new(stream))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub async fn send(&self, packet: Packet) -> Result<(), RelayError> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| RelayError::ConnectionLost(self.id))
    }

    /// Next non-heartbeat packet, or `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> PeerSender {
        PeerSender::new(self.id, self.tx.clone())
    }

    /// Split into a cloneable send half and the receive queue.
    pub fn into_split(self) -> (PeerSender, mpsc::Receiver<Packet>) {
        (PeerSender::new(self.id, self.tx), self.rx)
    }
}

// ── ConnectionInfo ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    ip: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn to_socket_string(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert_eq!(ConnectionId::from_raw(3).to_string(), "#3");
    }

    #[test]
    fn connection_info_formats() {
        let info = ConnectionInfo::new("127.0.0.1", 7400);
        assert_eq!(info.to_socket_string(), "127.0.0.1:7400");
        assert_eq!(info.to_string(), "127.0.0.1:7400");
    }

    #[tokio::test]
    async fn peer_sender_reports_lost_connection() {
        let (tx, rx) = mpsc::channel(1);
        let sender = PeerSender::new(ConnectionId::from_raw(9), tx);
        drop(rx);
        assert!(sender.is_closed());
        let err = sender.send(Packet::heartbeat()).await.unwrap_err();
        assert!(matches!(err, RelayError::ConnectionLost(id) if id.get() == 9));
    }
}
