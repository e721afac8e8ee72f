//! TCP transport: framed connections and per-type message routing.

mod connection;
mod router;

pub use connection::{
    Connection, ConnectionId, ConnectionInfo, HEARTBEAT_INTERVAL, PeerSender,
};
pub use router::{Envelope, RouteOutcome, Router};
