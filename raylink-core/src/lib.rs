//! # raylink-core
//!
//! Coordinate relay between a capture device that turns a screen tap into
//! a 3D ray and display devices that resolve that ray against their own
//! environment.
//!
//! This crate contains:
//! - **Wire format**: `PacketHeader`, `Packet`, `MessageType`, `PacketFlags`
//! - **Messages**: `CaptureMessage`, `DisplayMessage`, `Hello` and the
//!   `WireMessage` encode/decode seam
//! - **Codec**: `RelayCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `Connection` with heartbeat, `Router` for typed handlers
//! - **Geometry**: anchor-frame transforms, `UnitDirection`, `Ray`
//! - **Spatial**: the `SpatialQuery` seam and the `SceneMesh` provider
//! - **State**: `SessionRole` and the shared `InputGate`
//! - **Relay**: capture fan-out with reply correlation, display answering
//! - **Capture**: `CaptureLoop` turning pointer input into rays
//! - **Error**: `RelayError`, a `thiserror`-based error type

pub mod capture;
pub mod codec;
pub mod error;
pub mod flags;
pub mod geometry;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod relay;
pub mod spatial;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CaptureLoop, PinholeCamera, PointerEvent, PointerPhase, PoseSource, TrackedAnchor};
pub use codec::RelayCodec;
pub use error::RelayError;
pub use flags::PacketFlags;
pub use geometry::{AnchorPose, Ray, UnitDirection, from_anchor_frame, to_anchor_frame};
pub use header::{HEADER_SIZE, MAGIC, PacketHeader};
pub use message::MessageType;
pub use network::{Connection, ConnectionId, ConnectionInfo, Envelope, PeerSender, RouteOutcome, Router};
pub use packet::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, Packet};
pub use protocol::{CaptureMessage, DisplayMessage, Hello, Message, WireMessage, decode, encode};
pub use relay::{
    AnchorTable, BroadcastReport, CaptureDispatcher, CaptureEvent, DisplayDispatcher, HitReport,
    PeerInfo, SessionRegistry,
};
pub use spatial::{Hit, LayerMask, SceneMesh, Shape, SpatialQuery};
pub use state::{InputCaptureState, InputGate, LifecycleEvent, Session, SessionRole};
