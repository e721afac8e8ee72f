//! Message handling on both sides of a relay session.
//!
//! The capture side fans rays out to every display through the
//! [`SessionRegistry`] and matches replies in [`PendingCaptures`]. The
//! display side answers each ray on the connection it arrived on.

mod capture;
mod display;
mod pending;
mod registry;

pub use capture::{CaptureDispatcher, CaptureEvent, HitReport, RequestIds};
pub use display::{AnchorTable, DisplayDispatcher, build_reply};
pub use pending::{PendingCapture, PendingCaptures, ReplyMatch};
pub use registry::{BroadcastReport, PeerInfo, SessionRegistry};
