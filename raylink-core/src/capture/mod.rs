//! Capture-side input sampling.
//!
//! A [`CaptureLoop`] reads the shared [`InputGate`](crate::state::InputGate)
//! every tick and turns qualifying pointer events into anchor-relative
//! rays through a [`PoseSource`].

mod pointer;
mod pose;
mod sampler;

pub use pointer::{PointerEvent, PointerPhase};
pub use pose::{PinholeCamera, PoseSource, TrackedAnchor};
pub use sampler::CaptureLoop;
