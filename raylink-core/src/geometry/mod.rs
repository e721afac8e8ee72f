//! Shared-anchor coordinate frames.
//!
//! Both roles align to an anchor (the tracked image target). Positions
//! exchanged on the wire are always expressed relative to that anchor;
//! each side converts to and from its own world frame locally.

mod transform;

pub use transform::{
    AnchorPose, Ray, UNIT_TOLERANCE, UnitDirection, fmt_vec3, from_anchor_frame,
    to_anchor_frame,
};
