use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// How far a decoded direction's length may stray from 1.0.
pub const UNIT_TOLERANCE: f32 = 1e-3;

/// World-frame position of the shared anchor on the local device.
///
/// Only translation is modelled: both devices agree on axis orientation
/// through the anchor, so frames differ by an offset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorPose(pub Vec3);

impl AnchorPose {
    pub fn at(position: Vec3) -> Self {
        Self(position)
    }

    pub fn position(&self) -> Vec3 {
        self.0
    }
}

/// Express a local world-frame point relative to the anchor.
pub fn to_anchor_frame(device_pose: Vec3, anchor: AnchorPose) -> Vec3 {
    device_pose - anchor.0
}

/// Inverse of [`to_anchor_frame`].
pub fn from_anchor_frame(anchor_relative: Vec3, anchor: AnchorPose) -> Vec3 {
    anchor_relative + anchor.0
}

// ── UnitDirection ────────────────────────────────────────────────

/// A direction vector that is guaranteed to be unit length.
///
/// Deserializing goes through [`UnitDirection::from_unit`], so a decoded
/// value upholds the same guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec3", into = "Vec3")]
pub struct UnitDirection(Vec3);

impl UnitDirection {
    /// Normalize `v`. Returns `None` for zero-length or non-finite input.
    pub fn new(v: Vec3) -> Option<Self> {
        v.try_normalize().map(Self)
    }

    /// Accept a vector that should already be unit length, as received
    /// from a peer. Rejects anything outside [`UNIT_TOLERANCE`] rather
    /// than silently renormalizing it.
    pub fn from_unit(v: Vec3) -> Result<Self, RelayError> {
        let len = v.length();
        if !len.is_finite() || (len - 1.0).abs() > UNIT_TOLERANCE {
            return Err(RelayError::malformed(format!(
                "ray direction is not unit length (|d| = {len})"
            )));
        }
        Ok(Self(v))
    }

    pub fn get(&self) -> Vec3 {
        self.0
    }
}

impl TryFrom<Vec3> for UnitDirection {
    type Error = RelayError;

    fn try_from(v: Vec3) -> Result<Self, Self::Error> {
        Self::from_unit(v)
    }
}

impl From<UnitDirection> for Vec3 {
    fn from(d: UnitDirection) -> Self {
        d.0
    }
}

// ── Ray ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: UnitDirection,
}

impl Ray {
    pub fn new(origin: Vec3, direction: UnitDirection) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction.get() * t
    }
}

/// Format a vector as `(x, y, z)` with two decimals.
pub fn fmt_vec3(v: Vec3) -> impl fmt::Display {
    struct Formatted(Vec3);
    impl fmt::Display for Formatted {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "({:.2}, {:.2}, {:.2})", self.0.x, self.0.y, self.0.z)
        }
    }
    Formatted(v)
}
