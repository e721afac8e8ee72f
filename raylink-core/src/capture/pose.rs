//! Where the capture device is and where its screen points.

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{AnchorPose, UnitDirection};

/// Device pose and screen projection, in the capture device's world frame.
pub trait PoseSource: Send + Sync {
    fn camera_position(&self) -> Vec3;

    /// World-frame direction of the ray through `screen_point`, or `None`
    /// when the point cannot be projected.
    fn screen_point_to_ray(&self, screen_point: Vec2) -> Option<UnitDirection>;
}

/// A fixed pinhole camera looking down its local +Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinholeCamera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in degrees.
    pub vertical_fov_deg: f32,
    /// Screen size in pixels.
    pub viewport: Vec2,
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            vertical_fov_deg: 60.0,
            viewport: Vec2::new(1920.0, 1080.0),
        }
    }
}

impl PinholeCamera {
    pub fn look_from(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }
}

impl PoseSource for PinholeCamera {
    fn camera_position(&self) -> Vec3 {
        self.position
    }

    fn screen_point_to_ray(&self, screen_point: Vec2) -> Option<UnitDirection> {
        if self.viewport.min_element() <= 0.0 || !screen_point.is_finite() {
            return None;
        }
        let ndc = screen_point / self.viewport * 2.0 - Vec2::ONE;
        let half_height = (self.vertical_fov_deg.to_radians() * 0.5).tan();
        let aspect = self.viewport.x / self.viewport.y;
        let local = Vec3::new(ndc.x * half_height * aspect, ndc.y * half_height, 1.0);
        UnitDirection::new(self.rotation * local)
    }
}

impl<P: PoseSource> PoseSource for std::sync::Arc<P> {
    fn camera_position(&self) -> Vec3 {
        (**self).camera_position()
    }

    fn screen_point_to_ray(&self, screen_point: Vec2) -> Option<UnitDirection> {
        (**self).screen_point_to_ray(screen_point)
    }
}

/// The image target rays are expressed against, as tracked locally.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAnchor {
    pub target_id: String,
    pub pose: AnchorPose,
}

impl TrackedAnchor {
    pub fn new(target_id: impl Into<String>, pose: AnchorPose) -> Self {
        Self {
            target_id: target_id.into(),
            pose,
        }
    }
}
