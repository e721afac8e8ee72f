//! Spatial queries against the display's local environment.
//!
//! The relay only needs "cast this ray, tell me what it went through".
//! [`SpatialQuery`] is that seam; [`SceneMesh`] is the built-in provider.

mod layer;
mod mesh;

pub use layer::LayerMask;
pub use mesh::{Collider, SceneMesh, Shape};

use glam::Vec3;

use crate::geometry::Ray;

/// One intersection reported by a provider, in the provider's world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub point: Vec3,
    pub label: String,
    /// Distance from the ray origin to `point`.
    pub distance: f32,
}

impl Hit {
    pub fn new(point: Vec3, label: impl Into<String>, distance: f32) -> Self {
        Self {
            point,
            label: label.into(),
            distance,
        }
    }
}

/// A provider of ray intersections.
///
/// The returned sequence is lazy and finite, in whatever order the
/// provider traverses its scene. Callers must not assume nearest-first.
/// An empty sequence means the ray hit nothing and is not an error.
pub trait SpatialQuery: Send + Sync {
    fn query<'a>(&'a self, ray: Ray, layers: LayerMask) -> impl Iterator<Item = Hit> + 'a;
}

impl<Q: SpatialQuery> SpatialQuery for std::sync::Arc<Q> {
    fn query<'a>(&'a self, ray: Ray, layers: LayerMask) -> impl Iterator<Item = Hit> + 'a {
        (**self).query(ray, layers)
    }
}
