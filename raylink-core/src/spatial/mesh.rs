use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::geometry::Ray;
use crate::spatial::{Hit, LayerMask, SpatialQuery};

/// Below this a direction component is treated as parallel to a slab.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Minimum hit distance; filters self-intersection at the ray origin.
const MIN_HIT_DISTANCE: f32 = 1e-5;

/// Collision geometry in the display's world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    /// Axis-aligned box.
    Box { center: Vec3, half_extents: Vec3 },
    /// Single double-sided triangle (one face of a reconstructed mesh).
    Triangle { a: Vec3, b: Vec3, c: Vec3 },
}

impl Shape {
    /// Distance along `ray` to the first surface crossing, if any.
    ///
    /// A ray that starts inside a box does not hit that box.
    pub fn intersect(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        let t = match self {
            Shape::Box {
                center,
                half_extents,
            } => slab_intersect(ray, *center - *half_extents, *center + *half_extents),
            Shape::Triangle { a, b, c } => triangle_intersect(ray, *a, *b, *c),
        }?;
        (t <= max_distance).then_some(t)
    }
}

fn slab_intersect(ray: &Ray, min: Vec3, max: Vec3) -> Option<f32> {
    let origin = ray.origin;
    let dir = ray.direction.get();
    let inv = |d: f32| {
        if d.abs() > PARALLEL_EPSILON {
            1.0 / d
        } else {
            f32::MAX
        }
    };
    let inv_dir = Vec3::new(inv(dir.x), inv(dir.y), inv(dir.z));

    let t1 = (min - origin) * inv_dir;
    let t2 = (max - origin) * inv_dir;
    let t_min = t1.min(t2).max_element();
    let t_max = t1.max(t2).min_element();

    if t_max < 0.0 || t_min > t_max || t_min < MIN_HIT_DISTANCE {
        return None;
    }
    Some(t_min)
}

/// Möller–Trumbore.
fn triangle_intersect(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let dir = ray.direction.get();
    let edge1 = b - a;
    let edge2 = c - a;
    let p = dir.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    (t >= MIN_HIT_DISTANCE).then_some(t)
}

// ── Collider ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub label: String,
    pub layer: LayerMask,
    pub shape: Shape,
}

// ── SceneMesh ────────────────────────────────────────────────────

/// An ordered list of labelled colliders.
///
/// Queries visit colliders in insertion order and report every one the
/// ray passes through, so results are in traversal order, not sorted by
/// distance.
#[derive(Debug, Clone)]
pub struct SceneMesh {
    colliders: Vec<Collider>,
    max_distance: f32,
}

impl Default for SceneMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneMesh {
    /// An empty scene with unbounded query distance.
    pub fn new() -> Self {
        Self {
            colliders: Vec::new(),
            max_distance: f32::MAX,
        }
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn add(&mut self, collider: Collider) {
        self.colliders.push(collider);
    }

    pub fn add_box(
        &mut self,
        label: impl Into<String>,
        layer: LayerMask,
        center: Vec3,
        half_extents: Vec3,
    ) {
        self.add(Collider {
            label: label.into(),
            layer,
            shape: Shape::Box {
                center,
                half_extents: half_extents.abs(),
            },
        });
    }

    pub fn add_triangle(&mut self, label: impl Into<String>, layer: LayerMask, tri: [Vec3; 3]) {
        let [a, b, c] = tri;
        self.add(Collider {
            label: label.into(),
            layer,
            shape: Shape::Triangle { a, b, c },
        });
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl SpatialQuery for SceneMesh {
    fn query<'a>(&'a self, ray: Ray, layers: LayerMask) -> impl Iterator<Item = Hit> + 'a {
        let max_distance = self.max_distance;
        self.colliders
            .iter()
            .filter(move |c| layers.intersects(c.layer))
            .filter_map(move |c| {
                c.shape
                    .intersect(&ray, max_distance)
                    .map(|t| Hit::new(ray.at(t), c.label.clone(), t))
            })
    }
}
