//! Ray queries against body colliders
//!
//! Colliders are only used for picking and scene queries; there is no
//! contact generation or resolution.

use crate::foundation::math::{Transform, Vec3};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Collision layer bits used to filter queries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionLayers: u32 {
        /// Layer every body is on unless told otherwise
        const DEFAULT = 1 << 0;
        /// Static environment geometry
        const ENVIRONMENT = 1 << 1;
        /// Small dynamic objects
        const DEBRIS = 1 << 2;
        /// Volumes that are queried but never picked by default
        const TRIGGER = 1 << 3;
    }
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray; `None` when the direction has no length
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize(1.0e-6)?;
        Some(Self { origin, direction })
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Closest intersection of a ray with one shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeHit {
    /// Distance from the ray origin
    pub distance: f32,
    /// World-space point of intersection
    pub point: Vec3,
    /// World-space surface normal at the point
    pub normal: Vec3,
}

/// Collider attached to a body, expressed in the body's local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    /// Sphere centred on the body origin
    Sphere {
        /// Sphere radius
        radius: f32,
    },
    /// Box centred on the body origin, rotated with the body
    Box {
        /// Half size along each local axis
        half_extents: Vec3,
    },
}

impl ColliderShape {
    /// Sphere collider
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Box collider from half extents
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Box { half_extents }
    }

    /// Radius of a sphere enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Sphere { radius } => *radius,
            Self::Box { half_extents } => half_extents.norm(),
        }
    }

    /// Test ray intersection with this shape placed at `pose`
    ///
    /// Pose scale is ignored: colliders are sized in world units.
    pub fn intersect_ray(&self, pose: &Transform, ray: &Ray) -> Option<ShapeHit> {
        match self {
            Self::Sphere { radius } => intersect_sphere(pose.position, *radius, ray),
            Self::Box { half_extents } => intersect_box(pose, *half_extents, ray),
        }
    }
}

fn intersect_sphere(center: Vec3, radius: f32, ray: &Ray) -> Option<ShapeHit> {
    // Solve |origin + t*direction - center|^2 = radius^2 with a unit direction
    let oc = ray.origin - center;
    let b = oc.dot(&ray.direction);
    let c = oc.dot(&oc) - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_discriminant = discriminant.sqrt();
    let t1 = -b - sqrt_discriminant;
    let t2 = -b + sqrt_discriminant;
    let t = if t1 >= 0.0 {
        t1
    } else if t2 >= 0.0 {
        // Origin inside the sphere
        t2
    } else {
        return None;
    };

    let point = ray.point_at(t);
    let normal = (point - center).try_normalize(1.0e-6).unwrap_or(-ray.direction);
    Some(ShapeHit { distance: t, point, normal })
}

fn intersect_box(pose: &Transform, half_extents: Vec3, ray: &Ray) -> Option<ShapeHit> {
    let to_local = pose.rotation.inverse();
    let origin = to_local * (ray.origin - pose.position);
    let direction = to_local * ray.direction;

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    let mut entry_axis = 0;
    let mut entry_sign = 1.0_f32;

    for axis in 0..3 {
        let (o, d, h) = (origin[axis], direction[axis], half_extents[axis]);
        if d.abs() < 1.0e-8 {
            if o < -h || o > h {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut near, mut far) = ((-h - o) * inv, (h - o) * inv);
        let mut sign = -1.0;
        if near > far {
            std::mem::swap(&mut near, &mut far);
            sign = 1.0;
        }
        if near > t_min {
            t_min = near;
            entry_axis = axis;
            entry_sign = sign;
        }
        t_max = t_max.min(far);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }

    let (distance, local_normal) = if t_min >= 0.0 {
        let mut normal = Vec3::zeros();
        normal[entry_axis] = entry_sign;
        (t_min, normal)
    } else {
        // Origin inside the box: report the exit point facing the ray
        (t_max, -direction)
    };

    Some(ShapeHit {
        distance,
        point: ray.point_at(distance),
        normal: pose.rotation * local_normal,
    })
}
