//! Physics backend seam and the built-in integrator
//!
//! The engine only needs create/destroy, pose read-back, velocity control,
//! fixed stepping and ray queries from a physics world. [`SimplePhysicsWorld`]
//! implements exactly that with semi-implicit Euler; contacts are not solved.

use super::collision::{ColliderShape, CollisionLayers, Ray};
use crate::core::config::PhysicsConfig;
use crate::foundation::math::{Quat, Transform, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

new_key_type! {
    /// Handle of a body inside a physics backend
    pub struct BodyHandle;
}

/// Physics errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// The handle was destroyed or never issued
    #[error("Invalid body handle {0:?}")]
    InvalidHandle(BodyHandle),

    /// The operation needs a body that moves
    #[error("Body {handle:?} is {kind:?} and cannot be driven")]
    WrongBodyKind {
        /// Body the call was made on
        handle: BodyHandle,
        /// Its kind
        kind: BodyKind,
    },

    /// Body parameters out of range
    #[error("Invalid body description: {0}")]
    InvalidDesc(String),
}

impl PhysicsError {
    /// Whether this error is a programming error rather than a creation failure
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::InvalidDesc(_))
    }
}

/// How a body moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moves only by its set velocity, unaffected by gravity and impulses
    Kinematic,
    /// Fully simulated
    Dynamic,
}

/// Parameters for a new body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// How the body moves
    pub kind: BodyKind,
    /// Collider used by ray queries
    pub shape: ColliderShape,
    /// Mass in kg (dynamic bodies)
    pub mass: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec3,
    /// Initial angular velocity (axis * rad/s)
    pub angular_velocity: Vec3,
    /// Linear velocity damping per second
    pub linear_damping: f32,
    /// Angular velocity damping per second
    pub angular_damping: f32,
    /// Multiplier on world gravity
    pub gravity_scale: f32,
    /// Layers the body is on
    pub layers: CollisionLayers,
}

impl BodyDesc {
    fn with_kind(kind: BodyKind, shape: ColliderShape) -> Self {
        Self {
            kind,
            shape,
            mass: 1.0,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            linear_damping: 0.0,
            angular_damping: 0.05,
            gravity_scale: 1.0,
            layers: CollisionLayers::DEFAULT,
        }
    }

    /// Fully simulated body
    pub fn dynamic(shape: ColliderShape) -> Self {
        Self::with_kind(BodyKind::Dynamic, shape)
    }

    /// Velocity-driven body
    pub fn kinematic(shape: ColliderShape) -> Self {
        Self::with_kind(BodyKind::Kinematic, shape)
    }

    /// Immovable body
    pub fn fixed(shape: ColliderShape) -> Self {
        Self::with_kind(BodyKind::Static, shape)
    }

    /// Builder pattern: Set mass
    #[must_use]
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Builder pattern: Set initial linear velocity
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Builder pattern: Set initial angular velocity
    #[must_use]
    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    /// Builder pattern: Set linear and angular damping
    #[must_use]
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Builder pattern: Set gravity multiplier
    #[must_use]
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Builder pattern: Set collision layers
    #[must_use]
    pub fn with_layers(mut self, layers: CollisionLayers) -> Self {
        self.layers = layers;
        self
    }

    fn validate(&self) -> Result<(), PhysicsError> {
        if self.kind == BodyKind::Dynamic && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(PhysicsError::InvalidDesc(format!("mass must be positive, got {}", self.mass)));
        }
        if self.linear_damping < 0.0 || self.angular_damping < 0.0 {
            return Err(PhysicsError::InvalidDesc("damping cannot be negative".to_string()));
        }
        let size_ok = match self.shape {
            ColliderShape::Sphere { radius } => radius > 0.0,
            ColliderShape::Box { half_extents } => half_extents.iter().all(|h| *h > 0.0),
        };
        if !size_ok {
            return Err(PhysicsError::InvalidDesc(format!("degenerate collider {:?}", self.shape)));
        }
        Ok(())
    }
}

/// Closest body hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Body that was hit
    pub body: BodyHandle,
    /// Distance from the ray origin
    pub distance: f32,
    /// World-space point of intersection
    pub point: Vec3,
    /// World-space surface normal
    pub normal: Vec3,
}

/// Physics world interface consumed by the bridge
pub trait PhysicsBackend {
    /// Add a body at `pose`
    fn create_body(&mut self, desc: &BodyDesc, pose: Transform) -> Result<BodyHandle, PhysicsError>;

    /// Remove a body
    fn destroy_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError>;

    /// Current simulated pose
    fn pose(&self, handle: BodyHandle) -> Option<Transform>;

    /// Move a body instantly
    fn set_pose(&mut self, handle: BodyHandle, pose: Transform) -> Result<(), PhysicsError>;

    /// Current linear velocity
    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3>;

    /// Override linear velocity (dynamic and kinematic bodies)
    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError>;

    /// Apply an instantaneous impulse (dynamic bodies)
    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError>;

    /// Advance the simulation by exactly `dt` seconds
    fn step(&mut self, dt: f32);

    /// Closest body on `mask` layers hit within `max_distance`
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: CollisionLayers) -> Option<RayHit>;

    /// Number of live bodies
    fn body_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Body {
    desc: BodyDesc,
    pose: Transform,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
}

/// Semi-implicit Euler integrator with ray queries
#[derive(Debug)]
pub struct SimplePhysicsWorld {
    bodies: SlotMap<BodyHandle, Body>,
    gravity: Vec3,
}

impl Default for SimplePhysicsWorld {
    fn default() -> Self {
        Self::from_config(&PhysicsConfig::default())
    }
}

impl SimplePhysicsWorld {
    /// Create an empty world
    pub fn new(gravity: Vec3) -> Self {
        Self { bodies: SlotMap::with_key(), gravity }
    }

    /// Create an empty world with the configured gravity
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self::new(Vec3::from(config.gravity))
    }

    /// World gravity
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidHandle(handle))
    }
}

impl PhysicsBackend for SimplePhysicsWorld {
    fn create_body(&mut self, desc: &BodyDesc, pose: Transform) -> Result<BodyHandle, PhysicsError> {
        desc.validate()?;
        let moving = desc.kind != BodyKind::Static;
        let handle = self.bodies.insert(Body {
            desc: *desc,
            pose,
            linear_velocity: if moving { desc.linear_velocity } else { Vec3::zeros() },
            angular_velocity: if moving { desc.angular_velocity } else { Vec3::zeros() },
        });
        log::trace!("Created {:?} body {:?}", desc.kind, handle);
        Ok(handle)
    }

    fn destroy_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        self.bodies.remove(handle).ok_or(PhysicsError::InvalidHandle(handle))?;
        log::trace!("Destroyed body {:?}", handle);
        Ok(())
    }

    fn pose(&self, handle: BodyHandle) -> Option<Transform> {
        self.bodies.get(handle).map(|body| body.pose)
    }

    fn set_pose(&mut self, handle: BodyHandle, pose: Transform) -> Result<(), PhysicsError> {
        self.body_mut(handle)?.pose = pose;
        Ok(())
    }

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|body| body.linear_velocity)
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.desc.kind == BodyKind::Static {
            return Err(PhysicsError::WrongBodyKind { handle, kind: body.desc.kind });
        }
        body.linear_velocity = velocity;
        Ok(())
    }

    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.desc.kind != BodyKind::Dynamic {
            return Err(PhysicsError::WrongBodyKind { handle, kind: body.desc.kind });
        }
        body.linear_velocity += impulse / body.desc.mass;
        Ok(())
    }

    fn step(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            match body.desc.kind {
                BodyKind::Static => continue,
                BodyKind::Dynamic => {
                    body.linear_velocity += self.gravity * body.desc.gravity_scale * dt;
                    body.linear_velocity /= 1.0 + body.desc.linear_damping * dt;
                    body.angular_velocity /= 1.0 + body.desc.angular_damping * dt;
                }
                BodyKind::Kinematic => {}
            }
            body.pose.position += body.linear_velocity * dt;
            if body.angular_velocity.norm_squared() > 0.0 {
                let spin = Quat::from_scaled_axis(body.angular_velocity * dt);
                body.pose.rotation = Quat::new_normalize((spin * body.pose.rotation).into_inner());
            }
        }
    }

    fn raycast(&self, ray: &Ray, max_distance: f32, mask: CollisionLayers) -> Option<RayHit> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.desc.layers.intersects(mask))
            // Bounding-sphere reject before the exact test
            .filter(|(_, body)| {
                let to_center = body.pose.position - ray.origin;
                let along = to_center.dot(&ray.direction);
                let radius = body.desc.shape.bounding_radius();
                along + radius >= 0.0 && along - radius <= max_distance
            })
            .filter_map(|(handle, body)| {
                let hit = body.desc.shape.intersect_ray(&body.pose, ray)?;
                (hit.distance <= max_distance).then_some(RayHit {
                    body: handle,
                    distance: hit.distance,
                    point: hit.point,
                    normal: hit.normal,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
