//! Physics module: backend seam, ray queries and the scene bridge

pub mod bridge;
pub mod collision;
pub mod world;

pub use bridge::{PhysicsBridge, SceneRayHit};
pub use collision::{ColliderShape, CollisionLayers, Ray, ShapeHit};
pub use world::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError, RayHit, SimplePhysicsWorld};
