//! Node-to-body synchronization
//!
//! The bridge owns the physics backend and links each body to the scene node
//! it drives. It steps the backend with a fixed timestep, keeps the pose
//! before and after the latest step, and writes the blend of the two into
//! the node transforms once per frame.
//!
//! Bodies are simulated in world space: a body node's local transform is its
//! world transform.

use super::collision::{CollisionLayers, Ray};
use super::world::{BodyDesc, BodyHandle, PhysicsBackend, PhysicsError, SimplePhysicsWorld};
use crate::core::config::PhysicsConfig;
use crate::foundation::math::{Transform, Vec3};
use crate::scene::{Node, WeakNode};
use slotmap::SecondaryMap;

struct BodyLink {
    previous: Transform,
    current: Transform,
    node: WeakNode,
}

/// Ray query result resolved to a scene node
#[derive(Debug, Clone)]
pub struct SceneRayHit {
    /// Node owning the body that was hit
    pub node: Node,
    /// Body that was hit
    pub body: BodyHandle,
    /// World-space hit point
    pub point: Vec3,
    /// World-space surface normal
    pub normal: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

/// Fixed-timestep driver and node synchronizer for a physics backend
pub struct PhysicsBridge {
    backend: Box<dyn PhysicsBackend>,
    links: SecondaryMap<BodyHandle, BodyLink>,
    fixed_timestep: f32,
    max_substeps: u32,
    accumulator: f32,
    steps_taken: u64,
}

impl PhysicsBridge {
    /// Bridge over the built-in [`SimplePhysicsWorld`]
    pub fn new(config: &PhysicsConfig) -> Self {
        Self::with_backend(config, Box::new(SimplePhysicsWorld::from_config(config)))
    }

    /// Bridge over any backend
    pub fn with_backend(config: &PhysicsConfig, backend: Box<dyn PhysicsBackend>) -> Self {
        let fixed_timestep = if config.fixed_timestep.is_finite() && config.fixed_timestep > 0.0 {
            config.fixed_timestep
        } else {
            log::warn!(
                "Invalid fixed timestep {}, falling back to 1/60",
                config.fixed_timestep
            );
            1.0 / 60.0
        };
        Self {
            backend,
            links: SecondaryMap::new(),
            fixed_timestep,
            max_substeps: config.max_substeps.max(1),
            accumulator: 0.0,
            steps_taken: 0,
        }
    }

    /// Create a body for `node`, starting at `pose`
    pub fn create_body(
        &mut self,
        desc: &BodyDesc,
        pose: &Transform,
        node: &Node,
    ) -> Result<BodyHandle, PhysicsError> {
        let handle = self.backend.create_body(desc, *pose)?;
        self.links.insert(
            handle,
            BodyLink { previous: *pose, current: *pose, node: node.downgrade() },
        );
        log::debug!("Linked body {:?} to node '{}'", handle, node.name());
        Ok(handle)
    }

    /// Destroy a body and forget its node link
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        self.links.remove(handle);
        self.backend.destroy_body(handle)
    }

    /// Feed frame time into the accumulator and run the fixed steps it pays for
    ///
    /// Returns the number of steps taken. At most `max_substeps` run per call;
    /// whole steps beyond that are dropped.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if !frame_dt.is_finite() || frame_dt < 0.0 {
            log::warn!("Ignoring invalid physics frame delta {}", frame_dt);
            return 0;
        }

        self.accumulator += frame_dt;
        let mut steps = 0;
        while self.accumulator >= self.fixed_timestep && steps < self.max_substeps {
            for (_, link) in &mut self.links {
                link.previous = link.current;
            }
            self.backend.step(self.fixed_timestep);
            for (handle, link) in &mut self.links {
                if let Some(pose) = self.backend.pose(handle) {
                    link.current = pose;
                }
            }
            self.accumulator -= self.fixed_timestep;
            steps += 1;
        }

        if self.accumulator >= self.fixed_timestep {
            let dropped = (self.accumulator / self.fixed_timestep).floor();
            log::warn!(
                "Physics fell behind: dropping {} step(s) after {} sub-steps",
                dropped,
                self.max_substeps
            );
            self.accumulator %= self.fixed_timestep;
        }

        self.steps_taken += u64::from(steps);
        steps
    }

    /// Blend factor in [0, 1) between the previous and current step
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.fixed_timestep).clamp(0.0, 1.0)
    }

    /// Blend of the body's pose before and after the latest step
    pub fn interpolated(&self, handle: BodyHandle) -> Option<Transform> {
        let alpha = self.alpha();
        self.links
            .get(handle)
            .map(|link| link.previous.lerp(&link.current, alpha))
    }

    /// Write interpolated poses into the linked nodes
    ///
    /// Node scale is kept. Bodies whose node has been dropped without being
    /// destroyed are reclaimed. Returns the number of nodes written.
    pub fn sync_nodes(&mut self) -> usize {
        let alpha = self.alpha();
        let mut written = 0;
        let mut orphans = Vec::new();

        for (handle, link) in &self.links {
            match link.node.upgrade() {
                Some(node) => {
                    let pose = link.previous.lerp(&link.current, alpha);
                    node.apply_body_pose(pose.position, pose.rotation);
                    written += 1;
                }
                None => orphans.push(handle),
            }
        }

        for handle in orphans {
            log::warn!("Reclaiming body {:?}: its node was dropped without destroy()", handle);
            self.links.remove(handle);
            if let Err(err) = self.backend.destroy_body(handle) {
                log::warn!("Backend refused to drop orphaned body {:?}: {}", handle, err);
            }
        }
        written
    }

    /// Move a body instantly, without blending from its old pose
    pub fn teleport(&mut self, handle: BodyHandle, pose: Transform) -> Result<(), PhysicsError> {
        let link = self.links.get_mut(handle).ok_or(PhysicsError::InvalidHandle(handle))?;
        self.backend.set_pose(handle, pose)?;
        link.previous = pose;
        link.current = pose;
        Ok(())
    }

    /// Current linear velocity
    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.backend.linear_velocity(handle)
    }

    /// Override linear velocity
    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        self.backend.set_linear_velocity(handle, velocity)
    }

    /// Apply an instantaneous impulse
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError> {
        self.backend.apply_impulse(handle, impulse)
    }

    /// First node hit by a ray on any layer, or `None`
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<SceneRayHit> {
        self.raycast_filtered(origin, direction, max_distance, CollisionLayers::all())
    }

    /// First node hit by a ray on `mask` layers, or `None`
    pub fn raycast_filtered(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Option<SceneRayHit> {
        let ray = Ray::new(origin, direction)?;
        let hit = self.backend.raycast(&ray, max_distance, mask)?;
        let node = self.links.get(hit.body)?.node.upgrade()?;
        Some(SceneRayHit {
            node,
            body: hit.body,
            point: hit.point,
            normal: hit.normal,
            distance: hit.distance,
        })
    }

    /// Node driven by a body
    pub fn node_of(&self, handle: BodyHandle) -> Option<Node> {
        self.links.get(handle).and_then(|link| link.node.upgrade())
    }

    /// Simulation step length
    pub fn fixed_timestep(&self) -> f32 {
        self.fixed_timestep
    }

    /// Total fixed steps run so far
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.backend.body_count()
    }
}
