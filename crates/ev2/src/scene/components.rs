//! Built-in node components
//!
//! A node carries any combination of render instances, a light, a camera and
//! a physics body. The registry and physics ids are owned by the node and
//! released when it is destroyed.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::physics::BodyHandle;
use crate::render::{LightId, MeshInstanceId};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// What a node can do, derived from the components it carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Owns at least one mesh instance
        const RENDER = 1 << 0;
        /// Owns a light
        const LIGHT = 1 << 1;
        /// Carries a camera
        const CAMERA = 1 << 2;
        /// Driven by a physics body
        const BODY = 1 << 3;
        /// Has a user behaviour
        const BEHAVIOUR = 1 << 4;
    }
}

/// Projection model of a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Perspective with a vertical field of view in radians
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
    },
    /// Orthographic with a fixed view height in world units
    Orthographic {
        /// Visible height in world units
        height: f32,
    },
}

/// Camera component
///
/// The camera looks down its node's -Z axis; the view matrix is the inverse
/// of the node's world matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Projection model
    pub projection: Projection,
    /// Distance to near clipping plane
    pub near: f32,
    /// Distance to far clipping plane
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Perspective camera from a vertical field of view in degrees
    pub fn perspective(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective { fov_y: fov_degrees.to_radians() },
            near,
            far,
        }
    }

    /// Orthographic camera showing `height` world units vertically
    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Self { projection: Projection::Orthographic { height }, near, far }
    }

    /// Projection matrix for a viewport aspect ratio (width / height)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::perspective(fov_y, aspect, self.near, self.far),
            Projection::Orthographic { height } => Mat4::orthographic(height, aspect, self.near, self.far),
        }
    }
}

/// View and projection of the active camera for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// Camera world position
    pub position: Vec3,
}

/// Ids and values a node owns
#[derive(Debug, Clone, Default)]
pub(crate) struct Components {
    pub(crate) instances: Vec<MeshInstanceId>,
    pub(crate) light: Option<LightId>,
    pub(crate) camera: Option<Camera>,
    pub(crate) body: Option<BodyHandle>,
}

impl Components {
    pub(crate) fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::RENDER, !self.instances.is_empty());
        caps.set(Capabilities::LIGHT, self.light.is_some());
        caps.set(Capabilities::CAMERA, self.camera.is_some());
        caps.set(Capabilities::BODY, self.body.is_some());
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_projection_maps_near_plane_to_minus_one() {
        let camera = Camera::perspective(90.0, 1.0, 100.0);
        let projection = camera.projection_matrix(1.0);
        let clip = projection * nalgebra::Vector4::new(0.0, 0.0, -1.0, 1.0);
        assert_relative_eq!(clip.z / clip.w, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_capabilities_follow_components() {
        let mut components = Components::default();
        assert!(components.capabilities().is_empty());
        components.camera = Some(Camera::default());
        assert_eq!(components.capabilities(), Capabilities::CAMERA);
    }
}
