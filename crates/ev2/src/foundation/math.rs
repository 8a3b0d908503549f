//! Math types shared by the scene, physics and render sides
//!
//! Everything is `f32` nalgebra. A [`Transform`] is the local TRS of a node;
//! its matrix is `T * R * S`, so a child's world matrix is simply
//! `parent_world * child_local`.

pub use nalgebra::{Quaternion, Unit, Vector2, Vector3, Vector4, Matrix4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion rotation
pub type Quat = Unit<Quaternion<f32>>;

/// Position, rotation and scale of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation
    pub position: Vec3,
    /// Rotation
    pub rotation: Quat,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::repeat(1.0),
        }
    }
}

impl Transform {
    /// No translation, no rotation, unit scale
    pub fn identity() -> Self {
        Self::default()
    }

    /// Translation only
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    /// Translation and rotation, unit scale
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation, ..Self::default() }
    }

    /// Replace the translation
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Replace the rotation
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Replace the rotation with `angle` radians about `axis` (need not be normalized)
    #[must_use]
    pub fn with_rotation_axis_angle(mut self, axis: Vec3, angle: f32) -> Self {
        self.rotation = Quat::from_axis_angle(&Unit::new_normalize(axis), angle);
        self
    }

    /// Replace the scale
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the scale with the same factor on every axis
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::repeat(scale);
        self
    }

    /// `T * R * S`
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Blend towards `other`; `t = 0` is `self`, `t = 1` is `other`
    ///
    /// Rotation is slerped, falling back to nlerp for opposite rotations.
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, t, 1.0e-6)
            .unwrap_or_else(|| self.rotation.nlerp(&other.rotation, t));
        Transform {
            position: self.position.lerp(&other.position, t),
            rotation,
            scale: self.scale.lerp(&other.scale, t),
        }
    }

    /// Move by `offset` in parent space
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Rotate further, in parent space
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = rotation * self.rotation;
    }
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AABB {
    /// Smallest corner
    pub min: Vec3,
    /// Largest corner
    pub max: Vec3,
}

impl AABB {
    /// Box spanning `min` to `max`
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points, `None` for an empty iterator
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)));
        Some(Self { min, max })
    }

    /// Midpoint
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half size along each axis
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Box enclosing this box's eight corners after `matrix`
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let corners = (0..8).map(|i| {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            matrix.transform_point(&corner).coords
        });
        Self::from_points(corners).unwrap_or(*self)
    }
}

/// Projection and decomposition helpers on [`Mat4`]
pub trait Mat4Ext {
    /// Right-handed perspective projection, OpenGL clip space (depth in [-1, 1])
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed orthographic projection of a view `height` units tall
    fn orthographic(height: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Translation stored in the last column
    fn translation_part(&self) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        nalgebra::Perspective3::new(aspect, fov_y, near, far).to_homogeneous()
    }

    fn orthographic(height: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let half_h = height * 0.5;
        let half_w = half_h * aspect;
        nalgebra::Orthographic3::new(-half_w, half_w, -half_h, half_h, near, far).to_homogeneous()
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_to_matrix_scales_then_rotates_then_translates() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation_axis_angle(Vec3::y(), FRAC_PI_2)
            .with_uniform_scale(2.0);

        // +X scaled to 2, turned a quarter about Y onto -Z, then offset
        let moved = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(moved.coords, Vec3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_lerp_endpoints_and_midpoint() {
        let a = Transform::from_position(Vec3::zeros());
        let b = Transform::from_position(Vec3::new(2.0, 4.0, -6.0))
            .with_rotation_axis_angle(Vec3::y(), FRAC_PI_2)
            .with_uniform_scale(3.0);

        assert_relative_eq!(a.lerp(&b, 0.0).to_matrix(), a.to_matrix(), epsilon = 1e-6);
        assert_relative_eq!(a.lerp(&b, 1.0).to_matrix(), b.to_matrix(), epsilon = 1e-5);

        let mid = a.lerp(&b, 0.5);
        assert_relative_eq!(mid.position, Vec3::new(1.0, 2.0, -3.0), epsilon = 1e-6);
        assert_relative_eq!(mid.rotation.angle(), FRAC_PI_2 * 0.5, epsilon = 1e-5);
        assert_relative_eq!(mid.scale, Vec3::repeat(2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rotate_applies_in_parent_space() {
        let mut transform = Transform::identity().with_rotation_axis_angle(Vec3::x(), FRAC_PI_2);
        transform.rotate(Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2));
        // Local +Y goes to +Z under the first turn, then to +X under the second
        let up = transform.rotation * Vec3::y();
        assert_relative_eq!(up, Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_aabb_from_points() {
        let points = [Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 2.0), Vec3::zeros()];
        let aabb = AABB::from_points(points).unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 2.0));
        assert_relative_eq!(aabb.center(), Vec3::new(0.0, 0.5, 1.0));
        assert!(AABB::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_aabb_transformed_encloses_rotated_box() {
        let aabb = AABB::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        let matrix = Transform::from_position(Vec3::new(5.0, 0.0, 0.0))
            .with_rotation_axis_angle(Vec3::y(), std::f32::consts::FRAC_PI_4)
            .to_matrix();
        let moved = aabb.transformed(&matrix);
        assert_relative_eq!(moved.center(), Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(moved.half_extents().x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(moved.half_extents().y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_translation_part() {
        let matrix = Transform::from_position(Vec3::new(4.0, -1.0, 2.5)).with_uniform_scale(3.0).to_matrix();
        assert_eq!(matrix.translation_part(), Vec3::new(4.0, -1.0, 2.5));
    }
}
