//! CPU-side model data
//!
//! A [`Model`] is an unindexed triangle list split into sub-meshes, each a
//! contiguous vertex range drawn with one of the model's material slots.
//! Models are uploaded to the [`RenderRegistry`](crate::render::RenderRegistry)
//! through the [`ResourceManager`](super::ResourceManager).

use super::AssetError;
use crate::foundation::math::{Vec3, AABB};
use std::f32::consts::PI;
use crate::render::MaterialDesc;
use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout uploaded to vertex buffers
///
/// 32 bytes, tightly packed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],

    /// Unit normal
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, normal, tex_coord }
    }
}

/// A vertex range of a model drawn with one material slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMesh {
    /// First vertex
    pub first: u32,
    /// Number of vertices, a multiple of three
    pub count: u32,
    /// Index into [`Model::materials`]
    pub material_slot: usize,
}

/// Geometry and surface descriptions of one asset
#[derive(Debug, Clone)]
pub struct Model {
    /// Name the resource manager registers the model under
    pub name: String,
    /// Object-space bounds of all vertices
    pub bounds: AABB,
    /// Triangle list
    pub vertices: Vec<Vertex>,
    /// Draw ranges
    pub submeshes: Vec<SubMesh>,
    /// Material slots referenced by sub-meshes
    pub materials: Vec<MaterialDesc>,
}

impl Model {
    /// Build a model with a single sub-mesh covering every vertex
    pub fn single(name: impl Into<String>, vertices: Vec<Vertex>, material: MaterialDesc) -> Self {
        let count = u32::try_from(vertices.len()).unwrap_or(u32::MAX);
        let bounds = bounds_of(&vertices);
        Self {
            name: name.into(),
            bounds,
            vertices,
            submeshes: vec![SubMesh { first: 0, count, material_slot: 0 }],
            materials: vec![material],
        }
    }

    /// Check that the model can be uploaded
    ///
    /// Material slots past the end of [`Model::materials`] are accepted; the
    /// resource manager substitutes the default material for them.
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.vertices.is_empty() {
            return Err(self.invalid("model has no vertices"));
        }
        if self.submeshes.is_empty() {
            return Err(self.invalid("model has no sub-meshes"));
        }

        let vertex_count = self.vertices.len();
        for (index, submesh) in self.submeshes.iter().enumerate() {
            if submesh.count == 0 || submesh.count % 3 != 0 {
                return Err(self.invalid(&format!(
                    "sub-mesh {} draws {} vertices, not a whole number of triangles",
                    index, submesh.count
                )));
            }
            let end = submesh.first as usize + submesh.count as usize;
            if end > vertex_count {
                return Err(self.invalid(&format!(
                    "sub-mesh {} ends at vertex {} of {}",
                    index, end, vertex_count
                )));
            }
        }

        let finite = self
            .vertices
            .iter()
            .all(|v| v.position.iter().chain(v.normal.iter()).all(|c| c.is_finite()));
        if !finite {
            return Err(self.invalid("vertex data contains NaN or infinity"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> AssetError {
        AssetError::InvalidData { name: self.name.clone(), reason: reason.to_string() }
    }

    /// Unit cube centered at the origin, spanning ±`half_extent` on each axis
    ///
    /// Each face has its own four corners so normals stay flat.
    pub fn cube(name: impl Into<String>, half_extent: f32, material: MaterialDesc) -> Self {
        let h = half_extent;
        // (normal, tangent u, tangent v) per face, counter-clockwise seen from outside
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut vertices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let n = Vec3::from(normal);
            let u = Vec3::from(u);
            let v = Vec3::from(v);
            let corner = |su: f32, sv: f32| {
                let p = (n + u * su + v * sv) * h;
                Vertex::new(p.into(), normal, [(su + 1.0) * 0.5, (sv + 1.0) * 0.5])
            };
            let quad = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)];
            vertices.extend([quad[0], quad[1], quad[2], quad[2], quad[3], quad[0]]);
        }

        Self::single(name, vertices, material)
    }

    /// UV sphere of `radius` with `segments` around and `rings` from pole to pole
    pub fn uv_sphere(
        name: impl Into<String>,
        radius: f32,
        segments: u32,
        rings: u32,
        material: MaterialDesc,
    ) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);

        let point = |ring: u32, segment: u32| {
            let v = ring as f32 / rings as f32;
            let u = segment as f32 / segments as f32;
            let theta = v * PI;
            let phi = u * 2.0 * PI;
            let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), -theta.sin() * phi.sin());
            Vertex::new((normal * radius).into(), normal.into(), [u, v])
        };

        let mut vertices = Vec::with_capacity((segments * rings * 6) as usize);
        for ring in 0..rings {
            for segment in 0..segments {
                let a = point(ring, segment);
                let b = point(ring + 1, segment);
                let c = point(ring + 1, segment + 1);
                let d = point(ring, segment + 1);
                // Degenerate triangles at the poles are skipped
                if ring != 0 {
                    vertices.extend([a, b, d]);
                }
                if ring != rings - 1 {
                    vertices.extend([b, c, d]);
                }
            }
        }

        Self::single(name, vertices, material)
    }

    /// Number of triangles across all sub-meshes
    pub fn triangle_count(&self) -> u32 {
        self.submeshes.iter().map(|s| s.count / 3).sum()
    }
}

fn bounds_of(vertices: &[Vertex]) -> AABB {
    AABB::from_points(vertices.iter().map(|v| Vec3::from(v.position))).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grey() -> MaterialDesc {
        MaterialDesc::colored("grey", [0.5, 0.5, 0.5, 1.0])
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_cube_has_flat_outward_faces() {
        let cube = Model::cube("cube", 1.0, grey());
        assert!(cube.validate().is_ok());
        assert_eq!(cube.vertices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert_relative_eq!(cube.bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_relative_eq!(cube.bounds.max, Vec3::new(1.0, 1.0, 1.0));

        for triangle in cube.vertices.chunks(3) {
            let p: Vec<Vec3> = triangle.iter().map(|v| Vec3::from(v.position)).collect();
            let face_normal = (p[1] - p[0]).cross(&(p[2] - p[0])).normalize();
            assert_relative_eq!(face_normal, Vec3::from(triangle[0].normal), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sphere_vertices_lie_on_radius() {
        let sphere = Model::uv_sphere("ball", 2.0, 12, 8, grey());
        assert!(sphere.validate().is_ok());
        for vertex in &sphere.vertices {
            assert_relative_eq!(Vec3::from(vertex.position).norm(), 2.0, epsilon = 1e-4);
        }
        // Two triangles per quad, one per quad on each polar ring
        assert_eq!(sphere.triangle_count(), 12 * (2 * 8 - 2));
    }

    #[test]
    fn test_validate_rejects_out_of_range_submesh() {
        let mut model = Model::cube("broken", 1.0, grey());
        model.submeshes.push(SubMesh { first: 30, count: 12, material_slot: 0 });
        assert!(matches!(model.validate(), Err(AssetError::InvalidData { .. })));

        model.submeshes.pop();
        model.submeshes[0].count = 35;
        assert!(matches!(model.validate(), Err(AssetError::InvalidData { .. })));
    }
}
