//! Records stored in the render registry tables
//!
//! Every record is plain data. GPU-side objects are owned by the backend and
//! derived from these records; nothing here talks to a graphics API.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4, AABB};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, Key, KeyData};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

new_key_type! {
    /// Slot of a vertex buffer
    pub struct VertexBufferKey;
    /// Slot of a mesh
    pub struct MeshKey;
    /// Slot of a material
    pub struct MaterialKey;
    /// Slot of a mesh instance
    pub struct MeshInstanceKey;
    /// Slot of a light
    pub struct LightKey;
}

/// Identity of one registry; ids only resolve in the registry that issued them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryTag(u32);

impl RegistryTag {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Generation-checked slot plus the tag of the registry that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId<K> {
    key: K,
    registry: RegistryTag,
}

impl<K: Key> ResourceId<K> {
    pub(crate) fn new(key: K, registry: RegistryTag) -> Self {
        Self { key, registry }
    }

    /// Slot in `registry`, `None` when another registry issued this id
    pub(crate) fn key_in(self, registry: RegistryTag) -> Option<K> {
        (self.registry == registry).then_some(self.key)
    }

    /// Raw slot and generation, for error reports
    pub fn data(&self) -> KeyData {
        self.key.data()
    }

    /// Registry that issued the id
    pub fn registry(&self) -> RegistryTag {
        self.registry
    }
}

/// Id of an interleaved vertex buffer
pub type VertexBufferId = ResourceId<VertexBufferKey>;
/// Id of a mesh (a draw range within a vertex buffer)
pub type MeshId = ResourceId<MeshKey>;
/// Id of a material
pub type MaterialId = ResourceId<MaterialKey>;
/// Id of a placed mesh instance
pub type MeshInstanceId = ResourceId<MeshInstanceKey>;
/// Id of a light
pub type LightId = ResourceId<LightKey>;

/// The five resource families held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Vertex buffer table
    VertexBuffer,
    /// Mesh table
    Mesh,
    /// Material table
    Material,
    /// Mesh instance table
    MeshInstance,
    /// Light table
    Light,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VertexBuffer => "vertex buffer",
            Self::Mesh => "mesh",
            Self::Material => "material",
            Self::MeshInstance => "mesh instance",
            Self::Light => "light",
        };
        f.write_str(name)
    }
}

/// Raw interleaved vertex data
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    /// Vertex bytes, `stride * vertex_count` long
    pub data: Vec<u8>,
    /// Bytes per vertex
    pub stride: usize,
    /// Number of vertices
    pub vertex_count: u32,
}

/// Parameters for a new mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshDesc {
    /// Buffer the draw range reads from
    pub vertex_buffer: VertexBufferId,
    /// First vertex of the draw range
    pub first: u32,
    /// Number of vertices drawn
    pub count: u32,
    /// Material used when the instance has no override
    pub material: Option<MaterialId>,
    /// Object-space bounds
    pub bounds: AABB,
}

/// A draw range within a vertex buffer
#[derive(Debug, Clone, Copy)]
pub struct Mesh {
    /// Buffer the draw range reads from
    pub vertex_buffer: VertexBufferId,
    /// First vertex of the draw range
    pub first: u32,
    /// Number of vertices drawn
    pub count: u32,
    /// Material used when the instance has no override
    pub material: Option<MaterialId>,
    /// Object-space bounds
    pub bounds: AABB,
}

impl From<MeshDesc> for Mesh {
    fn from(desc: MeshDesc) -> Self {
        Self {
            vertex_buffer: desc.vertex_buffer,
            first: desc.first,
            count: desc.count,
            material: desc.material,
            bounds: desc.bounds,
        }
    }
}

/// Surface description used to create materials, also carried by models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    /// Debug name
    pub name: String,
    /// Linear RGBA base colour
    pub base_color: [f32; 4],
    /// Metallic factor in [0, 1]
    pub metallic: f32,
    /// Roughness factor in [0, 1]
    pub roughness: f32,
    /// Emitted linear RGB
    pub emissive: [f32; 3],
    /// Texture asset name, resolved by the backend
    pub texture: Option<String>,
    /// Whether the material is alpha blended
    pub transparent: bool,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0, 0.0, 0.0],
            texture: None,
            transparent: false,
        }
    }
}

impl MaterialDesc {
    /// Named opaque material with a base colour
    pub fn colored(name: impl Into<String>, base_color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            base_color,
            transparent: base_color[3] < 1.0,
            ..Default::default()
        }
    }

    /// Builder pattern: Set metallic factor
    #[must_use]
    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    /// Builder pattern: Set roughness factor
    #[must_use]
    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }
}

/// Material record
#[derive(Debug, Clone)]
pub struct Material {
    /// Surface parameters
    pub desc: MaterialDesc,
    /// Bumped on every property change; backends rebuild derived state when it moves
    pub generation: u32,
}

/// Single material property update
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    /// Linear RGBA base colour
    BaseColor([f32; 4]),
    /// Metallic factor
    Metallic(f32),
    /// Roughness factor
    Roughness(f32),
    /// Emitted linear RGB
    Emissive([f32; 3]),
    /// Texture asset name
    Texture(Option<String>),
    /// Alpha blending flag
    Transparent(bool),
}

impl Material {
    pub(crate) fn apply(&mut self, property: MaterialProperty) {
        match property {
            MaterialProperty::BaseColor(color) => self.desc.base_color = color,
            MaterialProperty::Metallic(metallic) => self.desc.metallic = metallic,
            MaterialProperty::Roughness(roughness) => self.desc.roughness = roughness,
            MaterialProperty::Emissive(emissive) => self.desc.emissive = emissive,
            MaterialProperty::Texture(texture) => self.desc.texture = texture,
            MaterialProperty::Transparent(transparent) => self.desc.transparent = transparent,
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

/// A mesh placed in the world by a scene node
#[derive(Debug, Clone, Copy)]
pub struct MeshInstance {
    /// Mesh drawn by this instance
    pub mesh: MeshId,
    /// Material replacing the mesh's own
    pub material_override: Option<MaterialId>,
    /// Last world transform pushed by the owning node, `None` before its first pre-render
    pub world: Option<Mat4>,
    /// Whether the instance is drawn
    pub visible: bool,
}

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinitely far light shining along the node's -Z axis
    Directional,
    /// Omnidirectional light at the node's position
    Point {
        /// Attenuation range
        range: f32,
    },
    /// Cone light at the node's position along its -Z axis
    Spot {
        /// Attenuation range
        range: f32,
        /// Inner cone angle in radians
        inner_angle: f32,
        /// Outer cone angle in radians
        outer_angle: f32,
    },
}

/// Parameters for a new light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDesc {
    /// Kind of light
    pub kind: LightKind,
    /// Linear RGB colour
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
}

impl LightDesc {
    /// Directional light description
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self { kind: LightKind::Directional, color, intensity }
    }

    /// Point light description
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self { kind: LightKind::Point { range }, color, intensity }
    }
}

/// Light record
#[derive(Debug, Clone, Copy)]
pub struct Light {
    /// Kind of light
    pub kind: LightKind,
    /// Linear RGB colour
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Whether the light contributes to the frame
    pub enabled: bool,
    /// Last world transform pushed by the owning node
    pub world: Option<Mat4>,
}

impl Light {
    /// World position, if a transform has been pushed
    pub fn world_position(&self) -> Option<Vec3> {
        self.world.map(|world| world.translation_part())
    }

    /// World direction (-Z of the node), if a transform has been pushed
    pub fn world_direction(&self) -> Option<Vec3> {
        self.world.map(|world| {
            let forward = world * Vec4::new(0.0, 0.0, -1.0, 0.0);
            forward.xyz().try_normalize(1.0e-6).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
        })
    }
}

impl From<LightDesc> for Light {
    fn from(desc: LightDesc) -> Self {
        Self {
            kind: desc.kind,
            color: desc.color,
            intensity: desc.intensity,
            enabled: true,
            world: None,
        }
    }
}

/// Single light property update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightProperty {
    /// Linear RGB colour
    Color(Vec3),
    /// Intensity multiplier
    Intensity(f32),
    /// Kind of light
    Kind(LightKind),
    /// Enable or disable
    Enabled(bool),
}

impl Light {
    pub(crate) fn apply(&mut self, property: LightProperty) {
        match property {
            LightProperty::Color(color) => self.color = color,
            LightProperty::Intensity(intensity) => self.intensity = intensity,
            LightProperty::Kind(kind) => self.kind = kind,
            LightProperty::Enabled(enabled) => self.enabled = enabled,
        }
    }
}
