//! # Renderer Resource Registry
//!
//! Five flat tables keyed by generation-checked ids. Scene nodes hold ids,
//! never records; the draw side reads the tables without knowing anything
//! about the tree.
//!
//! An id is valid between its `create_*` call and the matching `destroy_*`.
//! Slots are recycled, but a recycled slot gets a new generation, so an old
//! copy of the id keeps failing. Ids also carry the [`RegistryTag`] of the
//! registry that issued them and resolve nowhere else.

use super::resources::{
    Light, LightDesc, LightId, LightKey, LightProperty, Material, MaterialDesc, MaterialId,
    MaterialKey, MaterialProperty, Mesh, MeshDesc, MeshId, MeshInstance, MeshInstanceId,
    MeshInstanceKey, MeshKey, RegistryTag, ResourceId, ResourceKind, VertexBuffer,
    VertexBufferId, VertexBufferKey,
};
use crate::core::config::RenderConfig;
use crate::foundation::math::Mat4;
use slotmap::{Key, KeyData, SlotMap};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The id was destroyed, never issued, or belongs to another registry
    #[error("Stale {kind} id {id:?}")]
    StaleId {
        /// Table the id was looked up in
        kind: ResourceKind,
        /// Raw key
        id: KeyData,
    },

    /// The resource is still referenced by other records
    #[error("Cannot destroy {kind} {id:?}: still referenced by {users} record(s)")]
    InUse {
        /// Table of the resource
        kind: ResourceKind,
        /// Raw key
        id: KeyData,
        /// Number of referencing records
        users: usize,
    },

    /// The default material lives as long as the registry
    #[error("The default material cannot be destroyed")]
    DefaultMaterial,

    /// Vertex data was empty
    #[error("Vertex buffer has no vertices")]
    EmptyVertexBuffer,

    /// Vertex data length does not divide into whole vertices
    #[error("Vertex data length {len} is not a multiple of stride {stride}")]
    MisalignedVertexData {
        /// Byte length supplied
        len: usize,
        /// Bytes per vertex
        stride: usize,
    },

    /// Mesh draw range outside its vertex buffer
    #[error("Draw range {first}+{count} exceeds {vertex_count} vertices")]
    InvalidRange {
        /// First vertex
        first: u32,
        /// Vertex count
        count: u32,
        /// Vertices in the buffer
        vertex_count: u32,
    },

    /// A capped table is full
    #[error("{kind} table is full (capacity {capacity})")]
    CapacityExceeded {
        /// Table that is full
        kind: ResourceKind,
        /// Configured capacity
        capacity: usize,
    },
}

impl RegistryError {
    fn stale<K: Key>(kind: ResourceKind, id: ResourceId<K>) -> Self {
        Self::StaleId { kind, id: id.data() }
    }

    /// Whether this error is a programming error rather than a resource failure
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::StaleId { .. } | Self::InUse { .. } | Self::DefaultMaterial)
    }
}

/// Result alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Flat tables of renderer resources
pub struct RenderRegistry {
    tag: RegistryTag,
    vertex_buffers: SlotMap<VertexBufferKey, VertexBuffer>,
    meshes: SlotMap<MeshKey, Mesh>,
    materials: SlotMap<MaterialKey, Material>,
    instances: SlotMap<MeshInstanceKey, MeshInstance>,
    lights: SlotMap<LightKey, Light>,
    default_material: MaterialId,
    max_lights: usize,
}

impl Default for RenderRegistry {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}

impl RenderRegistry {
    /// Create an empty registry holding only the default material
    pub fn new(config: &RenderConfig) -> Self {
        let tag = RegistryTag::next();
        let mut materials = SlotMap::with_key();
        let default_key = materials.insert(Material {
            desc: MaterialDesc {
                name: "default".to_string(),
                base_color: config.default_base_color,
                ..Default::default()
            },
            generation: 0,
        });

        Self {
            tag,
            vertex_buffers: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            materials,
            instances: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            default_material: ResourceId::new(default_key, tag),
            max_lights: config.max_lights,
        }
    }

    /// Identity stamped into every id this registry issues
    pub fn tag(&self) -> RegistryTag {
        self.tag
    }

    fn issue<K: Key>(&self, key: K) -> ResourceId<K> {
        ResourceId::new(key, self.tag)
    }

    fn local<K: Key>(&self, id: ResourceId<K>) -> Option<K> {
        id.key_in(self.tag)
    }

    // ----------------------------------------------------------------------
    // Vertex buffers
    // ----------------------------------------------------------------------

    /// Upload typed vertices
    pub fn create_vertex_buffer<V: bytemuck::Pod>(
        &mut self,
        vertices: &[V],
    ) -> RegistryResult<VertexBufferId> {
        let data = bytemuck::cast_slice::<V, u8>(vertices).to_vec();
        self.create_vertex_buffer_raw(data, std::mem::size_of::<V>())
    }

    /// Upload raw interleaved bytes with a given stride
    pub fn create_vertex_buffer_raw(
        &mut self,
        data: Vec<u8>,
        stride: usize,
    ) -> RegistryResult<VertexBufferId> {
        if data.is_empty() || stride == 0 {
            return Err(RegistryError::EmptyVertexBuffer);
        }
        if data.len() % stride != 0 {
            return Err(RegistryError::MisalignedVertexData { len: data.len(), stride });
        }
        let vertex_count = u32::try_from(data.len() / stride)
            .map_err(|_| RegistryError::MisalignedVertexData { len: data.len(), stride })?;

        let key = self.vertex_buffers.insert(VertexBuffer { data, stride, vertex_count });
        let id = self.issue(key);
        log::debug!("Created vertex buffer {:?} ({} vertices)", id, vertex_count);
        Ok(id)
    }

    /// Destroy a vertex buffer no mesh reads from
    pub fn destroy_vertex_buffer(&mut self, id: VertexBufferId) -> RegistryResult<()> {
        let key = self
            .local(id)
            .filter(|key| self.vertex_buffers.contains_key(*key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::VertexBuffer, id))?;
        let users = self.meshes.values().filter(|mesh| mesh.vertex_buffer == id).count();
        if users > 0 {
            return Err(RegistryError::InUse { kind: ResourceKind::VertexBuffer, id: id.data(), users });
        }
        self.vertex_buffers.remove(key);
        log::debug!("Destroyed vertex buffer {:?}", id);
        Ok(())
    }

    /// Look up a vertex buffer
    pub fn get_vertex_buffer(&self, id: VertexBufferId) -> Option<&VertexBuffer> {
        self.local(id).and_then(|key| self.vertex_buffers.get(key))
    }

    /// Number of live vertex buffers
    pub fn vertex_buffer_count(&self) -> usize {
        self.vertex_buffers.len()
    }

    // ----------------------------------------------------------------------
    // Meshes
    // ----------------------------------------------------------------------

    /// Create a draw range over an existing vertex buffer
    pub fn create_mesh(&mut self, desc: MeshDesc) -> RegistryResult<MeshId> {
        let buffer = self
            .get_vertex_buffer(desc.vertex_buffer)
            .ok_or_else(|| RegistryError::stale(ResourceKind::VertexBuffer, desc.vertex_buffer))?;

        let end = desc.first.checked_add(desc.count);
        if desc.count == 0 || end.map_or(true, |end| end > buffer.vertex_count) {
            return Err(RegistryError::InvalidRange {
                first: desc.first,
                count: desc.count,
                vertex_count: buffer.vertex_count,
            });
        }
        if let Some(material) = desc.material {
            self.check_material(material)?;
        }

        let key = self.meshes.insert(Mesh::from(desc));
        let id = self.issue(key);
        log::debug!("Created mesh {:?} ({} vertices from {})", id, desc.count, desc.first);
        Ok(id)
    }

    /// Destroy a mesh no instance draws
    pub fn destroy_mesh(&mut self, id: MeshId) -> RegistryResult<()> {
        let key = self
            .local(id)
            .filter(|key| self.meshes.contains_key(*key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::Mesh, id))?;
        let users = self.mesh_users(id);
        if users > 0 {
            return Err(RegistryError::InUse { kind: ResourceKind::Mesh, id: id.data(), users });
        }
        self.meshes.remove(key);
        log::debug!("Destroyed mesh {:?}", id);
        Ok(())
    }

    /// Look up a mesh
    pub fn get_mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.local(id).and_then(|key| self.meshes.get(key))
    }

    /// Number of mesh instances drawing a mesh
    pub fn mesh_users(&self, id: MeshId) -> usize {
        self.instances.values().filter(|instance| instance.mesh == id).count()
    }

    /// Number of live meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    // ----------------------------------------------------------------------
    // Materials
    // ----------------------------------------------------------------------

    /// Create a material
    pub fn create_material(&mut self, desc: MaterialDesc) -> MaterialId {
        let name = desc.name.clone();
        let key = self.materials.insert(Material { desc, generation: 0 });
        let id = self.issue(key);
        log::debug!("Created material {:?} '{}'", id, name);
        id
    }

    /// Destroy a material
    ///
    /// Meshes and instances still naming it fall back to the default material
    /// when drawn.
    pub fn destroy_material(&mut self, id: MaterialId) -> RegistryResult<()> {
        if id == self.default_material {
            return Err(RegistryError::DefaultMaterial);
        }
        self.local(id)
            .and_then(|key| self.materials.remove(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::Material, id))?;
        log::debug!("Destroyed material {:?}", id);
        Ok(())
    }

    /// Look up a material
    pub fn get_material(&self, id: MaterialId) -> Option<&Material> {
        self.local(id).and_then(|key| self.materials.get(key))
    }

    /// Update one material property and bump its generation
    pub fn set_material_property(
        &mut self,
        id: MaterialId,
        property: MaterialProperty,
    ) -> RegistryResult<()> {
        let key = self.local(id);
        let material = key
            .and_then(|key| self.materials.get_mut(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::Material, id))?;
        material.apply(property);
        log::trace!("Material {:?} now at generation {}", id, material.generation);
        Ok(())
    }

    /// The material used when nothing else resolves
    pub fn default_material(&self) -> MaterialId {
        self.default_material
    }

    /// Number of live materials, including the default
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    fn check_material(&self, id: MaterialId) -> RegistryResult<()> {
        if self.get_material(id).is_some() {
            Ok(())
        } else {
            Err(RegistryError::stale(ResourceKind::Material, id))
        }
    }

    // ----------------------------------------------------------------------
    // Mesh instances
    // ----------------------------------------------------------------------

    /// Place a mesh; the instance has no transform until the first push
    pub fn create_mesh_instance(
        &mut self,
        mesh: MeshId,
        material_override: Option<MaterialId>,
    ) -> RegistryResult<MeshInstanceId> {
        if self.get_mesh(mesh).is_none() {
            return Err(RegistryError::stale(ResourceKind::Mesh, mesh));
        }
        if let Some(material) = material_override {
            self.check_material(material)?;
        }
        let key = self.instances.insert(MeshInstance {
            mesh,
            material_override,
            world: None,
            visible: true,
        });
        let id = self.issue(key);
        log::trace!("Created mesh instance {:?} of mesh {:?}", id, mesh);
        Ok(id)
    }

    /// Remove a mesh instance
    pub fn destroy_mesh_instance(&mut self, id: MeshInstanceId) -> RegistryResult<()> {
        self.local(id)
            .and_then(|key| self.instances.remove(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::MeshInstance, id))?;
        log::trace!("Destroyed mesh instance {:?}", id);
        Ok(())
    }

    /// Look up a mesh instance
    pub fn get_mesh_instance(&self, id: MeshInstanceId) -> Option<&MeshInstance> {
        self.local(id).and_then(|key| self.instances.get(key))
    }

    fn instance_mut(&mut self, id: MeshInstanceId) -> RegistryResult<&mut MeshInstance> {
        let key = self.local(id);
        key.and_then(|key| self.instances.get_mut(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::MeshInstance, id))
    }

    /// Store the world transform the owning node computed this frame
    pub fn set_instance_transform(&mut self, id: MeshInstanceId, world: Mat4) -> RegistryResult<()> {
        self.instance_mut(id)?.world = Some(world);
        Ok(())
    }

    /// Replace (or clear) the material override
    pub fn set_instance_material(
        &mut self,
        id: MeshInstanceId,
        material: Option<MaterialId>,
    ) -> RegistryResult<()> {
        if let Some(material) = material {
            self.check_material(material)?;
        }
        self.instance_mut(id)?.material_override = material;
        Ok(())
    }

    /// Show or hide an instance
    pub fn set_instance_visible(&mut self, id: MeshInstanceId, visible: bool) -> RegistryResult<()> {
        self.instance_mut(id)?.visible = visible;
        Ok(())
    }

    /// Material an instance draws with: live override, then the mesh's own, then the default
    pub fn resolve_material(&self, instance: &MeshInstance) -> MaterialId {
        instance
            .material_override
            .filter(|id| self.get_material(*id).is_some())
            .or_else(|| {
                self.get_mesh(instance.mesh)
                    .and_then(|mesh| mesh.material)
                    .filter(|id| self.get_material(*id).is_some())
            })
            .unwrap_or(self.default_material)
    }

    /// Iterate over all mesh instances
    pub fn mesh_instances(&self) -> impl Iterator<Item = (MeshInstanceId, &MeshInstance)> {
        let tag = self.tag;
        self.instances.iter().map(move |(key, instance)| (ResourceId::new(key, tag), instance))
    }

    /// Number of live mesh instances
    pub fn mesh_instance_count(&self) -> usize {
        self.instances.len()
    }

    // ----------------------------------------------------------------------
    // Lights
    // ----------------------------------------------------------------------

    /// Create a light, failing once the configured light budget is used
    pub fn create_light(&mut self, desc: LightDesc) -> RegistryResult<LightId> {
        if self.lights.len() >= self.max_lights {
            return Err(RegistryError::CapacityExceeded {
                kind: ResourceKind::Light,
                capacity: self.max_lights,
            });
        }
        let key = self.lights.insert(Light::from(desc));
        let id = self.issue(key);
        log::trace!("Created light {:?}", id);
        Ok(id)
    }

    /// Remove a light
    pub fn destroy_light(&mut self, id: LightId) -> RegistryResult<()> {
        self.local(id)
            .and_then(|key| self.lights.remove(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::Light, id))?;
        log::trace!("Destroyed light {:?}", id);
        Ok(())
    }

    /// Look up a light
    pub fn get_light(&self, id: LightId) -> Option<&Light> {
        self.local(id).and_then(|key| self.lights.get(key))
    }

    fn light_mut(&mut self, id: LightId) -> RegistryResult<&mut Light> {
        let key = self.local(id);
        key.and_then(|key| self.lights.get_mut(key))
            .ok_or_else(|| RegistryError::stale(ResourceKind::Light, id))
    }

    /// Store the world transform the owning node computed this frame
    pub fn set_light_transform(&mut self, id: LightId, world: Mat4) -> RegistryResult<()> {
        self.light_mut(id)?.world = Some(world);
        Ok(())
    }

    /// Update one light property
    pub fn set_light_property(&mut self, id: LightId, property: LightProperty) -> RegistryResult<()> {
        self.light_mut(id)?.apply(property);
        Ok(())
    }

    /// Iterate over all lights
    pub fn lights(&self) -> impl Iterator<Item = (LightId, &Light)> {
        let tag = self.tag;
        self.lights.iter().map(move |(key, light)| (ResourceId::new(key, tag), light))
    }

    /// Number of live lights
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}
