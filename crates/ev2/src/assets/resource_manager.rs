//! Resource Manager - CPU-side model tracking and upload lifetime
//!
//! **SEPARATION OF CONCERNS**:
//! - ResourceManager: which models exist, which are uploaded, reference counts
//! - RenderRegistry: the vertex buffers, meshes and materials themselves
//! - Scene nodes: mesh instances drawing the uploaded meshes
//!
//! ```text
//! Model (CPU data, registered by name)
//!        ↓  acquire
//! ResourceManager (THIS MODULE - uploads once, refcounts)
//!        ↓
//! RenderRegistry (vertex buffer + one mesh per sub-mesh + materials)
//! ```
//!
//! The first `acquire` of a name uploads the model; later ones only bump the
//! count. The matching `release` that drops the count to zero destroys the
//! registry entries again, which fails while nodes still draw them.

use super::model::{Model, Vertex};
use crate::core::config::AssetConfig;
use crate::foundation::math::AABB;
use crate::render::{MaterialId, MeshDesc, MeshId, RegistryError, RenderRegistry, VertexBufferId};
use std::collections::HashMap;
use thiserror::Error;

/// Asset errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// No model is registered under this name
    #[error("Model '{0}' not found")]
    NotFound(String),

    /// The model data cannot be uploaded
    #[error("Model '{name}' is invalid: {reason}")]
    InvalidData {
        /// Model name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// A sub-mesh names a material slot the model does not have
    #[error("Model '{name}' has no material slot {slot}")]
    MissingMaterial {
        /// Model name
        name: String,
        /// Requested slot
        slot: usize,
    },

    /// `release` without a matching `acquire`
    #[error("Model '{0}' is not acquired")]
    NotAcquired(String),

    /// The uploaded meshes are still drawn by mesh instances
    #[error("Model '{name}' is still drawn by {users} mesh instance(s)")]
    StillInUse {
        /// Model name
        name: String,
        /// Live instances
        users: usize,
    },

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl AssetError {
    /// Whether this error is a programming error rather than a missing or bad asset
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::NotAcquired(_) | Self::StillInUse { .. } => true,
            Self::Registry(err) => err.is_contract_violation(),
            Self::NotFound(_) | Self::InvalidData { .. } | Self::MissingMaterial { .. } => false,
        }
    }
}

/// Uploaded meshes of one model, one per sub-mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    name: String,
    meshes: Vec<MeshId>,
}

impl ModelHandle {
    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mesh ids in sub-mesh order
    pub fn meshes(&self) -> &[MeshId] {
        &self.meshes
    }
}

/// Registry entries created for one model
#[derive(Debug)]
struct Upload {
    vertex_buffer: VertexBufferId,
    meshes: Vec<MeshId>,
    materials: Vec<MaterialId>,
    refs: usize,
}

/// Resource Manager - named models and their registry uploads
pub struct ResourceManager {
    /// Registered CPU-side models
    models: HashMap<String, Model>,

    /// Models currently uploaded, by name
    uploads: HashMap<String, Upload>,

    /// Fall back to the default material for missing slots
    use_fallback_material: bool,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(&AssetConfig::default())
    }
}

impl ResourceManager {
    /// Create an empty resource manager
    pub fn new(config: &AssetConfig) -> Self {
        log::info!(
            "Creating ResourceManager (fallback material {})",
            if config.use_fallback_material { "on" } else { "off" }
        );
        Self {
            models: HashMap::new(),
            uploads: HashMap::new(),
            use_fallback_material: config.use_fallback_material,
        }
    }

    /// Register a model under its name, replacing an unuploaded model of the same name
    pub fn register(&mut self, model: Model) -> Result<(), AssetError> {
        model.validate()?;
        if self.uploads.contains_key(&model.name) {
            return Err(AssetError::InvalidData {
                name: model.name.clone(),
                reason: "a model with this name is currently uploaded".to_string(),
            });
        }
        log::debug!(
            "Registered model '{}' ({} vertices, {} sub-meshes)",
            model.name,
            model.vertices.len(),
            model.submeshes.len()
        );
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Whether a model is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Get the meshes of a model, uploading it on first use
    pub fn acquire(&mut self, name: &str, registry: &mut RenderRegistry) -> Result<ModelHandle, AssetError> {
        if let Some(upload) = self.uploads.get_mut(name) {
            upload.refs += 1;
            log::trace!("Model '{}' acquired ({} refs)", name, upload.refs);
            return Ok(ModelHandle { name: name.to_string(), meshes: upload.meshes.clone() });
        }

        let model = self.models.get(name).ok_or_else(|| AssetError::NotFound(name.to_string()))?;
        let upload = Self::upload(model, registry, self.use_fallback_material)?;
        let handle = ModelHandle { name: name.to_string(), meshes: upload.meshes.clone() };
        self.uploads.insert(name.to_string(), upload);
        log::info!("Uploaded model '{}' ({} mesh(es))", name, handle.meshes.len());
        Ok(handle)
    }

    /// Drop one reference; the last one destroys the registry entries
    pub fn release(&mut self, name: &str, registry: &mut RenderRegistry) -> Result<(), AssetError> {
        let upload = self
            .uploads
            .get_mut(name)
            .ok_or_else(|| AssetError::NotAcquired(name.to_string()))?;

        if upload.refs > 1 {
            upload.refs -= 1;
            log::trace!("Model '{}' released ({} refs)", name, upload.refs);
            return Ok(());
        }

        let users: usize = upload.meshes.iter().map(|mesh| registry.mesh_users(*mesh)).sum();
        if users > 0 {
            return Err(AssetError::StillInUse { name: name.to_string(), users });
        }

        if let Some(upload) = self.uploads.remove(name) {
            Self::unload(&upload, registry)?;
            log::info!("Unloaded model '{}'", name);
        }
        Ok(())
    }

    /// Outstanding `acquire` calls for a model
    pub fn ref_count(&self, name: &str) -> usize {
        self.uploads.get(name).map_or(0, |upload| upload.refs)
    }

    /// Number of registered models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn upload(model: &Model, registry: &mut RenderRegistry, fallback: bool) -> Result<Upload, AssetError> {
        // Reject missing slots before anything is created
        if !fallback {
            if let Some(submesh) = model.submeshes.iter().find(|s| s.material_slot >= model.materials.len()) {
                return Err(AssetError::MissingMaterial {
                    name: model.name.clone(),
                    slot: submesh.material_slot,
                });
            }
        }

        let vertex_buffer = registry.create_vertex_buffer::<Vertex>(&model.vertices)?;
        let materials: Vec<MaterialId> = model
            .materials
            .iter()
            .map(|desc| registry.create_material(desc.clone()))
            .collect();

        let mut upload = Upload { vertex_buffer, meshes: Vec::new(), materials, refs: 1 };
        for submesh in &model.submeshes {
            let material = upload.materials.get(submesh.material_slot).copied();
            if material.is_none() {
                log::warn!(
                    "Model '{}' has no material slot {}, using the default material",
                    model.name,
                    submesh.material_slot
                );
            }
            let range = &model.vertices[submesh.first as usize..(submesh.first + submesh.count) as usize];
            let desc = MeshDesc {
                vertex_buffer,
                first: submesh.first,
                count: submesh.count,
                material,
                bounds: AABB::from_points(range.iter().map(|v| v.position.into())).unwrap_or(model.bounds),
            };
            match registry.create_mesh(desc) {
                Ok(mesh) => upload.meshes.push(mesh),
                Err(err) => {
                    if let Err(cleanup) = Self::unload(&upload, registry) {
                        log::warn!("Rolling back upload of '{}' failed: {}", model.name, cleanup);
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(upload)
    }

    fn unload(upload: &Upload, registry: &mut RenderRegistry) -> Result<(), AssetError> {
        for mesh in &upload.meshes {
            registry.destroy_mesh(*mesh)?;
        }
        registry.destroy_vertex_buffer(upload.vertex_buffer)?;
        for material in &upload.materials {
            registry.destroy_material(*material)?;
        }
        Ok(())
    }
}
