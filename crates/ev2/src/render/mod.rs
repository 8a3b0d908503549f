//! Renderer-facing side of the engine
//!
//! The scene pushes transforms into the [`RenderRegistry`] by id; the draw
//! side builds a [`RenderQueue`] from the registry alone and hands it to a
//! [`RenderBackend`].

pub mod backend;
pub mod registry;
pub mod render_queue;
pub mod resources;

pub use backend::{FrameStats, HeadlessBackend, RenderBackend, RenderError, RenderResult};
pub use registry::{RegistryError, RegistryResult, RenderRegistry};
pub use render_queue::{CommandType, DrawItem, LightItem, RenderBatch, RenderQueue};
pub use resources::{
    Light, LightDesc, LightId, LightKind, LightProperty, Material, MaterialDesc, MaterialId,
    MaterialProperty, Mesh, MeshDesc, MeshId, MeshInstance, MeshInstanceId, RegistryTag,
    ResourceId, ResourceKind, VertexBuffer, VertexBufferId,
};
