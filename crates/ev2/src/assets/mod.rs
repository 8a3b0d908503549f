//! Asset management system
//!
//! Models are registered by name with the [`ResourceManager`] and uploaded
//! to the render registry the first time a node asks for them.

pub mod model;
pub mod resource_manager;

pub use model::{Model, SubMesh, Vertex};
pub use resource_manager::{AssetError, ModelHandle, ResourceManager};
