//! Scene graph: nodes, behaviours, components and the scene passes

pub mod behaviour;
pub mod components;
pub mod error;
pub mod node;
#[allow(clippy::module_inception)]
pub mod scene;

#[cfg(test)]
mod tests;

pub use behaviour::{AsAny, HookResult, NodeBehaviour};
pub use components::{Camera, CameraMatrices, Capabilities, Projection};
pub use error::SceneError;
pub use node::{Node, NodeBuilder, NodeData, NodeState, WeakNode};
pub use scene::{Scene, SceneCore};
