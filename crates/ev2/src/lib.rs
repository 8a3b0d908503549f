//! # ev2
//!
//! Scene-graph core of a small real-time 3D engine.
//!
//! ## Features
//!
//! - **Scene Graph**: reference-counted nodes with lifecycle hooks and
//!   built-in render, light, camera and physics components
//! - **Resource Registry**: generation-checked ids for vertex buffers,
//!   meshes, materials, mesh instances and lights
//! - **Physics Bridge**: fixed-timestep stepping, interpolated node sync and
//!   raycasts that resolve to scene nodes
//! - **Headless Rendering**: render queue batching and a backend that counts
//!   draws without a GPU
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ev2::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let (scene, ctx) = engine.parts_mut();
//!         let camera = Node::builder("camera")
//!             .camera(Camera::default())
//!             .build(ctx)?;
//!         scene.add_node(&camera, None, ctx)?;
//!         scene.set_active_camera(Some(&camera)).map_err(EngineError::from)?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app)?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;
pub mod config;

pub mod foundation;
pub mod scene;
pub mod render;
pub mod physics;
pub mod assets;
pub mod input;
pub mod context;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use context::Context;
pub use engine::{Engine, EngineError, FrameReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Application, AppError, AppEvent,
        Context,
        Engine, EngineError, FrameReport,
        foundation::{
            math::{Vec3, Mat4, Quat, Transform},
            reference::{Ref, WeakRef},
            time::Timer,
        },
        scene::{Camera, Capabilities, HookResult, Node, NodeBehaviour, NodeState, Scene, SceneError},
        render::{LightDesc, MaterialDesc, MaterialProperty, RenderBackend, HeadlessBackend},
        physics::{BodyDesc, ColliderShape, CollisionLayers, SceneRayHit},
        assets::{Model, ModelHandle},
        input::{InputManager, KeyCode, MouseButton},
        core::config::{ApplicationConfig, EngineConfig, PhysicsConfig, RenderConfig, AssetConfig},
        config::Config,
    };
}
