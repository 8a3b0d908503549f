//! # Scene
//!
//! Owns the root node and the active camera, and drives the two per-frame
//! passes over the tree:
//!
//! - [`Scene::update`]: `on_process` on every node present at pass start,
//!   pre-order; deferred destroys are drained afterwards
//! - [`Scene::update_pre_render`]: `pre_render` on every node, pre-order,
//!   then the node's world transform is pushed to its registry ids

use super::components::CameraMatrices;
use super::error::SceneError;
use super::node::{Node, NodeState};
use crate::context::Context;
use crate::engine::EngineError;
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::foundation::reference::Ref;

/// Scene-wide state nodes link back to
pub struct SceneCore {
    name: String,
    pub(crate) active_camera: Option<Node>,
}

impl SceneCore {
    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A tree of nodes under one root
pub struct Scene {
    core: Ref<SceneCore>,
    root: Node,
    frame: u64,
}

impl Scene {
    /// Create an empty scene; its root is ready immediately
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let core = Ref::new(SceneCore { name: name.clone(), active_camera: None });
        let root = Node::new_root("root", core.downgrade());
        log::info!("Created scene '{}'", name);
        Self { core, root, frame: 0 }
    }

    /// Scene name
    pub fn name(&self) -> String {
        self.core.borrow().name.clone()
    }

    /// Root node
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Attach `node` under `parent`, or under the root when `parent` is `None`
    pub fn add_node(&self, node: &Node, parent: Option<&Node>, ctx: &mut Context) -> Result<(), EngineError> {
        let parent = parent.unwrap_or(&self.root);
        if !parent.belongs_to(&self.core) {
            return Err(SceneError::NotInScene(parent.name()).into());
        }
        parent.add_child(node, ctx)
    }

    /// Destroy a node and its subtree
    pub fn destroy_node(&self, node: &Node, ctx: &mut Context) -> Result<(), EngineError> {
        if node.ptr_eq(&self.root) {
            return Err(SceneError::CannotDestroyRoot.into());
        }
        node.destroy(ctx)
    }

    /// Logic pass
    ///
    /// Nodes attached during the pass are first processed next pass; nodes
    /// destroyed or detached during the pass are skipped.
    pub fn update(&mut self, delta: f32, ctx: &mut Context) -> Result<(), EngineError> {
        let delta = if delta.is_finite() && delta >= 0.0 {
            delta
        } else {
            log::warn!("Clamping invalid frame delta {} to 0", delta);
            0.0
        };

        let snapshot = self.root.preorder();
        log::trace!("Update pass over {} node(s)", snapshot.len());
        for node in &snapshot {
            if node.state() != NodeState::Ready || !node.belongs_to(&self.core) {
                continue;
            }
            node.run_hook(ctx, |behaviour, node, ctx| behaviour.on_process(node, ctx, delta))?;
        }

        self.drain_deferred(ctx)?;
        self.frame += 1;
        Ok(())
    }

    fn drain_deferred(&self, ctx: &mut Context) -> Result<(), EngineError> {
        // on_destroy may queue further nodes
        loop {
            let pending = ctx.take_deferred();
            if pending.is_empty() {
                return Ok(());
            }
            for node in pending {
                if node.is_destroyed() {
                    continue;
                }
                if node.ptr_eq(&self.root) {
                    log::warn!("Ignoring queued destroy of the scene root");
                    continue;
                }
                node.destroy(ctx)?;
            }
        }
    }

    /// Render-sync pass
    ///
    /// Runs each node's `pre_render`, then computes its world transform
    /// (`parent.world * local`, or `local` for body nodes) and pushes it to
    /// the node's mesh instances and light.
    pub fn update_pre_render(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let mut stack = vec![(self.root.clone(), Mat4::identity())];
        let mut visited = 0_usize;

        while let Some((node, parent_world)) = stack.pop() {
            if node.is_destroyed() {
                continue;
            }
            node.run_hook(ctx, |behaviour, node, ctx| behaviour.pre_render(node, ctx))?;
            // The hook may have destroyed its own subtree through another node
            if node.is_destroyed() {
                continue;
            }

            let world = node.update_world(&parent_world);
            for instance in node.mesh_instances() {
                ctx.registry.set_instance_transform(instance, world)?;
            }
            if let Some(light) = node.light() {
                ctx.registry.set_light_transform(light, world)?;
            }

            stack.extend(node.children().into_iter().rev().map(|child| (child, world)));
            visited += 1;
        }

        log::trace!("Pre-render pass over {} node(s)", visited);
        Ok(())
    }

    /// Select the camera the frame is drawn from; `None` disables drawing
    pub fn set_active_camera(&self, node: Option<&Node>) -> Result<(), SceneError> {
        if let Some(node) = node {
            if node.camera().is_none() {
                return Err(SceneError::NotACamera(node.name()));
            }
            if !node.belongs_to(&self.core) {
                return Err(SceneError::NotInScene(node.name()));
            }
            log::debug!("Active camera is now '{}'", node.path());
        }
        self.core.borrow_mut().active_camera = node.cloned();
        Ok(())
    }

    /// Current active camera
    pub fn active_camera(&self) -> Option<Node> {
        self.core.borrow().active_camera.clone()
    }

    /// View and projection of the active camera
    ///
    /// `None` when there is no camera, it has left the scene, its camera
    /// component was removed, or its world matrix is singular.
    pub fn camera_matrices(&self, aspect: f32) -> Option<CameraMatrices> {
        let node = self.active_camera()?;
        if !node.belongs_to(&self.core) {
            return None;
        }
        let camera = node.camera()?;
        let world = node.world_matrix();
        let view = world.try_inverse()?;
        Some(CameraMatrices {
            view,
            projection: camera.projection_matrix(aspect),
            position: world.translation_part(),
        })
    }

    /// Nodes in the tree, root included
    pub fn node_count(&self) -> usize {
        self.root.preorder().len()
    }

    /// Completed update passes
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Destroy every child of the root
    pub fn clear(&self, ctx: &mut Context) -> Result<(), EngineError> {
        for child in self.root.children() {
            child.destroy(ctx)?;
        }
        log::debug!("Cleared scene '{}'", self.name());
        Ok(())
    }
}
