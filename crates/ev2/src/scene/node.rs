//! # Scene Nodes
//!
//! A [`Node`] is a shared handle to a transform-bearing tree entity. Parents
//! own their children through strong handles; the child-to-parent and
//! node-to-scene links are weak and upgraded on demand, so dropping a scene
//! or detaching a subtree never leaves an ownership cycle behind.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed -> Initialized -> Ready -> (on_process)* -> Destroying -> Destroyed
//! ```
//!
//! - `on_init` runs inside [`NodeBuilder::build`]
//! - `on_ready` runs when the node first joins a live scene, children first
//! - `on_destroy` runs inside [`Node::destroy`], children first, before the
//!   node's registry and physics ids are released
//!
//! All traversals use explicit work lists.

use super::behaviour::{AsAny, HookResult, NodeBehaviour};
use super::components::{Camera, Capabilities, Components};
use super::error::SceneError;
use super::scene::SceneCore;
use crate::assets::ModelHandle;
use crate::context::Context;
use crate::engine::EngineError;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::foundation::reference::{Ref, WeakRef};
use crate::physics::{BodyDesc, BodyHandle};
use crate::render::{LightDesc, LightId, MaterialId, MeshId, MeshInstanceId};
use std::fmt;

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Allocated, `on_init` not yet run
    Constructed,
    /// Initialized, not yet part of a live scene
    Initialized,
    /// Part of (or once part of) a live scene
    Ready,
    /// Inside `destroy()`
    Destroying,
    /// Destroyed; the value lives on only while handles remain
    Destroyed,
}

impl NodeState {
    fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroying | Self::Destroyed)
    }
}

/// Node storage behind the shared handle
pub struct NodeData {
    name: String,
    transform: Transform,
    world: Mat4,
    children: Vec<Node>,
    parent: Option<WeakRef<NodeData>>,
    scene: Option<WeakRef<SceneCore>>,
    state: NodeState,
    is_root: bool,
    in_hook: bool,
    components: Components,
    behaviour: Option<Box<dyn NodeBehaviour>>,
}

impl NodeData {
    fn new(name: String, transform: Transform) -> Self {
        Self {
            name,
            transform,
            world: Mat4::identity(),
            children: Vec::new(),
            parent: None,
            scene: None,
            state: NodeState::Constructed,
            is_root: false,
            in_hook: false,
            components: Components::default(),
            behaviour: None,
        }
    }
}

/// Shared handle to a scene node
///
/// Cloning shares the node; equality is identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Node(Ref<NodeData>);

/// Non-owning handle to a node
#[derive(Clone, Default)]
pub struct WeakNode(WeakRef<NodeData>);

impl WeakNode {
    /// Obtain the node if it is still alive
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    /// Whether the node has not been dropped
    pub fn is_alive(&self) -> bool {
        self.0.is_alive()
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakNode").field(&self.0.is_alive()).finish()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => f
                .debug_struct("Node")
                .field("name", &data.name)
                .field("state", &data.state)
                .field("children", &data.children.len())
                .finish(),
            Err(_) => f.debug_struct("Node").field("id", &format_args!("{:#x}", self.id())).finish(),
        }
    }
}

impl Node {
    /// Plain grouping node, already initialized
    pub fn new(name: impl Into<String>) -> Self {
        let mut data = NodeData::new(name.into(), Transform::identity());
        data.state = NodeState::Initialized;
        Self(Ref::new(data))
    }

    /// Start building a node with components and a behaviour
    pub fn builder(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    pub(crate) fn new_root(name: impl Into<String>, scene: WeakRef<SceneCore>) -> Self {
        let mut data = NodeData::new(name.into(), Transform::identity());
        data.state = NodeState::Ready;
        data.is_root = true;
        data.scene = Some(scene);
        Self(Ref::new(data))
    }

    // ------------------------------------------------------------------
    // Identity and accessors
    // ------------------------------------------------------------------

    /// Node name, fixed at construction
    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    /// Lifecycle state
    pub fn state(&self) -> NodeState {
        self.0.borrow().state
    }

    /// Whether `destroy()` has run (or is running) on this node
    pub fn is_destroyed(&self) -> bool {
        self.state().is_destroyed()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Node) -> bool {
        self.0.ptr_eq(&other.0)
    }

    /// Address of the node, stable for its lifetime
    pub fn id(&self) -> usize {
        self.0.id()
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakNode {
        WeakNode(self.0.downgrade())
    }

    /// Names from the topmost ancestor down to this node, joined with `/`
    pub fn path(&self) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(node) = current {
            names.push(node.name());
            current = node.parent();
        }
        names.reverse();
        names.join("/")
    }

    /// Local transform
    pub fn transform(&self) -> Transform {
        self.0.borrow().transform
    }

    /// Replace the local transform
    pub fn set_transform(&self, transform: Transform) {
        self.0.borrow_mut().transform = transform;
    }

    /// Set local position
    pub fn set_position(&self, position: Vec3) {
        self.0.borrow_mut().transform.position = position;
    }

    /// Move by `offset` in parent space
    pub fn translate(&self, offset: Vec3) {
        self.0.borrow_mut().transform.translate(offset);
    }

    /// Set local rotation
    pub fn set_rotation(&self, rotation: Quat) {
        self.0.borrow_mut().transform.rotation = rotation;
    }

    /// Apply an additional rotation
    pub fn rotate(&self, rotation: Quat) {
        self.0.borrow_mut().transform.rotate(rotation);
    }

    /// Set local scale
    pub fn set_scale(&self, scale: Vec3) {
        self.0.borrow_mut().transform.scale = scale;
    }

    pub(crate) fn apply_body_pose(&self, position: Vec3, rotation: Quat) {
        let mut data = self.0.borrow_mut();
        data.transform.position = position;
        data.transform.rotation = rotation;
    }

    /// Local TRS matrix
    pub fn local_matrix(&self) -> Mat4 {
        self.0.borrow().transform.to_matrix()
    }

    /// Composition of every ancestor's local matrix with this node's
    ///
    /// A body node is simulated in world space, so the walk stops there.
    pub fn world_matrix(&self) -> Mat4 {
        let mut world = Mat4::identity();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            let data = node.0.borrow();
            world = data.transform.to_matrix() * world;
            if data.components.body.is_some() {
                break;
            }
            current = data.parent.as_ref().and_then(WeakRef::upgrade).map(Node);
        }
        world
    }

    /// World matrix computed by the last pre-render pass
    pub fn cached_world_matrix(&self) -> Mat4 {
        self.0.borrow().world
    }

    pub(crate) fn update_world(&self, parent_world: &Mat4) -> Mat4 {
        let mut data = self.0.borrow_mut();
        let local = data.transform.to_matrix();
        data.world = if data.components.body.is_some() { local } else { parent_world * local };
        data.world
    }

    // ------------------------------------------------------------------
    // Hierarchy queries
    // ------------------------------------------------------------------

    /// Parent, if attached and alive
    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.as_ref().and_then(WeakRef::upgrade).map(Node)
    }

    /// Children in insertion order
    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// First direct child with `name`
    pub fn find_child(&self, name: &str) -> Option<Node> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|child| child.0.borrow().name == name)
            .cloned()
    }

    /// Whether this node is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        let mut current = other.parent();
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Whether the node is attached to a live scene
    pub fn in_scene(&self) -> bool {
        self.0.borrow().scene.as_ref().is_some_and(WeakRef::is_alive)
    }

    pub(crate) fn belongs_to(&self, scene: &Ref<SceneCore>) -> bool {
        self.0.borrow().scene.as_ref().is_some_and(|link| link.points_to(scene))
    }

    pub(crate) fn scene_core(&self) -> Option<Ref<SceneCore>> {
        self.0.borrow().scene.as_ref().and_then(WeakRef::upgrade)
    }

    pub(crate) fn is_root(&self) -> bool {
        self.0.borrow().is_root
    }

    /// This node and its descendants, parents before children, siblings in order
    pub fn preorder(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.0.borrow().children.iter().rev().cloned());
            out.push(node);
        }
        out
    }

    /// This node and its descendants, children before parents
    pub fn postorder(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            stack.extend(node.0.borrow().children.iter().cloned());
            out.push(node);
        }
        out.reverse();
        out
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// What the node can do
    pub fn capabilities(&self) -> Capabilities {
        let data = self.0.borrow();
        let mut caps = data.components.capabilities();
        // A behaviour moved out for a running hook still counts
        caps.set(Capabilities::BEHAVIOUR, data.behaviour.is_some() || data.in_hook);
        caps
    }

    /// Mesh instances owned by the node
    pub fn mesh_instances(&self) -> Vec<MeshInstanceId> {
        self.0.borrow().components.instances.clone()
    }

    /// Light owned by the node
    pub fn light(&self) -> Option<LightId> {
        self.0.borrow().components.light
    }

    /// Physics body driving the node
    pub fn body(&self) -> Option<BodyHandle> {
        self.0.borrow().components.body
    }

    /// Camera component
    pub fn camera(&self) -> Option<Camera> {
        self.0.borrow().components.camera
    }

    /// Add, replace or remove the camera component
    pub fn set_camera(&self, camera: Option<Camera>) {
        self.0.borrow_mut().components.camera = camera;
    }

    /// Run `f` on the node's behaviour if it is a `B`
    ///
    /// Returns `None` when the node has no behaviour of that type or when one
    /// of its hooks is currently running. `f` must not call back into this node.
    pub fn with_behaviour<B: NodeBehaviour, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut data = self.0.borrow_mut();
        let behaviour = data.behaviour.as_mut()?;
        let typed = <dyn NodeBehaviour as AsAny>::as_any_mut(&mut **behaviour)
            .downcast_mut::<B>()?;
        Some(f(typed))
    }

    pub(crate) fn run_hook<F>(&self, ctx: &mut Context, hook: F) -> HookResult
    where
        F: FnOnce(&mut dyn NodeBehaviour, &Node, &mut Context) -> HookResult,
    {
        let taken = {
            let mut data = self.0.borrow_mut();
            let taken = data.behaviour.take();
            if taken.is_some() {
                data.in_hook = true;
            }
            taken
        };
        let Some(mut behaviour) = taken else {
            return Ok(());
        };

        let result = hook(&mut *behaviour, self, ctx);

        let mut data = self.0.borrow_mut();
        data.in_hook = false;
        if data.behaviour.is_none() {
            data.behaviour = Some(behaviour);
        }
        result
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Attach `child` as the last child of this node
    ///
    /// A child with a parent is detached from it first. When this node is
    /// ready and in a scene, the attached subtree receives `on_ready`
    /// immediately, children first; nodes that were ready before are skipped.
    pub fn add_child(&self, child: &Node, ctx: &mut Context) -> Result<(), EngineError> {
        if self.ptr_eq(child) {
            return Err(SceneError::SelfParenting(self.name()).into());
        }
        if child.is_ancestor_of(self) {
            return Err(SceneError::WouldCreateCycle { parent: self.name(), child: child.name() }.into());
        }
        if child.is_root() {
            return Err(SceneError::RootReparent(child.name()).into());
        }
        if self.is_destroyed() {
            return Err(SceneError::NodeDestroyed(self.name()).into());
        }
        if child.is_destroyed() {
            return Err(SceneError::NodeDestroyed(child.name()).into());
        }

        child.detach();

        let scene = {
            let mut data = self.0.borrow_mut();
            data.children.push(child.clone());
            data.scene.clone()
        };
        child.0.borrow_mut().parent = Some(self.0.downgrade());
        for node in child.preorder() {
            node.0.borrow_mut().scene.clone_from(&scene);
        }
        log::trace!("Attached '{}' under '{}'", child.name(), self.name());

        self.run_hook(ctx, |behaviour, node, ctx| behaviour.on_child_added(node, child, ctx))?;

        if self.state() == NodeState::Ready && self.in_scene() {
            Self::propagate_ready(child, ctx)?;
        }
        Ok(())
    }

    fn propagate_ready(subtree: &Node, ctx: &mut Context) -> HookResult {
        for node in subtree.postorder() {
            {
                let mut data = node.0.borrow_mut();
                if data.state != NodeState::Initialized {
                    continue;
                }
                data.state = NodeState::Ready;
            }
            node.run_hook(ctx, |behaviour, node, ctx| behaviour.on_ready(node, ctx))?;
        }
        Ok(())
    }

    /// Detach a direct child, keeping the order of the remaining children
    pub fn remove_child(&self, child: &Node) -> Result<(), SceneError> {
        let removed = {
            let mut data = self.0.borrow_mut();
            let index = data.children.iter().position(|c| c.ptr_eq(child));
            index.map(|index| data.children.remove(index))
        };
        let Some(removed) = removed else {
            return Err(SceneError::NotAChild { parent: self.name(), child: child.name() });
        };

        removed.0.borrow_mut().parent = None;
        for node in removed.preorder() {
            node.0.borrow_mut().scene = None;
        }
        log::trace!("Detached '{}' from '{}'", removed.name(), self.name());
        Ok(())
    }

    /// Detach from the current parent, if any
    pub fn detach(&self) {
        match self.parent() {
            Some(parent) => {
                if let Err(err) = parent.remove_child(self) {
                    log::error!("'{}' is not in its parent's child list: {}", self.name(), err);
                    self.0.borrow_mut().parent = None;
                }
            }
            None => {
                let mut data = self.0.borrow_mut();
                data.parent = None;
            }
        }
    }

    /// Destroy this node and its subtree
    ///
    /// Children go first. For each node `on_destroy` runs, then its mesh
    /// instances, light and body are released, then it becomes `Destroyed`.
    /// Finally the subtree detaches from its parent. Handles held elsewhere
    /// stay valid but refer to a destroyed node.
    pub fn destroy(&self, ctx: &mut Context) -> Result<(), EngineError> {
        if self.is_destroyed() {
            return Err(SceneError::AlreadyDestroyed(self.name()).into());
        }
        if self.is_root() {
            return Err(SceneError::CannotDestroyRoot.into());
        }

        let doomed = self.postorder();
        if let Some(busy) = doomed.iter().find(|node| node.0.borrow().in_hook) {
            return Err(SceneError::DestroyInsideHook(busy.name()).into());
        }

        let scene = self.scene_core();
        for node in &doomed {
            node.0.borrow_mut().state = NodeState::Destroying;
        }

        let mut first_error: Option<EngineError> = None;
        for node in &doomed {
            if let Err(err) = node.run_hook(ctx, |behaviour, node, ctx| behaviour.on_destroy(node, ctx)) {
                log::error!("on_destroy of '{}' failed: {}", node.name(), err);
                first_error.get_or_insert(err);
            }
            if let Err(err) = node.release_components(ctx) {
                first_error.get_or_insert(err);
            }

            let mut data = node.0.borrow_mut();
            data.state = NodeState::Destroyed;
            data.children.clear();
            data.behaviour = None;
            data.scene = None;
            if !node.ptr_eq(self) {
                data.parent = None;
            }
        }

        self.detach();

        if let Some(scene) = scene {
            let mut core = scene.borrow_mut();
            let camera_doomed = core
                .active_camera
                .as_ref()
                .is_some_and(|camera| doomed.iter().any(|node| node.ptr_eq(camera)));
            if camera_doomed {
                log::debug!("Active camera destroyed, clearing it");
                core.active_camera = None;
            }
        }

        log::debug!("Destroyed '{}' ({} node(s))", self.name(), doomed.len());
        first_error.map_or(Ok(()), Err)
    }

    fn release_components(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let components = std::mem::take(&mut self.0.borrow_mut().components);
        release(components, ctx)
    }
}

fn release(components: Components, ctx: &mut Context) -> Result<(), EngineError> {
    let mut first_error: Option<EngineError> = None;
    for instance in components.instances {
        if let Err(err) = ctx.registry.destroy_mesh_instance(instance) {
            first_error.get_or_insert(err.into());
        }
    }
    if let Some(light) = components.light {
        if let Err(err) = ctx.registry.destroy_light(light) {
            first_error.get_or_insert(err.into());
        }
    }
    if let Some(body) = components.body {
        if let Err(err) = ctx.physics.destroy_body(body) {
            first_error.get_or_insert(err.into());
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Builder for nodes with components and a behaviour
pub struct NodeBuilder {
    name: String,
    transform: Transform,
    instances: Vec<(MeshId, Option<MaterialId>)>,
    light: Option<LightDesc>,
    camera: Option<Camera>,
    body: Option<BodyDesc>,
    behaviour: Option<Box<dyn NodeBehaviour>>,
}

impl NodeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            instances: Vec::new(),
            light: None,
            camera: None,
            body: None,
            behaviour: None,
        }
    }

    /// Initial local transform (world transform for body nodes)
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Add a mesh instance, optionally overriding the mesh's material
    #[must_use]
    pub fn mesh_instance(mut self, mesh: MeshId, material_override: Option<MaterialId>) -> Self {
        self.instances.push((mesh, material_override));
        self
    }

    /// Add one mesh instance per sub-mesh of an uploaded model
    #[must_use]
    pub fn model(mut self, model: &ModelHandle) -> Self {
        self.instances.extend(model.meshes().iter().map(|mesh| (*mesh, None)));
        self
    }

    /// Attach a light
    #[must_use]
    pub fn light(mut self, light: LightDesc) -> Self {
        self.light = Some(light);
        self
    }

    /// Attach a camera
    #[must_use]
    pub fn camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Drive the node with a physics body
    #[must_use]
    pub fn body(mut self, body: BodyDesc) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach user logic
    #[must_use]
    pub fn behaviour(mut self, behaviour: impl NodeBehaviour) -> Self {
        self.behaviour = Some(Box::new(behaviour));
        self
    }

    /// Create the components, run `on_init` and return the initialized node
    ///
    /// If anything fails, every id created so far is released again.
    pub fn build(self, ctx: &mut Context) -> Result<Node, EngineError> {
        let mut data = NodeData::new(self.name, self.transform);
        data.behaviour = self.behaviour;
        data.components.camera = self.camera;
        let node = Node(Ref::new(data));

        if let Err(err) = Self::create_components(&node, &self.instances, self.light, self.body.as_ref(), ctx) {
            log::warn!("Building '{}' failed: {}", node.name(), err);
            node.abandon(ctx);
            return Err(err);
        }

        if let Err(err) = node.run_hook(ctx, |behaviour, node, ctx| behaviour.on_init(node, ctx)) {
            log::warn!("on_init of '{}' failed: {}", node.name(), err);
            node.abandon(ctx);
            return Err(err);
        }

        node.0.borrow_mut().state = NodeState::Initialized;
        log::trace!("Built node '{}' with {:?}", node.name(), node.capabilities());
        Ok(node)
    }

    fn create_components(
        node: &Node,
        instances: &[(MeshId, Option<MaterialId>)],
        light: Option<LightDesc>,
        body: Option<&BodyDesc>,
        ctx: &mut Context,
    ) -> Result<(), EngineError> {
        if let Some(desc) = body {
            let pose = node.transform();
            let handle = ctx.physics.create_body(desc, &pose, node)?;
            node.0.borrow_mut().components.body = Some(handle);
        }
        for (mesh, material) in instances {
            let id = ctx.registry.create_mesh_instance(*mesh, *material)?;
            node.0.borrow_mut().components.instances.push(id);
        }
        if let Some(light) = light {
            let id = ctx.registry.create_light(light)?;
            node.0.borrow_mut().components.light = Some(id);
        }
        Ok(())
    }
}

impl Node {
    /// Release whatever a half-built node created and mark it destroyed
    fn abandon(&self, ctx: &mut Context) {
        if let Err(err) = self.release_components(ctx) {
            log::warn!("Rolling back '{}' failed: {}", self.name(), err);
        }
        let mut data = self.0.borrow_mut();
        data.behaviour = None;
        data.state = NodeState::Destroyed;
    }
}
