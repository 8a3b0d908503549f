//! User logic attached to nodes
//!
//! Every hook has a no-op default, so a behaviour only implements what it
//! needs. Hooks receive the node they run on and the engine [`Context`];
//! errors returned from a hook abort the pass that invoked it.
//!
//! While a node's hook runs, its behaviour is moved out of the node:
//! [`Node::with_behaviour`] on that node returns `None` and destroying the
//! node is rejected. Use [`Context::queue_destroy`] to remove a node from
//! inside its own hook.

use super::node::Node;
use crate::context::Context;
use crate::engine::EngineError;
use std::any::Any;

/// Result type of every hook
pub type HookResult = Result<(), EngineError>;

/// Downcasting support for behaviours
pub trait AsAny: Any {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Lifecycle hooks of a node
#[allow(unused_variables)]
pub trait NodeBehaviour: AsAny {
    /// Once, inside the builder, before the node can be attached anywhere
    fn on_init(&mut self, node: &Node, ctx: &mut Context) -> HookResult {
        Ok(())
    }

    /// Once, when the node first becomes part of a live scene
    ///
    /// Children receive it before their parent.
    fn on_ready(&mut self, node: &Node, ctx: &mut Context) -> HookResult {
        Ok(())
    }

    /// Every update pass, parents before children
    fn on_process(&mut self, node: &Node, ctx: &mut Context, delta: f32) -> HookResult {
        Ok(())
    }

    /// After `child` has been attached to this node
    fn on_child_added(&mut self, node: &Node, child: &Node, ctx: &mut Context) -> HookResult {
        Ok(())
    }

    /// Every render pass, before the node's world transform is pushed
    fn pre_render(&mut self, node: &Node, ctx: &mut Context) -> HookResult {
        Ok(())
    }

    /// Once, inside `destroy()`, children before parents, before owned ids are released
    fn on_destroy(&mut self, node: &Node, ctx: &mut Context) -> HookResult {
        Ok(())
    }
}
