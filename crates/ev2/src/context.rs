//! Engine services handed to every node operation and hook
//!
//! The scene graph never reaches for globals: whatever a node needs to
//! create, update or release its components comes in through a `&mut Context`.

use crate::assets::ResourceManager;
use crate::core::config::ApplicationConfig;
use crate::input::InputManager;
use crate::physics::PhysicsBridge;
use crate::render::RenderRegistry;
use crate::scene::Node;

/// Subsystems shared by the scene and its behaviours
pub struct Context {
    /// Renderer resource tables
    pub registry: RenderRegistry,

    /// Named models and their uploads
    pub assets: ResourceManager,

    /// Fixed-step simulation and body/node mapping
    pub physics: PhysicsBridge,

    /// Keyboard and mouse state
    pub input: InputManager,

    /// Nodes to destroy once the current update pass ends
    deferred: Vec<Node>,
}

impl Context {
    /// Create every subsystem from the application configuration
    pub fn new(config: &ApplicationConfig) -> Self {
        Self {
            registry: RenderRegistry::new(&config.render),
            assets: ResourceManager::new(&config.assets),
            physics: PhysicsBridge::new(&config.physics),
            input: InputManager::new(),
            deferred: Vec::new(),
        }
    }

    /// Destroy `node` after the current update pass
    ///
    /// This is the way for a hook to remove its own node. Queuing a node
    /// twice destroys it once.
    pub fn queue_destroy(&mut self, node: &Node) {
        if self.deferred.iter().any(|queued| queued.ptr_eq(node)) {
            return;
        }
        log::trace!("Queued '{}' for destruction", node.name());
        self.deferred.push(node.clone());
    }

    /// Nodes waiting to be destroyed
    pub fn pending_destroy_count(&self) -> usize {
        self.deferred.len()
    }

    pub(crate) fn take_deferred(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.deferred)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(&ApplicationConfig::default())
    }
}
