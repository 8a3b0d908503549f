use thiserror::Error;

/// Scene graph errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A node cannot be its own child
    #[error("Node '{0}' cannot be added to itself")]
    SelfParenting(String),

    /// The child is an ancestor of the would-be parent
    #[error("Adding '{child}' under '{parent}' would create a cycle")]
    WouldCreateCycle {
        /// Would-be parent
        parent: String,
        /// Would-be child
        child: String,
    },

    /// Removal target is not a direct child
    #[error("'{child}' is not a child of '{parent}'")]
    NotAChild {
        /// Receiver of the removal
        parent: String,
        /// Node that was not found
        child: String,
    },

    /// `destroy()` was called twice
    #[error("Node '{0}' is already destroyed")]
    AlreadyDestroyed(String),

    /// A destroyed node was used in a structural operation
    #[error("Node '{0}' has been destroyed")]
    NodeDestroyed(String),

    /// A node tried to destroy itself (or an ancestor) from inside one of its hooks
    #[error("Node '{0}' cannot be destroyed while its hook is running; queue the destroy instead")]
    DestroyInsideHook(String),

    /// Active camera candidate carries no camera
    #[error("Node '{0}' has no camera component")]
    NotACamera(String),

    /// The node belongs to no scene or to a different one
    #[error("Node '{0}' is not part of this scene")]
    NotInScene(String),

    /// The scene root lives as long as the scene
    #[error("The scene root cannot be destroyed")]
    CannotDestroyRoot,

    /// The scene root cannot be attached anywhere
    #[error("The scene root '{0}' cannot become a child")]
    RootReparent(String),
}

impl SceneError {
    /// Whether this error is a programming error rather than a recoverable condition
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::NotAChild { .. })
    }
}
