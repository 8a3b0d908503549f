//! The seam between a game and the engine main loop

use crate::config::ConfigError;
use crate::engine::{Engine, EngineError, FrameReport};
use crate::input::{KeyCode, MouseButton};
use thiserror::Error;

/// A game driven by [`Engine::run`]
///
/// Per frame the engine calls `update`, runs the frame pipeline, then calls
/// `frame_finished`. `cleanup` is called exactly once, even when
/// `initialize` or a frame failed.
pub trait Application {
    /// Register models and build the starting scene
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Per-frame game logic that lives outside node behaviours
    ///
    /// `delta_time` is the clipped wall-clock delta the frame will use.
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// What the frame just simulated and drew
    fn frame_finished(&mut self, _engine: &mut Engine, _report: &FrameReport) {}

    /// React to a window or input event; the default feeds it to the engine
    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        engine.handle_event(event);
        Ok(())
    }

    /// Release whatever `initialize` acquired
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Errors an application hands back to the main loop
#[derive(Error, Debug)]
pub enum AppError {
    /// Failure inside the engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Game configuration rejected
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Anything else the game decides is fatal
    #[error("Game logic error: {0}")]
    GameLogic(String),
}

/// Window and input events
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Framebuffer size changed; the camera aspect follows it
    WindowResized {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// Stop after the current frame
    WindowCloseRequested,

    /// Key went down or up
    KeyInput {
        /// Key
        key: KeyCode,
        /// `true` on press
        pressed: bool,
    },

    /// Mouse button went down or up
    MouseButton {
        /// Button
        button: MouseButton,
        /// `true` on press
        pressed: bool,
    },

    /// Cursor position in window coordinates
    MouseMoved {
        /// Horizontal position
        x: f64,
        /// Vertical position
        y: f64,
    },

    /// Scroll wheel moved
    MouseWheel {
        /// Horizontal scroll
        delta_x: f64,
        /// Vertical scroll
        delta_y: f64,
    },
}
