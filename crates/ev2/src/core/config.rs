//! Engine settings, one section per subsystem
//!
//! All configuration structures for the engine subsystems. Every section is
//! `#[serde(default)]`, so a config file only needs the keys it changes.
//!
//! Sections:
//!
//! - **Engine Config**: logging, frame pacing, debug features
//! - **Physics Config**: fixed timestep, sub-step cap, gravity
//! - **Render Config**: projection aspect, light budget, fallback material colour
//! - **Asset Config**: fallback material policy

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// Main loop settings
///
/// Log filter, frame pacing and the optional frame cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Extra checks and logging; on in debug builds
    pub debug_mode: bool,
    /// Sleep to hold this rate; `None` runs flat out
    pub target_fps: Option<u32>,
    /// Stop the main loop after this many frames
    pub max_frames: Option<u64>,
}

impl EngineConfig {
    /// Defaults: `info` logging, unpaced, no frame cap
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: cfg!(debug_assertions),
            target_fps: None,
            max_frames: None,
        }
    }

    /// Replace the default log filter
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Pace the loop to `fps` frames per second
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Bound the number of frames the main loop runs
    #[must_use]
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-step settings
///
/// Fixed-timestep integration parameters for the physics bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Simulation step in seconds
    pub fixed_timestep: f32,
    /// Maximum steps taken in one frame before the backlog is dropped
    pub max_substeps: u32,
    /// World gravity in m/s²
    pub gravity: [f32; 3],
}

impl PhysicsConfig {
    /// Create a new physics configuration (60 Hz, earth gravity)
    pub fn new() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 5,
            gravity: [0.0, -9.81, 0.0],
        }
    }

    /// Set the fixed timestep
    #[must_use]
    pub fn with_fixed_timestep(mut self, seconds: f32) -> Self {
        self.fixed_timestep = seconds;
        self
    }

    /// Set gravity
    #[must_use]
    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the sub-step cap
    #[must_use]
    pub fn with_max_substeps(mut self, steps: u32) -> Self {
        self.max_substeps = steps;
        self
    }

    /// Reject values the subsystem cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "physics.fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::Invalid("physics.max_substeps must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry and projection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Viewport aspect ratio used for the active camera's projection
    pub aspect_ratio: f32,
    /// Capacity of the light table
    pub max_lights: usize,
    /// Base colour of the registry's default material
    pub default_base_color: [f32; 4],
}

impl RenderConfig {
    /// 16:9, sixteen lights, light grey fallback
    pub fn new() -> Self {
        Self {
            aspect_ratio: 16.0 / 9.0,
            max_lights: 16,
            default_base_color: [0.8, 0.8, 0.8, 1.0],
        }
    }

    /// Viewport width over height
    #[must_use]
    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Capacity of the light table
    #[must_use]
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Reject values the subsystem cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "render.aspect_ratio must be positive, got {}",
                self.aspect_ratio
            )));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Model lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Substitute the default material when a model's material slot is missing
    pub use_fallback_material: bool,
}

impl AssetConfig {
    /// Fallback material on
    pub fn new() -> Self {
        Self {
            use_fallback_material: true,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything [`Engine::new`](crate::Engine::new) needs
///
/// Loaded from TOML or RON; missing sections keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Main loop
    pub engine: EngineConfig,
    /// Physics bridge configuration
    pub physics: PhysicsConfig,
    /// Rendering configuration
    pub render: RenderConfig,
    /// Model loading
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.physics.validate()?;
        self.render.validate()?;
        Ok(())
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [physics]
            fixed_timestep = 0.01

            [engine]
            max_frames = 120
        "#;
        let config = ApplicationConfig::from_str_as(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.physics.fixed_timestep, 0.01);
        assert_eq!(config.physics.max_substeps, 5);
        assert_eq!(config.engine.max_frames, Some(120));
        assert_eq!(config.render.max_lights, 16);
    }

    #[test]
    fn test_asset_section_only_carries_fallback_policy() {
        let text = r#"
            [assets]
            assets_dir = "old/location"
            use_fallback_material = false
        "#;
        let config = ApplicationConfig::from_str_as(text, ConfigFormat::Toml).unwrap();
        assert!(!config.assets.use_fallback_material);

        let written = config.to_string_as(ConfigFormat::Toml).unwrap();
        assert!(!written.contains("assets_dir"));
    }

    #[test]
    fn test_ron_round_trip() {
        let config = ApplicationConfig {
            physics: PhysicsConfig::new().with_gravity([0.0, 0.0, 0.0]),
            ..Default::default()
        };
        let text = config.to_string_as(ConfigFormat::Ron).unwrap();
        let parsed = ApplicationConfig::from_str_as(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed.physics.gravity, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_validation_rejects_zero_timestep() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());
        config.physics.fixed_timestep = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = ApplicationConfig::load_from_file("settings.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
