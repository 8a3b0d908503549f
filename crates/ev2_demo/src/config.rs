//! Demo configuration
//!
//! Loaded from a `.toml` or `.ron` file given on the command line. Missing
//! sections and fields keep their defaults.

use ev2::config::{Config, ConfigError};
use ev2::core::config::{ApplicationConfig, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Game configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Gameplay settings
    pub gameplay: GameplayConfig,

    /// Camera settings
    pub camera: CameraConfig,

    /// Session settings
    pub session: SessionConfig,
}

/// Gameplay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Seed for ball placement
    pub seed: u64,

    /// Seconds between spawns
    pub spawn_interval: f32,

    /// Live balls allowed at once
    pub max_balls: usize,

    /// Ball collider radius
    pub ball_radius: f32,

    /// Lifetime range in seconds (min, max)
    pub ball_lifetime: (f32, f32),

    /// Height balls are dropped from
    pub spawn_height: f32,

    /// Half width of the pit floor
    pub pit_half_extent: f32,

    /// Balls falling below this height are removed
    pub kill_height: f32,

    /// Registered model used for balls
    pub ball_model: String,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            spawn_interval: 0.25,
            max_balls: 48,
            ball_radius: 0.4,
            ball_lifetime: (3.0, 8.0),
            spawn_height: 10.0,
            pit_half_extent: 6.0,
            kill_height: -20.0,
            ball_model: "ball".to_string(),
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Starting distance from the pit centre
    pub orbit_radius: f32,

    /// Height above the pit
    pub orbit_height: f32,

    /// Idle orbit speed (radians per second)
    pub orbit_speed: f32,

    /// Extra orbit speed while turning (radians per second)
    pub turn_speed: f32,

    /// Zoom speed (units per second)
    pub zoom_speed: f32,

    /// Vertical field of view
    pub fov_degrees: f32,

    /// Longest pick ray
    pub pick_range: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            orbit_radius: 18.0,
            orbit_height: 8.0,
            orbit_speed: 0.2,
            turn_speed: 1.2,
            zoom_speed: 6.0,
            fov_degrees: 60.0,
            pick_range: 100.0,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Frames to run before exiting (0 runs until closed)
    pub frames: u64,

    /// Frame rate cap
    pub target_fps: Option<u32>,

    /// Log level for the engine
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            target_fps: Some(60),
            log_level: "info".to_string(),
        }
    }
}

impl Config for GameConfig {}

impl GameConfig {
    /// Load from `path`, falling back to defaults on any error
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load_or_default(path).and_then(|config| config.validate().map(|()| config)) {
            Ok(config) => {
                log::info!("Loaded game config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring game config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Check ranges the game logic relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gameplay = &self.gameplay;
        if !(gameplay.spawn_interval > 0.0) {
            return Err(ConfigError::Invalid("spawn_interval must be positive".to_string()));
        }
        if !(gameplay.ball_radius > 0.0) || !(gameplay.pit_half_extent > 0.0) {
            return Err(ConfigError::Invalid("ball_radius and pit_half_extent must be positive".to_string()));
        }
        let (min, max) = gameplay.ball_lifetime;
        if !(min > 0.0 && min <= max) {
            return Err(ConfigError::Invalid(format!("invalid ball_lifetime ({min}, {max})")));
        }
        if !(self.camera.orbit_radius > 0.0) {
            return Err(ConfigError::Invalid("orbit_radius must be positive".to_string()));
        }
        Ok(())
    }

    /// Engine settings derived from the session section
    pub fn application_config(&self) -> ApplicationConfig {
        let mut engine = EngineConfig::new().with_log_level(self.session.log_level.clone());
        engine.target_fps = self.session.target_fps;
        engine.max_frames = (self.session.frames > 0).then_some(self.session.frames);
        ApplicationConfig {
            engine,
            ..ApplicationConfig::default()
        }
    }
}
