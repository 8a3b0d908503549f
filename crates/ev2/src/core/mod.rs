//! # Core Engine Module
//!
//! Shared configuration for every engine subsystem.

pub mod config;

pub use config::{
    ApplicationConfig,
    AssetConfig,
    Config,
    ConfigError,
    EngineConfig,
    PhysicsConfig,
    RenderConfig,
};
