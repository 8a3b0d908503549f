//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Shared ownership handles for the scene graph
//! - Math types and operations
//! - Time management
//! - Logging utilities

pub mod reference;
pub mod math;
pub mod time;
pub mod logging;
