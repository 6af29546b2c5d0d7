//! Core types and settings for the Flare engine.
//!
//! This crate provides the pieces shared by every other engine crate:
//! - The engine-wide error type
//! - The persisted settings document
//! - Engine constants

pub mod error;
pub mod settings;

pub use error::{Error, Result};
pub use settings::Settings;

/// Engine-wide constants
pub mod constants {
    /// Engine name reported to the graphics driver
    pub const ENGINE_NAME: &str = "Flare";
    /// Engine version as (major, minor, patch)
    pub const ENGINE_VERSION: (u32, u32, u32) = (0, 1, 0);
    /// Default settings file name, relative to the working directory
    pub const SETTINGS_FILE: &str = "flare.json";
    /// Default directory scanned for precompiled shaders
    pub const SHADER_DIR: &str = "shaders";
    /// Log file name; the daily rotation appends the date
    pub const LOG_FILE: &str = "flare.log";
}
