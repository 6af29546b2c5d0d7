//! Shader handling for the Flare engine.
//!
//! This crate is the bridge between shader sources and the GPU crate:
//! - GLSL to SPIR-V compilation via shaderc
//! - Loading precompiled SPIR-V from disk
//! - The built-in canvas and default shaders

pub mod compiler;
pub mod error;
pub mod spirv;
pub mod stage;

pub use compiler::ShaderCompiler;
pub use error::{Result, ShaderError};
pub use spirv::{bytes_to_spirv, load_spirv_dir, SpirvFile, SPIRV_MAGIC};
pub use stage::ShaderStage;

/// Built-in GLSL sources.
pub mod builtin {
    /// Registered name of the full-screen canvas vertex shader.
    pub const CANVAS_VERT_NAME: &str = "canvas.vert";
    /// Registered name of the fallback fragment shader.
    pub const DEFAULT_FRAG_NAME: &str = "default.frag";

    /// Pass-through vertex shader for the canvas quad.
    pub const CANVAS_VERT: &str = include_str!("../shaders/canvas.vert");
    /// Animated fallback fragment shader driven by the global push constants.
    pub const DEFAULT_FRAG: &str = include_str!("../shaders/default.frag");
}
