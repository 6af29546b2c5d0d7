//! Shader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while compiling or loading shaders.
#[derive(Error, Debug)]
pub enum ShaderError {
    /// The compiler rejected the source.
    #[error("Failed to compile shader '{name}' ({status}): {message}")]
    Compile {
        name: String,
        status: String,
        message: String,
    },

    /// The compiler could not be initialized.
    #[error("Shader compiler unavailable: {0}")]
    CompilerUnavailable(String),

    /// Only vertex and fragment stages are supported.
    #[error("Unsupported shader stage: {0}")]
    UnsupportedStage(String),

    /// The bytes are not a SPIR-V module.
    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(String),

    /// Reading a shader file failed.
    #[error("Failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ShaderError>;
