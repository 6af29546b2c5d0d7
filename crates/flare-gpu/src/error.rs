//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan library could not be loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No enumerated device has the required queues and extensions.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No memory type matches the type mask and property flags.
    #[error("No memory type matches mask {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// A buffer could not be created or filled.
    #[error("Buffer creation failed: {0}")]
    BufferCreation(String),

    /// Buffer write with the wrong byte length.
    #[error("Buffer size mismatch: buffer holds {expected} bytes, data has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The buffer memory could not be mapped.
    #[error("Failed to map buffer memory")]
    MapFailed,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Acquire and submit were not called as a pair.
    #[error("Frame protocol violation: {0}")]
    FrameProtocol(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
