//! Vulkan abstraction layer for the Flare engine.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - Physical device selection
//! - Buffers with explicit memory type resolution
//! - Command pool and one-shot command submission
//! - Swapchain handling with frames in flight
//! - Graphics pipelines and shader modules

pub mod capabilities;
pub mod command;
pub mod context;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{DeviceCandidate, GpuVendor, QueueFamilyIndices};
pub use context::{DeviceContext, DeviceContextBuilder};
pub use error::{GpuError, Result};
pub use memory::GpuBuffer;
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig, PipelineLayout};
pub use shader::ShaderModule;
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{AcquireOutcome, FrameToken, PresentOutcome, Swapchain, SwapchainPlan};
pub use sync::{FrameSlots, FrameSync, SlotFence, MAX_FRAMES_IN_FLIGHT};

pub use ash::vk;
