//! Shader modules.

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use ash::vk;
use flare_shaders::ShaderStage;
use std::sync::Arc;

/// Vulkan stage flag for a shader stage.
pub const fn stage_flags(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

/// A SPIR-V module registered with the device, tagged with its stage.
pub struct ShaderModule {
    ctx: Arc<DeviceContext>,
    handle: vk::ShaderModule,
    stage: ShaderStage,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words.
    pub fn new(ctx: &Arc<DeviceContext>, code: &[u32], stage: ShaderStage) -> Result<Self> {
        if code.is_empty() {
            return Err(GpuError::PipelineCreation("empty shader code".to_string()));
        }
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        // SAFETY: the code is non-empty; the driver validates the rest.
        let handle = unsafe { ctx.device().create_shader_module(&create_info, None) }?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            handle,
            stage,
        })
    }

    /// Get the raw module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    /// Stage the module was compiled for.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Vulkan stage flag of the module.
    pub fn stage_flags(&self) -> vk::ShaderStageFlags {
        stage_flags(self.stage)
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        // SAFETY: pipelines do not keep modules alive past creation.
        unsafe { self.ctx.device().destroy_shader_module(self.handle, None) };
    }
}
