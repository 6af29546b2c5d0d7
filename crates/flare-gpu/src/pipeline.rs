//! Graphics pipeline state objects.

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use crate::shader::ShaderModule;
use ash::vk;
use std::sync::Arc;

/// Entry point of every shader stage.
pub const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Pipeline layout with push-constant ranges and no descriptor sets.
pub struct PipelineLayout {
    ctx: Arc<DeviceContext>,
    handle: vk::PipelineLayout,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineLayout {
    /// Create a pipeline layout.
    pub fn new(
        ctx: &Arc<DeviceContext>,
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> Result<Self> {
        let layout_info =
            vk::PipelineLayoutCreateInfo::default().push_constant_ranges(push_constant_ranges);

        // SAFETY: the create info is fully initialized.
        let handle = unsafe { ctx.device().create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            handle,
            push_constant_ranges: push_constant_ranges.to_vec(),
        })
    }

    /// Get the raw layout handle.
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Push-constant ranges the layout was created with.
    pub fn push_constant_ranges(&self) -> &[vk::PushConstantRange] {
        &self.push_constant_ranges
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        // SAFETY: pipelines built on this layout hold an Arc to it.
        unsafe { self.ctx.device().destroy_pipeline_layout(self.handle, None) };
    }
}

/// Fixed-function state of a graphics pipeline.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    pub stencil_test: bool,
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
    /// State set while recording instead of baked into the pipeline.
    pub dynamic_states: Vec<vk::DynamicState>,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            stencil_test: false,
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }
}

/// Immutable graphics pipeline.
pub struct GraphicsPipeline {
    ctx: Arc<DeviceContext>,
    layout: Arc<PipelineLayout>,
    handle: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Build a pipeline from shader modules and fixed-function state.
    ///
    /// Each module becomes one stage with entry point `main`. The render
    /// pass in `config` must be valid.
    pub fn new(
        ctx: &Arc<DeviceContext>,
        layout: Arc<PipelineLayout>,
        shaders: &[Arc<ShaderModule>],
        config: &GraphicsPipelineConfig,
    ) -> Result<Self> {
        if config.render_pass == vk::RenderPass::null() {
            return Err(GpuError::PipelineCreation("no render pass".to_string()));
        }

        let shader_stages: Vec<_> = shaders
            .iter()
            .map(|shader| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader.stage_flags())
                    .module(shader.handle())
                    .name(SHADER_ENTRY_POINT)
            })
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.topology)
            .primitive_restart_enable(config.primitive_restart);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(config.samples)
            .sample_shading_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(config.stencil_test);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(config.blend_enable)
            .color_write_mask(config.color_write_mask)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&config.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(config.render_pass)
            .subpass(config.subpass);

        // SAFETY: every referenced object is alive for the call.
        let pipelines = unsafe {
            ctx.device()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_pipelines, e)| GpuError::PipelineCreation(e.to_string()))?;

        let handle = pipelines
            .first()
            .copied()
            .ok_or_else(|| GpuError::PipelineCreation("driver returned no pipeline".to_string()))?;

        tracing::debug!("Created graphics pipeline {:?}", handle);

        Ok(Self {
            ctx: Arc::clone(ctx),
            layout,
            handle,
        })
    }

    /// Get the raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    /// Layout the pipeline was built with.
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    /// Record a bind of this pipeline.
    ///
    /// # Safety
    /// `cmd` must be recording and come from the pipeline's device.
    pub unsafe fn bind(&self, cmd: vk::CommandBuffer) {
        self.ctx
            .device()
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.handle);
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        tracing::debug!("Dropping graphics pipeline {:?}", self.handle);
        // SAFETY: owners wait for the device before dropping pipelines.
        unsafe { self.ctx.device().destroy_pipeline(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert!(!config.primitive_restart);
        assert_eq!(config.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(config.samples, vk::SampleCountFlags::TYPE_1);
        assert!(config.depth_test && config.depth_write);
        assert_eq!(config.depth_compare_op, vk::CompareOp::LESS);
        assert!(!config.stencil_test);
        assert!(!config.blend_enable);
        assert_eq!(config.color_write_mask, vk::ColorComponentFlags::RGBA);
        assert_eq!(
            config.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(config.subpass, 0);
    }
}
