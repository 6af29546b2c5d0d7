//! The per-frame render loop.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use flare_gpu::command::{begin_command_buffer, end_command_buffer};
use flare_gpu::error::{GpuError, Result};
use flare_gpu::{
    AcquireOutcome, DeviceContext, GraphicsPipeline, GraphicsPipelineConfig, PipelineLayout,
    PresentOutcome, ShaderModule, Swapchain, MAX_FRAMES_IN_FLIGHT,
};
use flare_render::{create_canvas_mesh, GlobalConstants, Mesh, Vertex};
use tracing::{debug, error, info};

/// Background color behind the canvas.
pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// What happened to one [`FrameDriver::draw_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was rendered and presented.
    Presented,
    /// Nothing was rendered; try again next frame.
    Skipped,
    /// The swapchain will be rebuilt before the next frame.
    NeedsRebuild,
}

impl From<PresentOutcome> for FrameStatus {
    fn from(outcome: PresentOutcome) -> Self {
        if outcome.needs_rebuild() {
            Self::NeedsRebuild
        } else {
            Self::Presented
        }
    }
}

fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Renders the canvas quad with one fragment shader, frame after frame.
///
/// Owns the swapchain and everything built against it. Dropping the driver
/// waits for the device to go idle first.
pub struct FrameDriver {
    pipeline: GraphicsPipeline,
    layout: Arc<PipelineLayout>,
    shaders: Vec<Arc<ShaderModule>>,
    mesh: Mesh,
    swapchain: Swapchain,
    command_buffers: Vec<vk::CommandBuffer>,
    ctx: Arc<DeviceContext>,
    start_time: Instant,
    frame_count: u64,
    needs_rebuild: bool,
}

impl FrameDriver {
    pub fn new(
        ctx: &Arc<DeviceContext>,
        vertex: Arc<ShaderModule>,
        fragment: Arc<ShaderModule>,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(ctx, window_extent)?;
        info!(
            "Swapchain created: {}x{} ({} images, {:?})",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.size(),
            swapchain.present_mode()
        );

        let layout = Arc::new(PipelineLayout::new(
            ctx,
            &[GlobalConstants::push_constant_range()],
        )?);
        let shaders = vec![vertex, fragment];
        let pipeline = create_canvas_pipeline(ctx, &layout, &shaders, swapchain.render_pass())?;
        let mesh = create_canvas_mesh(ctx)?;
        let command_buffers = ctx.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        Ok(Self {
            pipeline,
            layout,
            shaders,
            mesh,
            swapchain,
            command_buffers,
            ctx: Arc::clone(ctx),
            start_time: Instant::now(),
            frame_count: 0,
            needs_rebuild: false,
        })
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Rebuild the swapchain before the next frame.
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Acquire, record, submit and present one frame.
    ///
    /// Only fatal errors are returned; everything else is reported through
    /// [`FrameStatus`].
    pub fn draw_frame(&mut self, window_extent: vk::Extent2D) -> Result<FrameStatus> {
        if is_zero_area(window_extent) {
            return Ok(FrameStatus::Skipped);
        }
        if self.needs_rebuild {
            self.rebuild(window_extent)?;
        }

        let token = match self.swapchain.acquire_next_image()? {
            AcquireOutcome::Ready(token) => token,
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire");
                self.needs_rebuild = true;
                return Ok(FrameStatus::NeedsRebuild);
            }
            AcquireOutcome::Skipped(_) => return Ok(FrameStatus::Skipped),
        };

        let cmd = self.command_buffers[token.slot()];
        if let Err(e) = self.record(cmd, token.image_index()) {
            error!("Failed to record frame: {e}");
            self.swapchain.cancel(token)?;
            self.needs_rebuild = true;
            return Ok(FrameStatus::NeedsRebuild);
        }

        let outcome = self.swapchain.submit(cmd, token)?;
        if !matches!(outcome, PresentOutcome::Failed(_)) {
            self.frame_count += 1;
        }

        let status = FrameStatus::from(outcome);
        if status == FrameStatus::NeedsRebuild {
            self.needs_rebuild = true;
        }
        Ok(status)
    }

    /// Recreate the swapchain and the pipeline built on its render pass.
    ///
    /// A zero-area window postpones the rebuild.
    pub fn rebuild(&mut self, window_extent: vk::Extent2D) -> Result<()> {
        if is_zero_area(window_extent) {
            self.needs_rebuild = true;
            return Ok(());
        }

        self.swapchain.recreate(window_extent)?;
        self.pipeline = create_canvas_pipeline(
            &self.ctx,
            &self.layout,
            &self.shaders,
            self.swapchain.render_pass(),
        )?;
        self.needs_rebuild = false;

        info!(
            "Swapchain rebuilt: {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }

    fn record(&self, cmd: vk::CommandBuffer, image_index: u32) -> Result<()> {
        let device = self.ctx.device();
        let framebuffer = self.swapchain.framebuffer(image_index).ok_or_else(|| {
            GpuError::FrameProtocol(format!("no framebuffer for image {image_index}"))
        })?;
        let extent = self.swapchain.extent();

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        let constants = GlobalConstants::new(extent, self.start_time.elapsed().as_secs_f32());

        // SAFETY: the slot's fence was waited on at acquire, so `cmd` is not
        // pending, and every handle recorded here belongs to this device.
        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            self.pipeline.bind(cmd);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
            device.cmd_push_constants(
                cmd,
                self.layout.handle(),
                vk::ShaderStageFlags::FRAGMENT,
                0,
                constants.as_bytes(),
            );
            self.mesh.bind(cmd);
            self.mesh.draw(cmd);
            device.cmd_end_render_pass(cmd);

            end_command_buffer(device, cmd)?;
        }

        Ok(())
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            error!("Failed to wait for device idle: {e}");
        }
        // SAFETY: the device is idle, so no buffer is pending.
        unsafe { self.ctx.free_command_buffers(&self.command_buffers) };
        debug!("Frame driver destroyed after {} frames", self.frame_count);
    }
}

fn create_canvas_pipeline(
    ctx: &Arc<DeviceContext>,
    layout: &Arc<PipelineLayout>,
    shaders: &[Arc<ShaderModule>],
    render_pass: vk::RenderPass,
) -> Result<GraphicsPipeline> {
    let config = GraphicsPipelineConfig {
        vertex_bindings: Vertex::binding_descriptions(),
        vertex_attributes: Vertex::attribute_descriptions(),
        // The render pass has no depth attachment.
        depth_test: false,
        depth_write: false,
        render_pass,
        ..GraphicsPipelineConfig::default()
    };
    GraphicsPipeline::new(ctx, Arc::clone(layout), shaders, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_present_outcome() {
        assert_eq!(
            FrameStatus::from(PresentOutcome::Presented),
            FrameStatus::Presented
        );
        assert_eq!(
            FrameStatus::from(PresentOutcome::Suboptimal),
            FrameStatus::NeedsRebuild
        );
        assert_eq!(
            FrameStatus::from(PresentOutcome::OutOfDate),
            FrameStatus::NeedsRebuild
        );
        assert_eq!(
            FrameStatus::from(PresentOutcome::Failed(vk::Result::ERROR_UNKNOWN)),
            FrameStatus::NeedsRebuild
        );
    }

    #[test]
    fn zero_area() {
        assert!(is_zero_area(vk::Extent2D {
            width: 0,
            height: 600
        }));
        assert!(is_zero_area(vk::Extent2D {
            width: 800,
            height: 0
        }));
        assert!(!is_zero_area(vk::Extent2D {
            width: 1,
            height: 1
        }));
    }
}
