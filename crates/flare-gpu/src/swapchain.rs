//! Swapchain management.
//!
//! A [`Swapchain`] owns the presentable images, one view and framebuffer per
//! image, the render pass drawing into them and the frame-in-flight slots.
//! Frames go through [`Swapchain::acquire_next_image`] and then exactly one
//! of [`Swapchain::submit`] or [`Swapchain::cancel`].

use crate::capabilities::QueueFamilyIndices;
use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceSupport;
use crate::sync::{FrameSlots, FrameSync, MAX_FRAMES_IN_FLIGHT};
use ash::vk;
use std::sync::Arc;

/// Surface format used when the surface supports it.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Select the surface format: the preferred one if listed, else the first.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| GpuError::SwapchainCreation("surface reports no formats".to_string()))
}

/// Select the present mode: mailbox if available, else FIFO.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // Always supported
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// A current extent of `u32::MAX` means the surface size follows the
/// swapchain, so the window extent is clamped into the supported range.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        // Min wins when a report has min > max.
        vk::Extent2D {
            width: window_extent
                .width
                .min(capabilities.max_image_extent.width)
                .max(capabilities.min_image_extent.width),
            height: window_extent
                .height
                .min(capabilities.max_image_extent.height)
                .max(capabilities.min_image_extent.height),
        }
    }
}

/// One more image than the minimum, capped by the maximum when there is one.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

fn select_composite_alpha(
    supported: vk::CompositeAlphaFlagsKHR,
) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&flag| supported.contains(flag))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Swapchain parameters negotiated from a surface report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub sharing_mode: vk::SharingMode,
    /// Families sharing the images; empty for exclusive sharing.
    pub queue_family_indices: Vec<u32>,
}

impl SwapchainPlan {
    /// Decide format, present mode, extent, image count and sharing.
    pub fn negotiate(
        support: &SurfaceSupport,
        window_extent: vk::Extent2D,
        queue_families: QueueFamilyIndices,
    ) -> Result<Self> {
        let capabilities = &support.capabilities;

        let (sharing_mode, queue_family_indices) = if queue_families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, queue_families.unique())
        };

        Ok(Self {
            surface_format: select_surface_format(&support.formats)?,
            present_mode: select_present_mode(&support.present_modes),
            extent: calculate_extent(capabilities, window_extent),
            image_count: choose_image_count(capabilities),
            pre_transform: capabilities.current_transform,
            composite_alpha: select_composite_alpha(capabilities.supported_composite_alpha),
            sharing_mode,
            queue_family_indices,
        })
    }
}

/// Proof that a frame was acquired. Consumed by [`Swapchain::submit`] or
/// [`Swapchain::cancel`].
#[derive(Debug)]
#[must_use = "an acquired frame must be submitted or cancelled"]
pub struct FrameToken {
    slot: usize,
    image_index: u32,
    suboptimal: bool,
    swapchain: vk::SwapchainKHR,
}

impl FrameToken {
    /// Frame slot captured at acquire time.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Index of the acquired swapchain image.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Whether the acquire reported the swapchain as suboptimal.
    pub fn suboptimal(&self) -> bool {
        self.suboptimal
    }
}

/// Result of [`Swapchain::acquire_next_image`].
#[derive(Debug)]
pub enum AcquireOutcome {
    /// An image was acquired; render into it.
    Ready(FrameToken),
    /// The swapchain no longer matches the surface and must be rebuilt.
    OutOfDate,
    /// No image was acquired this time.
    Skipped(vk::Result),
}

/// Result of [`Swapchain::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented, but the swapchain should be rebuilt.
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt.
    OutOfDate,
    /// Submission or presentation failed. The frame slot has still advanced.
    Failed(vk::Result),
}

impl PresentOutcome {
    /// Whether the swapchain should be rebuilt before the next frame.
    pub const fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

fn is_fatal(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_DEVICE_LOST | vk::Result::ERROR_SURFACE_LOST_KHR
    )
}

/// Swapchain wrapper.
pub struct Swapchain {
    ctx: Arc<DeviceContext>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    frames: FrameSlots<FrameSync>,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create a swapchain for the context's surface.
    ///
    /// `window_extent` is the framebuffer size in pixels; it is only used
    /// when the surface leaves the extent to the swapchain.
    pub fn new(ctx: &Arc<DeviceContext>, window_extent: vk::Extent2D) -> Result<Self> {
        Self::build(ctx, window_extent, vk::SwapchainKHR::null())
    }

    /// Replace this swapchain with a new one for the current surface state.
    ///
    /// Waits for the device to go idle. Fails if a frame is in progress.
    pub fn recreate(&mut self, window_extent: vk::Extent2D) -> Result<()> {
        if let Some(slot) = self.frames.pending() {
            return Err(GpuError::FrameProtocol(format!(
                "cannot rebuild the swapchain while the frame in slot {slot} is in progress"
            )));
        }
        self.ctx.wait_idle()?;
        let replacement = Self::build(&self.ctx, window_extent, self.handle)?;
        // The old swapchain is retired and dropped here.
        *self = replacement;
        Ok(())
    }

    fn build(
        ctx: &Arc<DeviceContext>,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let surface = ctx.surface().ok_or_else(|| {
            GpuError::SwapchainCreation("device was created without a surface".to_string())
        })?;
        let loader = ctx.swapchain_loader()?;
        let device = ctx.device();

        // SAFETY: the surface and physical device belong to the context.
        let support = unsafe { surface.query_support(ctx.physical_device()) }?;
        let plan = SwapchainPlan::negotiate(&support, window_extent, ctx.queue_families())?;

        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(ctx))
            .collect::<Result<Vec<_>>>()?;

        // Fields are filled in as objects are created, so a failure part way
        // destroys whatever exists.
        let mut swapchain = Self {
            ctx: Arc::clone(ctx),
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            frames: FrameSlots::new(slots),
            format: plan.surface_format.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // SAFETY: all handles in the create info are valid.
        unsafe {
            swapchain.handle = loader
                .create_swapchain(&create_info, None)
                .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
            swapchain.images = loader.get_swapchain_images(swapchain.handle)?;

            for &image in &swapchain.images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(swapchain.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );
                swapchain
                    .image_views
                    .push(device.create_image_view(&view_info, None)?);
            }

            swapchain.render_pass = create_render_pass(device, swapchain.format)?;

            for &view in &swapchain.image_views {
                let attachments = [view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(swapchain.render_pass)
                    .attachments(&attachments)
                    .width(plan.extent.width)
                    .height(plan.extent.height)
                    .layers(1);
                swapchain
                    .framebuffers
                    .push(device.create_framebuffer(&framebuffer_info, None)?);
            }
        }

        tracing::info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            plan.extent.width,
            plan.extent.height,
            swapchain.images.len(),
            plan.surface_format.format,
            plan.present_mode
        );

        Ok(swapchain)
    }

    /// Number of presentable images.
    pub fn size(&self) -> usize {
        self.images.len()
    }

    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Render pass drawing into the swapchain images.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for a swapchain image.
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    /// Image format.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Selected present mode.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Frame slot the next acquire uses.
    pub fn current_frame(&self) -> usize {
        self.frames.current_index()
    }

    /// Wait for the current frame slot to be free, then acquire an image.
    ///
    /// The slot's fence is reset only when an image was acquired, so a
    /// skipped frame leaves the slot reusable.
    pub fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        self.frames.wait_current()?;
        let loader = self.ctx.swapchain_loader()?;
        let semaphore = self.frames.current().image_available;

        // SAFETY: the semaphore is unsignaled: its previous signal was
        // consumed by the slot's last submission, which the fence wait covers.
        let acquired = unsafe {
            loader.acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };

        match acquired {
            Ok((image_index, suboptimal)) => {
                let slot = self.frames.begin()?;
                Ok(AcquireOutcome::Ready(FrameToken {
                    slot,
                    image_index,
                    suboptimal,
                    swapchain: self.handle,
                }))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) if is_fatal(e) => Err(e.into()),
            Err(e) => {
                tracing::warn!("Failed to acquire swapchain image: {e}");
                Ok(AcquireOutcome::Skipped(e))
            }
        }
    }

    /// Submit `cmd` for the acquired frame and present its image.
    ///
    /// The submission waits for the image at the color-attachment stage,
    /// signals the slot's render-finished semaphore and fence, and the
    /// present waits on that semaphore. The frame slot advances whether or
    /// not submission and presentation succeed.
    pub fn submit(&mut self, cmd: vk::CommandBuffer, token: FrameToken) -> Result<PresentOutcome> {
        self.check_token(&token)?;
        let slot = token.slot;
        let sync = self
            .frames
            .get(slot)
            .ok_or_else(|| GpuError::FrameProtocol(format!("unknown frame slot {slot}")))?;

        let device = self.ctx.device();
        let loader = self.ctx.swapchain_loader()?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let queues = self.ctx.lock_queues();

        // SAFETY: the queue lock is held and the fence was reset at acquire.
        let submitted =
            unsafe { device.queue_submit(self.ctx.graphics_queue(), &[submit_info], sync.in_flight) };
        if let Err(e) = submitted {
            drop(queues);
            tracing::error!("Failed to submit frame: {e}");
            self.frames.abandon(slot)?;
            return if is_fatal(e) {
                Err(e.into())
            } else {
                Ok(PresentOutcome::Failed(e))
            };
        }

        let swapchains = [self.handle];
        let image_indices = [token.image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: the queue lock is held and the image was acquired.
        let presented = unsafe { loader.queue_present(self.ctx.present_queue(), &present_info) };
        drop(queues);

        self.frames.finish(slot)?;

        match presented {
            Ok(false) if !token.suboptimal => Ok(PresentOutcome::Presented),
            Ok(_) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) if is_fatal(e) => Err(e.into()),
            Err(e) => {
                tracing::warn!("Failed to present: {e}");
                Ok(PresentOutcome::Failed(e))
            }
        }
    }

    /// Give up on an acquired frame without rendering.
    ///
    /// An empty submission consumes the image-available semaphore and
    /// signals the slot's fence, then the slot advances. The image itself
    /// stays acquired, so the swapchain should be rebuilt afterwards.
    pub fn cancel(&mut self, token: FrameToken) -> Result<()> {
        self.check_token(&token)?;
        let slot = token.slot;
        let sync = self
            .frames
            .get(slot)
            .ok_or_else(|| GpuError::FrameProtocol(format!("unknown frame slot {slot}")))?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        let submitted = {
            let _queues = self.ctx.lock_queues();
            // SAFETY: the queue lock is held and the fence was reset at acquire.
            unsafe {
                self.ctx.device().queue_submit(
                    self.ctx.graphics_queue(),
                    &[submit_info],
                    sync.in_flight,
                )
            }
        };

        match submitted {
            Ok(()) => self.frames.finish(slot),
            Err(e) => {
                tracing::error!("Failed to cancel frame: {e}");
                self.frames.abandon(slot)?;
                if is_fatal(e) {
                    Err(e.into())
                } else {
                    Ok(())
                }
            }
        }
    }

    fn check_token(&self, token: &FrameToken) -> Result<()> {
        if token.swapchain != self.handle {
            return Err(GpuError::FrameProtocol(
                "frame was acquired from a different swapchain".to_string(),
            ));
        }
        self.frames.check_pending(token.slot)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        tracing::debug!("Dropping swapchain {:?}", self.handle);
        let device = self.ctx.device();
        // SAFETY: waiting for idle guarantees no submitted frame still uses
        // these objects. Null handles are ignored.
        unsafe {
            let _ = self.ctx.wait_idle();
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            if let Ok(loader) = self.ctx.swapchain_loader() {
                loader.destroy_swapchain(self.handle, None);
            }
        }
    }
}

/// Single-subpass render pass that clears the color attachment and leaves it
/// ready for presentation.
unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    // The layout transition must wait for the image-available semaphore,
    // which is waited on at the color-attachment-output stage.
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    Ok(device.create_render_pass(&create_info, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(
        current: (u32, u32),
        min: (u32, u32),
        max: (u32, u32),
        image_counts: (u32, u32),
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: image_counts.0,
            max_image_count: image_counts.1,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        }
    }

    const SHARED: QueueFamilyIndices = QueueFamilyIndices {
        graphics: 0,
        present: 0,
    };

    #[test]
    fn prefers_bgra_unorm_srgb() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(
            select_surface_format(&available).unwrap(),
            PREFERRED_SURFACE_FORMAT
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        let available = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(select_surface_format(&available).unwrap(), available[0]);
        assert!(select_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_preference() {
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(select_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn fixed_extent_is_used_verbatim() {
        let caps = capabilities((800, 600), (1, 1), (4096, 4096), (2, 3));
        let extent = calculate_extent(&caps, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn undefined_extent_is_clamped_to_max() {
        let caps = capabilities((u32::MAX, u32::MAX), (1, 1), (1024, 768), (2, 3));
        let extent = calculate_extent(&caps, vk::Extent2D { width: 4000, height: 3000 });
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn undefined_extent_is_clamped_per_component() {
        let caps = capabilities((u32::MAX, u32::MAX), (64, 64), (1024, 768), (2, 3));
        let extent = calculate_extent(&caps, vk::Extent2D { width: 10, height: 500 });
        assert_eq!(extent, vk::Extent2D { width: 64, height: 500 });
    }

    #[test]
    fn inverted_extent_range_does_not_panic() {
        let caps = capabilities((u32::MAX, u32::MAX), (800, 600), (640, 480), (2, 3));
        let extent = calculate_extent(&caps, vk::Extent2D { width: 1920, height: 100 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        assert_eq!(choose_image_count(&capabilities((1, 1), (1, 1), (1, 1), (2, 0))), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), (1, 1), (1, 1), (2, 8))), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), (1, 1), (1, 1), (2, 2))), 2);
    }

    #[test]
    fn negotiates_fifo_only_surface() {
        let first = format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let support = SurfaceSupport {
            capabilities: capabilities((640, 480), (1, 1), (4096, 4096), (2, 2)),
            formats: vec![
                first,
                format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let plan =
            SwapchainPlan::negotiate(&support, vk::Extent2D { width: 1, height: 1 }, SHARED)
                .unwrap();
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(plan.surface_format, first);
        assert_eq!(plan.image_count, 2);
        assert_eq!(plan.extent, vk::Extent2D { width: 640, height: 480 });
        assert_eq!(plan.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert!(plan.queue_family_indices.is_empty());
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let support = SurfaceSupport {
            capabilities: capabilities((640, 480), (1, 1), (4096, 4096), (2, 0)),
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        let families = QueueFamilyIndices {
            graphics: 0,
            present: 2,
        };

        let plan =
            SwapchainPlan::negotiate(&support, vk::Extent2D { width: 1, height: 1 }, families)
                .unwrap();
        assert_eq!(plan.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(plan.queue_family_indices, vec![0, 2]);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(plan.image_count, 3);
    }

    #[test]
    fn no_formats_fails_negotiation() {
        let support = SurfaceSupport {
            capabilities: capabilities((640, 480), (1, 1), (4096, 4096), (2, 0)),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(matches!(
            SwapchainPlan::negotiate(&support, vk::Extent2D { width: 1, height: 1 }, SHARED),
            Err(GpuError::SwapchainCreation(_))
        ));
    }

    #[test]
    fn only_presented_skips_rebuild() {
        assert!(!PresentOutcome::Presented.needs_rebuild());
        assert!(PresentOutcome::Suboptimal.needs_rebuild());
        assert!(PresentOutcome::OutOfDate.needs_rebuild());
        assert!(PresentOutcome::Failed(vk::Result::ERROR_OUT_OF_HOST_MEMORY).needs_rebuild());
    }
}
