//! Frame-in-flight synchronization.
//!
//! Each frame slot owns an image-available semaphore, a render-finished
//! semaphore and an in-flight fence. [`FrameSlots`] tracks which slot the
//! next frame uses and enforces that every started frame is finished
//! exactly once before the next one starts.

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;

/// Number of frames that may have GPU work outstanding at once.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&create_info, None)?;
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&create_info, None)?;
    Ok(fence)
}

/// The host-side view of a slot's in-flight fence.
pub trait SlotFence {
    /// Block until the slot's last submission has finished.
    fn wait(&self) -> Result<()>;

    /// Return the fence to the unsignaled state before a new submission.
    fn reset(&self) -> Result<()>;

    /// Put the fence back in the signaled state after a submission that
    /// never reached the queue.
    fn rearm(&mut self) -> Result<()>;
}

/// Synchronization objects of one frame slot.
pub struct FrameSync {
    ctx: Arc<DeviceContext>,
    /// Semaphore signaled when the acquired image is available
    pub image_available: vk::Semaphore,
    /// Semaphore signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Fence signaled when the slot's submission has executed
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create the slot's objects with the fence already signaled, so the
    /// first wait returns at once.
    pub fn new(ctx: &Arc<DeviceContext>) -> Result<Self> {
        let device = ctx.device();
        let mut sync = Self {
            ctx: Arc::clone(ctx),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };
        // SAFETY: the device is valid. Null handles left by a failure are
        // ignored by the destroy calls in drop.
        unsafe {
            sync.image_available = create_semaphore(device)?;
            sync.render_finished = create_semaphore(device)?;
            sync.in_flight = create_fence(device, true)?;
        }
        Ok(sync)
    }
}

impl SlotFence for FrameSync {
    fn wait(&self) -> Result<()> {
        // SAFETY: the fence belongs to this device.
        unsafe {
            self.ctx
                .device()
                .wait_for_fences(&[self.in_flight], true, u64::MAX)?;
        }
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        // SAFETY: the fence is signaled, so it is not in use by a queue.
        unsafe { self.ctx.device().reset_fences(&[self.in_flight])? };
        Ok(())
    }

    fn rearm(&mut self) -> Result<()> {
        let device = self.ctx.device();
        // SAFETY: the fence was reset and never submitted, so nothing uses it.
        unsafe {
            let fence = create_fence(device, true)?;
            device.destroy_fence(self.in_flight, None);
            self.in_flight = fence;
        }
        Ok(())
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        let device = self.ctx.device();
        // SAFETY: the owning swapchain waits for the device to go idle first.
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}

/// Rotating set of frame slots.
///
/// The slot index cycles `0, 1, 0, 1, ...` once per finished frame and is
/// unrelated to the swapchain image index.
pub struct FrameSlots<S> {
    slots: Vec<S>,
    current: usize,
    pending: Option<usize>,
}

impl<S: SlotFence> FrameSlots<S> {
    /// Wrap the given slots. Panics if `slots` is empty.
    pub fn new(slots: Vec<S>) -> Self {
        assert!(!slots.is_empty(), "at least one frame slot is required");
        Self {
            slots,
            current: 0,
            pending: None,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots. Returns `false` for every value built by
    /// [`new`](Self::new), which requires at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot the next frame uses.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The slot the next frame uses.
    pub fn current(&self) -> &S {
        &self.slots[self.current]
    }

    /// A slot by index.
    pub fn get(&self, index: usize) -> Option<&S> {
        self.slots.get(index)
    }

    /// Whether a frame has been started and not yet finished.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Slot of the started, unfinished frame.
    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    /// Block until the current slot's previous submission has finished.
    pub fn wait_current(&self) -> Result<()> {
        if let Some(slot) = self.pending {
            return Err(GpuError::FrameProtocol(format!(
                "frame in slot {slot} was acquired but never submitted"
            )));
        }
        self.current().wait()
    }

    /// Start a frame in the current slot. Resets the slot's fence.
    pub fn begin(&mut self) -> Result<usize> {
        if let Some(slot) = self.pending {
            return Err(GpuError::FrameProtocol(format!(
                "frame in slot {slot} was acquired but never submitted"
            )));
        }
        self.current().reset()?;
        self.pending = Some(self.current);
        Ok(self.current)
    }

    /// Finish the frame started in `slot` after its submission reached the
    /// queue, and move to the next slot.
    pub fn finish(&mut self, slot: usize) -> Result<()> {
        self.check_pending(slot)?;
        self.advance();
        Ok(())
    }

    /// Finish the frame started in `slot` whose submission failed. The
    /// slot's fence is re-signaled so the next wait on it returns.
    pub fn abandon(&mut self, slot: usize) -> Result<()> {
        self.check_pending(slot)?;
        let result = self.slots[slot].rearm();
        self.advance();
        result
    }

    /// Fail unless `slot` holds the started, unfinished frame.
    pub fn check_pending(&self, slot: usize) -> Result<()> {
        match self.pending {
            Some(pending) if pending == slot => Ok(()),
            Some(pending) => Err(GpuError::FrameProtocol(format!(
                "submitted slot {slot} but slot {pending} was acquired"
            ))),
            None => Err(GpuError::FrameProtocol(format!(
                "submitted slot {slot} without acquiring"
            ))),
        }
    }

    fn advance(&mut self) {
        self.pending = None;
        self.current = (self.current + 1) % self.slots.len();
    }
}
