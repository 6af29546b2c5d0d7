//! GPU device context.
//!
//! The context owns the logical device, its queues and command pool, and the
//! presentation surface when there is one. It is shared through an `Arc`;
//! every GPU object holds a clone, so the device outlives all of them.

use crate::capabilities::{DeviceCandidate, QueueFamilyIndices};
use crate::command::{begin_command_buffer, end_command_buffer, CommandPool};
use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::memory::{resolve_memory_type, GpuBuffer};
use crate::surface::Surface;
use ash::vk;
use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr};
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
pub struct DeviceContext {
    instance: Arc<Instance>,
    surface: Option<Surface>,
    swapchain_loader: Option<ash::khr::swapchain::Device>,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    device_info: DeviceCandidate,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: Mutex<CommandPool>,
    // Queue submission and presentation must be externally synchronized.
    queue_lock: Mutex<()>,
}

impl DeviceContext {
    /// Select a physical device and create the logical device on it.
    ///
    /// With a surface the device must be able to present to it and the
    /// swapchain extension is required.
    ///
    /// # Safety
    /// The surface must have been created from `instance`.
    pub unsafe fn new(instance: Arc<Instance>, surface: Option<Surface>) -> Result<Arc<Self>> {
        let required = required_device_extensions(surface.is_some());
        let selection = instance.select_physical_device(surface.as_ref(), &required)?;
        let physical_device = selection.physical_device;
        let queue_families = selection.queue_families;

        let (device, graphics_queue, present_queue) = create_logical_device(
            instance.handle(),
            physical_device,
            &queue_families,
            &required,
        )?;

        let command_pool =
            match CommandPool::new(&device, queue_families.graphics, CommandPool::FLAGS) {
                Ok(pool) => pool,
                Err(e) => {
                    device.destroy_device(None);
                    return Err(e);
                }
            };

        let memory_properties = instance
            .handle()
            .get_physical_device_memory_properties(physical_device);

        let swapchain_loader = surface
            .as_ref()
            .map(|_| ash::khr::swapchain::Device::new(instance.handle(), &device));

        tracing::info!(
            "Created logical device: graphics family {}, present family {}",
            queue_families.graphics,
            queue_families.present
        );

        Ok(Arc::new(Self {
            instance,
            surface,
            swapchain_loader,
            device,
            physical_device,
            device_info: selection.candidate,
            memory_properties,
            queue_families,
            graphics_queue,
            present_queue,
            command_pool: Mutex::new(command_pool),
            queue_lock: Mutex::new(()),
        }))
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the instance the device was created from.
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Properties of the selected physical device.
    pub fn device_info(&self) -> &DeviceCandidate {
        &self.device_info
    }

    /// Memory heaps and types of the physical device.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get the graphics and present queue family indices.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue. Same as the graphics queue when the families match.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Presentation surface, absent for headless contexts.
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// Swapchain extension loader.
    pub fn swapchain_loader(&self) -> Result<&ash::khr::swapchain::Device> {
        self.swapchain_loader.as_ref().ok_or_else(|| {
            GpuError::SwapchainCreation("device was created without a surface".to_string())
        })
    }

    /// Lock the queues for submission or presentation.
    pub fn lock_queues(&self) -> MutexGuard<'_, ()> {
        self.queue_lock.lock()
    }

    /// Find a memory type index for `type_bits` with at least `properties`.
    pub fn resolve_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        resolve_memory_type(&self.memory_properties, type_bits, properties)
    }

    /// Create a buffer of `element_size * element_count` bytes backed by
    /// memory with `properties`.
    ///
    /// Any failure is logged and returns `None` with nothing left allocated.
    pub fn create_buffer(
        self: &Arc<Self>,
        element_size: vk::DeviceSize,
        element_count: u64,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<GpuBuffer> {
        let size = match element_size.checked_mul(element_count) {
            Some(size) if size > 0 => size,
            _ => {
                tracing::error!(
                    "Invalid buffer size: {element_count} elements of {element_size} bytes"
                );
                return None;
            }
        };

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let device = &self.device;
        // SAFETY: the create info is fully initialized.
        let buffer = match unsafe { device.create_buffer(&create_info, None) } {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!("Failed to create buffer of {size} bytes: {e}");
                return None;
            }
        };

        // SAFETY: the buffer was just created from this device.
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type = match self.resolve_memory_type(requirements.memory_type_bits, properties)
        {
            Ok(index) => index,
            Err(e) => {
                tracing::error!("Failed to allocate buffer memory: {e}");
                // SAFETY: the buffer is unused.
                unsafe { device.destroy_buffer(buffer, None) };
                return None;
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        // SAFETY: the memory type index comes from this device.
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                tracing::error!("Failed to allocate {} bytes: {e}", requirements.size);
                // SAFETY: the buffer is unused.
                unsafe { device.destroy_buffer(buffer, None) };
                return None;
            }
        };

        // SAFETY: the allocation satisfies the buffer's requirements.
        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            tracing::error!("Failed to bind buffer memory: {e}");
            // SAFETY: neither object is in use.
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return None;
        }

        let memory_flags = self.memory_properties.memory_types[memory_type as usize].property_flags;

        tracing::trace!(
            "Created buffer {:?}: {size} bytes, {usage:?}, memory type {memory_type}",
            buffer
        );

        // SAFETY: memory is bound to buffer at offset 0, both from this device.
        Some(unsafe {
            GpuBuffer::from_raw(
                Arc::clone(self),
                buffer,
                memory,
                size,
                element_count,
                memory_flags,
            )
        })
    }

    /// Allocate primary command buffers from the context's pool.
    pub fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let pool = self.command_pool.lock();
        // SAFETY: the pool belongs to this device.
        unsafe { pool.allocate_command_buffers(&self.device, count) }
    }

    /// Return command buffers to the context's pool.
    ///
    /// # Safety
    /// The buffers must come from [`allocate_command_buffers`](Self::allocate_command_buffers)
    /// and must not be pending execution.
    pub unsafe fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        let pool = self.command_pool.lock();
        pool.free_command_buffers(&self.device, command_buffers);
    }

    /// Allocate a command buffer and begin one-time recording.
    pub fn begin_single_time_commands(&self) -> Result<vk::CommandBuffer> {
        let cmd = self
            .allocate_command_buffers(1)?
            .first()
            .copied()
            .ok_or(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY))?;

        // SAFETY: the buffer is freshly allocated.
        if let Err(e) = unsafe {
            begin_command_buffer(
                &self.device,
                cmd,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )
        } {
            // SAFETY: recording never started.
            unsafe { self.free_command_buffers(&[cmd]) };
            return Err(e);
        }

        Ok(cmd)
    }

    /// End recording, submit to the graphics queue and block until the queue
    /// is idle. The command buffer is freed in every case.
    ///
    /// Only for setup-time work: it stalls the queue.
    pub fn end_single_time_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let result = self.submit_and_wait(cmd);
        // SAFETY: the queue is idle or the submission never happened.
        unsafe { self.free_command_buffers(&[cmd]) };
        result
    }

    fn submit_and_wait(&self, cmd: vk::CommandBuffer) -> Result<()> {
        // SAFETY: cmd is in the recording state, from this device.
        unsafe { end_command_buffer(&self.device, cmd) }?;

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        let _queues = self.lock_queues();
        // SAFETY: the queue lock is held.
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())?;
            self.device.queue_wait_idle(self.graphics_queue)?;
        }
        Ok(())
    }

    /// Copy the first `size` bytes of `src` into `dst` and wait for the copy.
    ///
    /// Returns `false` and logs the cause on failure.
    pub fn copy_buffer(&self, src: &GpuBuffer, dst: &GpuBuffer, size: vk::DeviceSize) -> bool {
        if size > src.size() || size > dst.size() {
            tracing::error!(
                "Copy of {size} bytes exceeds buffers ({} -> {} bytes)",
                src.size(),
                dst.size()
            );
            return false;
        }

        let cmd = match self.begin_single_time_commands() {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::error!("Failed to begin buffer copy: {e}");
                return false;
            }
        };

        let region = vk::BufferCopy::default().size(size);
        // SAFETY: cmd is recording and both buffers are alive.
        unsafe {
            self.device
                .cmd_copy_buffer(cmd, src.handle(), dst.handle(), &[region]);
        }

        match self.end_single_time_commands(cmd) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to copy buffer: {e}");
                false
            }
        }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        let _queues = self.lock_queues();
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        tracing::debug!("Dropping device {:?}", self.device.handle());
        unsafe {
            let _ = self.device.device_wait_idle();
            self.command_pool.get_mut().destroy(&self.device);
            // Every child holds an Arc to this context, so none are alive.
            self.device.destroy_device(None);
        }
    }
}

/// Builder for creating a device context.
pub struct DeviceContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Flare".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl DeviceContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build a context that can present to `window`.
    ///
    /// The window must outlive the returned context.
    pub fn build<W>(self, window: &W) -> Result<Arc<DeviceContext>>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        // SAFETY: the display handle comes from a live window.
        let instance =
            unsafe { Instance::new(&self.app_name, self.enable_validation, Some(display)) }?;
        // SAFETY: the caller keeps the window alive longer than the context.
        let surface = unsafe { Surface::from_window(&instance, window) }?;
        // SAFETY: the surface was created from this instance.
        unsafe { DeviceContext::new(instance, Some(surface)) }
    }

    /// Build a context without presentation support.
    pub fn build_headless(self) -> Result<Arc<DeviceContext>> {
        // SAFETY: no display handle is involved.
        let instance = unsafe { Instance::new(&self.app_name, self.enable_validation, None) }?;
        // SAFETY: there is no surface.
        unsafe { DeviceContext::new(instance, None) }
    }
}

/// Device extensions the engine needs.
pub fn required_device_extensions(presentation: bool) -> Vec<&'static CStr> {
    if presentation {
        vec![ash::khr::swapchain::NAME]
    } else {
        Vec::new()
    }
}

/// Create the logical device with one queue per distinct family.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
    extensions: &[&CStr],
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance.create_device(physical_device, &device_create_info, None)?;

    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let present_queue = device.get_device_queue(queue_families.present, 0);

    Ok((device, graphics_queue, present_queue))
}
