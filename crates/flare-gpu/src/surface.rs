//! Presentation surfaces.
//!
//! Wraps the Vulkan surface created for a window and the queries the
//! swapchain negotiation needs.

use crate::error::{GpuError, Result};
use crate::instance::Instance;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

/// Owned Vulkan surface for one window.
pub struct Surface {
    instance: Arc<Instance>,
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface from a window.
    ///
    /// # Safety
    /// The window must outlive the surface.
    pub unsafe fn from_window<W>(instance: &Arc<Instance>, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        Self::new(instance, display.as_raw(), window_handle.as_raw())
    }

    /// Create a surface from raw handles.
    ///
    /// # Safety
    /// The handles must be valid and outlive the surface. The instance must
    /// have been created for the same display.
    pub unsafe fn new(
        instance: &Arc<Instance>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self> {
        let loader = instance
            .surface_loader()
            .ok_or_else(|| {
                GpuError::SurfaceCreation("instance was created without a display".to_string())
            })?
            .clone();

        let handle =
            ash_window::create_surface(instance.entry(), instance.handle(), display, window, None)
                .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        Ok(Self {
            instance: Arc::clone(instance),
            loader,
            handle,
        })
    }

    /// Instance the surface was created from.
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Get the raw surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Whether `queue_family` of `physical_device` can present to this surface.
    ///
    /// # Safety
    /// The physical device must come from the surface's instance.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        Ok(self.loader.get_physical_device_surface_support(
            physical_device,
            queue_family,
            self.handle,
        )?)
    }

    /// Query capabilities, formats and present modes.
    ///
    /// # Safety
    /// The physical device must come from the surface's instance.
    pub unsafe fn query_support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        let capabilities = self
            .loader
            .get_physical_device_surface_capabilities(physical_device, self.handle)?;
        let formats = self
            .loader
            .get_physical_device_surface_formats(physical_device, self.handle)?;
        let present_modes = self
            .loader
            .get_physical_device_surface_present_modes(physical_device, self.handle)?;

        Ok(SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        tracing::debug!("Dropping surface {:?}", self.handle);
        // SAFETY: swapchains hold the device, which owns this surface, so no
        // swapchain built on it is still alive.
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}
