//! Vulkan instance creation and physical device selection.

use crate::capabilities::{
    drop_unqueryable, select_first_suitable, DeviceCandidate, QueueFamilyIndices,
};
use crate::error::{GpuError, Result};
use crate::surface::Surface;
use ash::vk;
use flare_core::constants::{ENGINE_NAME, ENGINE_VERSION};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Arc;

/// Khronos validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan API version the engine targets.
pub const API_VERSION: u32 = vk::API_VERSION_1_2;

/// Owned Vulkan instance.
///
/// Every object created from the instance holds an `Arc` to it, so the
/// instance is destroyed only after its last child.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    surface_loader: Option<ash::khr::surface::Instance>,
    debug_messenger: Option<(vk::DebugUtilsMessengerEXT, ash::ext::debug_utils::Instance)>,
}

/// The device picked by [`Instance::select_physical_device`].
pub struct PhysicalDeviceSelection {
    pub physical_device: vk::PhysicalDevice,
    pub candidate: DeviceCandidate,
    pub queue_families: QueueFamilyIndices,
}

impl Instance {
    /// Load Vulkan and create an instance.
    ///
    /// With a display handle the windowing extensions it needs are enabled.
    /// The validation layer is requested when `enable_validation` is set and
    /// the layer is installed; otherwise a warning is logged and creation
    /// continues without it.
    ///
    /// # Safety
    /// `display` must come from a live display connection.
    pub unsafe fn new(
        app_name: &str,
        enable_validation: bool,
        display: Option<RawDisplayHandle>,
    ) -> Result<Arc<Self>> {
        let entry = ash::Entry::load().map_err(|e| GpuError::Loading(e.to_string()))?;

        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = CString::new(ENGINE_NAME).unwrap_or_default();
        let (major, minor, patch) = ENGINE_VERSION;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, major, minor, patch))
            .api_version(API_VERSION);

        let mut extension_names: Vec<*const c_char> = match display {
            Some(display) => ash_window::enumerate_required_extensions(display)?.to_vec(),
            None => Vec::new(),
        };

        let validation = enable_validation && validation_available(&entry)?;
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        #[cfg(target_os = "macos")]
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

        let layer_names: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Required for MoltenVK on macOS
        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        let handle = entry.create_instance(&create_info, None)?;

        let surface_loader = display.map(|_| ash::khr::surface::Instance::new(&entry, &handle));

        let debug_messenger = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &handle);
            match loader.create_debug_utils_messenger(&debug_messenger_info(), None) {
                Ok(messenger) => Some((messenger, loader)),
                Err(e) => {
                    tracing::warn!("Failed to create debug messenger: {e}");
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!(
            "Created Vulkan instance {:?} (validation: {})",
            handle.handle(),
            validation
        );

        Ok(Arc::new(Self {
            entry,
            handle,
            surface_loader,
            debug_messenger,
        }))
    }

    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn handle(&self) -> &ash::Instance {
        &self.handle
    }

    /// Surface extension loader, present when created for a display.
    pub fn surface_loader(&self) -> Option<&ash::khr::surface::Instance> {
        self.surface_loader.as_ref()
    }

    /// Pick the first physical device, in enumeration order, that has a
    /// graphics queue family, a family able to present to `surface` and
    /// every extension in `required_extensions`.
    ///
    /// # Safety
    /// `surface` must have been created from this instance.
    pub unsafe fn select_physical_device(
        &self,
        surface: Option<&Surface>,
        required_extensions: &[&CStr],
    ) -> Result<PhysicalDeviceSelection> {
        let results = self
            .handle
            .enumerate_physical_devices()?
            .into_iter()
            .map(|device| (device, DeviceCandidate::query(&self.handle, device, surface)));
        let (devices, mut candidates) = drop_unqueryable(results);

        let (index, queue_families) = select_first_suitable(&candidates, required_extensions)?;
        let candidate = candidates.swap_remove(index);

        tracing::info!("Selected GPU: {}", candidate.summary());

        Ok(PhysicalDeviceSelection {
            physical_device: devices[index],
            candidate,
            queue_families,
        })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        tracing::debug!("Dropping instance {:?}", self.handle.handle());
        // SAFETY: every object created from this instance holds an Arc to it,
        // so none are alive here.
        unsafe {
            if let Some((messenger, loader)) = self.debug_messenger.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.handle.destroy_instance(None);
        }
    }
}

unsafe fn validation_available(entry: &ash::Entry) -> Result<bool> {
    let layers = entry.enumerate_instance_layer_properties()?;
    let found = layers
        .iter()
        .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == VALIDATION_LAYER);
    if !found {
        tracing::warn!(
            "Validation layer {} not available, continuing without it",
            VALIDATION_LAYER.to_string_lossy()
        );
    }
    Ok(found)
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the driver guarantees the callback data is valid for this call.
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "general",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::trace!(target: "flare_gpu::validation", "[{kind}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::debug!(target: "flare_gpu::validation", "[{kind}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "flare_gpu::validation", "[{kind}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "flare_gpu::validation", "[{kind}] {message}");
        }
        _ => {
            tracing::info!(target: "flare_gpu::validation", "[{kind}] {message}");
        }
    }

    vk::FALSE
}
