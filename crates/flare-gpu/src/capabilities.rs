//! Physical device capability queries and selection.
//!
//! The queries read everything the engine needs to judge a device into plain
//! data, so the selection rules below can run without a driver.

use crate::error::{GpuError, Result};
use crate::surface::Surface;
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;
use std::fmt;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// What one queue family can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilySupport {
    pub queue_count: u32,
    pub graphics: bool,
    pub present: bool,
}

/// Queue families chosen for graphics and presentation. They may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Whether graphics and present share one family.
    pub const fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Pick the first graphics family and the first present family.
///
/// Families without queues are never chosen.
pub fn find_queue_families(families: &[QueueFamilySupport]) -> Option<QueueFamilyIndices> {
    let mut graphics = None;
    let mut present = None;

    for (i, family) in (0u32..).zip(families) {
        if family.queue_count == 0 {
            continue;
        }
        if family.graphics && graphics.is_none() {
            graphics = Some(i);
        }
        if family.present && present.is_none() {
            present = Some(i);
        }
        if graphics.is_some() && present.is_some() {
            break;
        }
    }

    Some(QueueFamilyIndices {
        graphics: graphics?,
        present: present?,
    })
}

/// Everything needed to judge one physical device.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub name: String,
    pub vendor: GpuVendor,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub driver_version: u32,
    pub queue_families: Vec<QueueFamilySupport>,
    pub extensions: HashSet<String>,
}

impl DeviceCandidate {
    /// Query a physical device.
    ///
    /// Present support is checked against `surface`. Without a surface every
    /// graphics family counts as present-capable.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface: Option<&Surface>,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let mut queue_families = Vec::with_capacity(families.len());
        for (i, family) in (0u32..).zip(&families) {
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = match surface {
                Some(surface) => surface.supports_present(physical_device, i)?,
                None => graphics,
            };
            queue_families.push(QueueFamilySupport {
                queue_count: family.queue_count,
                graphics,
                present,
            });
        }

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)?
            .iter()
            .map(|ext| {
                CStr::from_ptr(ext.extension_name.as_ptr())
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        Ok(Self {
            name,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_id: properties.device_id,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            queue_families,
            extensions,
        })
    }

    /// Queue families this device would use, if it has both kinds.
    pub fn queue_family_indices(&self) -> Option<QueueFamilyIndices> {
        find_queue_families(&self.queue_families)
    }

    /// Whether every required extension is available.
    pub fn supports_extensions(&self, required: &[&CStr]) -> bool {
        required
            .iter()
            .all(|ext| self.extensions.contains(ext.to_string_lossy().as_ref()))
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, id {:#06x}) - driver {}.{}.{} - Vulkan {}.{}.{}",
            self.name,
            self.vendor,
            self.device_id,
            vk::api_version_major(self.driver_version),
            vk::api_version_minor(self.driver_version),
            vk::api_version_patch(self.driver_version),
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

/// Split query results into devices and their candidates, in order.
///
/// A device whose query failed is logged and left out, so it counts as
/// unsuitable instead of ending the selection.
pub fn drop_unqueryable<D: fmt::Debug>(
    results: impl IntoIterator<Item = (D, Result<DeviceCandidate>)>,
) -> (Vec<D>, Vec<DeviceCandidate>) {
    let mut devices = Vec::new();
    let mut candidates = Vec::new();
    for (device, result) in results {
        match result {
            Ok(candidate) => {
                devices.push(device);
                candidates.push(candidate);
            }
            Err(e) => tracing::warn!("Skipping physical device {device:?}: {e}"),
        }
    }
    (devices, candidates)
}

/// Choose the first candidate, in enumeration order, with graphics and
/// present queue families and every required extension.
pub fn select_first_suitable(
    candidates: &[DeviceCandidate],
    required_extensions: &[&CStr],
) -> Result<(usize, QueueFamilyIndices)> {
    candidates
        .iter()
        .enumerate()
        .find_map(|(i, candidate)| {
            if !candidate.supports_extensions(required_extensions) {
                tracing::debug!("Skipping {}: missing device extensions", candidate.name);
                return None;
            }
            match candidate.queue_family_indices() {
                Some(families) => Some((i, families)),
                None => {
                    tracing::debug!("Skipping {}: no graphics/present queues", candidate.name);
                    None
                }
            }
        })
        .ok_or(GpuError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN: &CStr = c"VK_KHR_swapchain";

    fn family(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport {
            queue_count: 1,
            graphics,
            present,
        }
    }

    fn candidate(name: &str, families: Vec<QueueFamilySupport>, exts: &[&str]) -> DeviceCandidate {
        DeviceCandidate {
            name: name.to_string(),
            vendor: GpuVendor::Other(0),
            device_id: 0,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_2,
            driver_version: 0,
            queue_families: families,
            extensions: exts.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn shared_family() {
        let indices = find_queue_families(&[family(true, true)]).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 0 });
        assert!(indices.is_shared());
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn split_families() {
        let families = [family(false, false), family(true, false), family(false, true)];
        let indices = find_queue_families(&families).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 2 });
        assert_eq!(indices.unique(), vec![1, 2]);
    }

    #[test]
    fn empty_families_are_skipped() {
        let families = [
            QueueFamilySupport {
                queue_count: 0,
                graphics: true,
                present: true,
            },
            family(true, true),
        ];
        let indices = find_queue_families(&families).unwrap();
        assert_eq!(indices.graphics, 1);
        assert_eq!(indices.present, 1);
    }

    #[test]
    fn missing_present_family() {
        assert_eq!(find_queue_families(&[family(true, false)]), None);
        assert_eq!(find_queue_families(&[]), None);
    }

    #[test]
    fn selects_first_suitable_in_order() {
        let candidates = [
            candidate("no present", vec![family(true, false)], &["VK_KHR_swapchain"]),
            candidate("no swapchain", vec![family(true, true)], &[]),
            candidate("first good", vec![family(true, true)], &["VK_KHR_swapchain"]),
            candidate("second good", vec![family(true, true)], &["VK_KHR_swapchain"]),
        ];
        let (index, families) = select_first_suitable(&candidates, &[SWAPCHAIN]).unwrap();
        assert_eq!(index, 2);
        assert_eq!(families, QueueFamilyIndices { graphics: 0, present: 0 });
    }

    #[test]
    fn fails_when_nothing_qualifies() {
        let candidates = [
            candidate("no graphics", vec![family(false, true)], &["VK_KHR_swapchain"]),
            candidate("no swapchain", vec![family(true, true)], &["VK_KHR_maintenance1"]),
        ];
        assert!(matches!(
            select_first_suitable(&candidates, &[SWAPCHAIN]),
            Err(GpuError::NoSuitableDevice)
        ));
        assert!(matches!(
            select_first_suitable(&[], &[SWAPCHAIN]),
            Err(GpuError::NoSuitableDevice)
        ));
    }

    #[test]
    fn failed_query_does_not_stop_selection() {
        let results = vec![
            ("first", Err(GpuError::Vulkan(vk::Result::ERROR_INITIALIZATION_FAILED))),
            (
                "second",
                Ok(candidate("usable", vec![family(true, true)], &["VK_KHR_swapchain"])),
            ),
        ];
        let (devices, candidates) = drop_unqueryable(results);
        assert_eq!(devices, vec!["second"]);

        let (index, _) = select_first_suitable(&candidates, &[SWAPCHAIN]).unwrap();
        assert_eq!(devices[index], "second");
        assert_eq!(candidates[index].name, "usable");
    }

    #[test]
    fn all_queries_failing_leaves_nothing() {
        let results: Vec<(u32, Result<DeviceCandidate>)> =
            vec![(0, Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)))];
        let (devices, candidates) = drop_unqueryable(results);
        assert!(devices.is_empty());
        assert!(matches!(
            select_first_suitable(&candidates, &[SWAPCHAIN]),
            Err(GpuError::NoSuitableDevice)
        ));
    }
}
