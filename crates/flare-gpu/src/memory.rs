//! Device memory: memory type resolution, host mappings and buffers.

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

/// Find the lowest memory type index allowed by `type_bits` whose flags
/// contain all of `required`.
pub fn resolve_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let count = (memory_properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    (0u32..)
        .zip(&memory_properties.memory_types[..count])
        .find(|&(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i)
        .ok_or(GpuError::NoSuitableMemoryType {
            type_bits,
            properties: required,
        })
}

/// Memory properties a buffer needs before it can be mapped.
///
/// Writes through the mapping are never flushed, so the memory must be
/// coherent as well as visible.
pub const HOST_MAPPABLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
        | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Whether memory with `flags` can be mapped and written from the host.
pub const fn is_host_mappable(flags: vk::MemoryPropertyFlags) -> bool {
    flags.contains(HOST_MAPPABLE)
}

/// A host-visible byte range, such as mapped device memory.
#[derive(Debug)]
pub struct HostMapping {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is exclusively owned by one buffer and only accessed
// through `&mut self` for writes.
unsafe impl Send for HostMapping {}
// SAFETY: shared access only reads.
unsafe impl Sync for HostMapping {}

impl HostMapping {
    /// Wrap a pointer to `len` host-accessible bytes. Returns `None` for null.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the mapping exists, and nothing else may access that memory on the
    /// host meanwhile.
    pub unsafe fn new(ptr: *mut c_void, len: usize) -> Option<Self> {
        NonNull::new(ptr.cast::<u8>()).map(|ptr| Self { ptr, len })
    }

    /// Mapped length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping covers zero bytes.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite the whole range with `bytes`.
    ///
    /// Fails without touching memory unless `bytes` is exactly as long as
    /// the mapping.
    pub fn write_exact(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.len {
            return Err(GpuError::SizeMismatch {
                expected: self.len as u64,
                actual: bytes.len() as u64,
            });
        }
        // SAFETY: the range is valid for `len` bytes and the lengths match.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr(), bytes.len());
        }
        Ok(())
    }

    /// Read the whole range.
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the range is valid for `len` bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

/// A buffer and the device memory bound to it.
///
/// Dropping the buffer unmaps it if needed, destroys the buffer handle and
/// then frees the memory.
pub struct GpuBuffer {
    ctx: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    element_count: u64,
    memory_flags: vk::MemoryPropertyFlags,
    mapping: Option<HostMapping>,
}

impl GpuBuffer {
    /// Take ownership of a bound buffer/memory pair.
    ///
    /// # Safety
    /// `memory` must be bound to `buffer` at offset 0, both created from
    /// `ctx`, and `memory_flags` must be the flags of its memory type.
    pub(crate) unsafe fn from_raw(
        ctx: Arc<DeviceContext>,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
        element_count: u64,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> Self {
        Self {
            ctx,
            buffer,
            memory,
            size,
            element_count,
            memory_flags,
            mapping: None,
        }
    }

    /// Get the raw buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes (element size times element count).
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Number of elements the buffer was created for.
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// Property flags of the backing memory type.
    pub fn memory_flags(&self) -> vk::MemoryPropertyFlags {
        self.memory_flags
    }

    /// Whether the buffer is currently mapped.
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Mapped contents, if mapped.
    pub fn mapped_bytes(&self) -> Option<&[u8]> {
        self.mapping.as_ref().map(HostMapping::as_bytes)
    }

    /// Map the whole buffer into host memory.
    ///
    /// Returns `true` if the buffer is mapped afterwards. Mapping an already
    /// mapped buffer keeps the existing mapping. Memory that is not both
    /// host visible and host coherent is never mapped.
    pub fn map(&mut self) -> bool {
        if self.mapping.is_some() {
            return true;
        }
        if !is_host_mappable(self.memory_flags) {
            tracing::error!(
                "Cannot map buffer {:?}: memory {:?} is not host visible and coherent",
                self.buffer,
                self.memory_flags
            );
            return false;
        }
        let Ok(len) = usize::try_from(self.size) else {
            tracing::error!("Cannot map buffer {:?}: {} bytes", self.buffer, self.size);
            return false;
        };

        let device = self.ctx.device();
        // SAFETY: the memory is host visible, not mapped, and owned by us.
        let ptr = match unsafe {
            device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
        } {
            Ok(ptr) => ptr,
            Err(e) => {
                tracing::error!("Failed to map buffer {:?}: {e}", self.buffer);
                return false;
            }
        };

        // SAFETY: vkMapMemory returned a pointer to `size` bytes that stays
        // valid until vkUnmapMemory.
        match unsafe { HostMapping::new(ptr, len) } {
            Some(mapping) => {
                self.mapping = Some(mapping);
                true
            }
            None => {
                // SAFETY: the map call above succeeded.
                unsafe { device.unmap_memory(self.memory) };
                tracing::error!("Mapping buffer {:?} returned null", self.buffer);
                false
            }
        }
    }

    /// Copy `data` into the buffer, mapping it first if needed.
    ///
    /// The byte length of `data` must equal [`size`](Self::size); otherwise
    /// nothing is written and [`GpuError::SizeMismatch`] is returned.
    pub fn write<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as u64 != self.size {
            return Err(GpuError::SizeMismatch {
                expected: self.size,
                actual: bytes.len() as u64,
            });
        }
        if !self.map() {
            return Err(GpuError::MapFailed);
        }
        self.mapping
            .as_mut()
            .ok_or(GpuError::MapFailed)?
            .write_exact(bytes)
    }

    /// Release the host mapping. Returns `false` if the buffer was not mapped.
    pub fn unmap(&mut self) -> bool {
        if self.mapping.take().is_none() {
            return false;
        }
        // SAFETY: the memory was mapped and the mapping has been dropped.
        unsafe { self.ctx.device().unmap_memory(self.memory) };
        true
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        tracing::trace!("Dropping buffer {:?} ({} bytes)", self.buffer, self.size);
        self.unmap();
        let device = self.ctx.device();
        // SAFETY: the buffer is owned by us. Callers wait for GPU work using
        // it before dropping. The handle goes before the memory bound to it.
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}
