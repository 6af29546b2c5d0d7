//! Tests against a real Vulkan driver.
//!
//! Run with `cargo test -p flare-gpu -- --ignored` on a machine with a GPU
//! or a software implementation such as lavapipe.

use flare_gpu::vk;
use flare_gpu::memory::is_host_mappable;
use flare_gpu::{DeviceContextBuilder, GpuError};

const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

fn headless() -> std::sync::Arc<flare_gpu::DeviceContext> {
    DeviceContextBuilder::new()
        .app_name("flare-gpu tests")
        .validation(false)
        .build_headless()
        .expect("no Vulkan device available")
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn host_buffer_write_and_read_back() {
    let ctx = headless();
    let mut buffer = ctx
        .create_buffer(4, 8, vk::BufferUsageFlags::TRANSFER_SRC, HOST)
        .expect("buffer creation failed");
    assert_eq!(buffer.size(), 32);
    assert_eq!(buffer.element_count(), 8);
    assert!(!buffer.is_mapped());

    let data: Vec<u32> = (100..108).collect();
    buffer.write(&data).unwrap();
    assert!(buffer.is_mapped());
    assert_eq!(buffer.mapped_bytes().unwrap(), bytemuck::cast_slice::<u32, u8>(&data));

    assert!(buffer.unmap());
    assert!(!buffer.unmap());
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn mismatched_write_is_rejected() {
    let ctx = headless();
    let mut buffer = ctx
        .create_buffer(4, 4, vk::BufferUsageFlags::TRANSFER_SRC, HOST)
        .unwrap();

    let err = buffer.write(&[1u32, 2, 3]).unwrap_err();
    assert!(matches!(
        err,
        GpuError::SizeMismatch {
            expected: 16,
            actual: 12
        }
    ));
    assert!(!buffer.is_mapped(), "a rejected write must not map");
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn staged_copy_through_device_local_memory() {
    let ctx = headless();
    let data: Vec<f32> = (0..64).map(|i| i as f32 * 0.5).collect();
    let size = std::mem::size_of_val(data.as_slice()) as u64;

    let mut staging = ctx
        .create_buffer(4, 64, vk::BufferUsageFlags::TRANSFER_SRC, HOST)
        .unwrap();
    staging.write(&data).unwrap();

    let device_local = ctx
        .create_buffer(
            4,
            64,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
    assert!(ctx.copy_buffer(&staging, &device_local, size));

    let mut readback = ctx
        .create_buffer(4, 64, vk::BufferUsageFlags::TRANSFER_DST, HOST)
        .unwrap();
    assert!(ctx.copy_buffer(&device_local, &readback, size));
    assert!(readback.map());
    assert_eq!(
        readback.mapped_bytes().unwrap(),
        bytemuck::cast_slice::<f32, u8>(&data)
    );
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn oversized_copy_fails_softly() {
    let ctx = headless();
    let small = ctx
        .create_buffer(1, 16, vk::BufferUsageFlags::TRANSFER_SRC, HOST)
        .unwrap();
    let large = ctx
        .create_buffer(1, 64, vk::BufferUsageFlags::TRANSFER_DST, HOST)
        .unwrap();
    assert!(!ctx.copy_buffer(&small, &large, 64));
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn zero_sized_buffer_is_refused() {
    let ctx = headless();
    assert!(ctx
        .create_buffer(4, 0, vk::BufferUsageFlags::VERTEX_BUFFER, HOST)
        .is_none());
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn host_memory_type_resolves() {
    let ctx = headless();
    let index = ctx.resolve_memory_type(u32::MAX, HOST).unwrap();
    let flags = ctx.memory_properties().memory_types[index as usize].property_flags;
    assert!(flags.contains(HOST));
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn headless_context_has_no_swapchain() {
    let ctx = headless();
    assert!(ctx.surface().is_none());
    assert!(flare_gpu::Swapchain::new(
        &ctx,
        vk::Extent2D {
            width: 64,
            height: 64
        }
    )
    .is_err());
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn write_requires_coherent_host_memory() {
    let ctx = headless();
    let mut buffer = ctx
        .create_buffer(
            4,
            4,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .expect("buffer creation failed");

    let result = buffer.write(&[1u32, 2, 3, 4]);
    if is_host_mappable(buffer.memory_flags()) {
        // Unified memory: the device-local type is also coherent host memory.
        assert!(result.is_ok());
    } else {
        assert!(matches!(result, Err(GpuError::MapFailed)));
        assert!(!buffer.map());
        assert!(!buffer.is_mapped());
    }
}
