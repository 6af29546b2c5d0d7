//! GPU-resident geometry.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use flare_gpu::error::{GpuError, Result};
use flare_gpu::{DeviceContext, GpuBuffer};
use glam::Vec3;
use std::sync::Arc;

/// Index type of every mesh.
pub type Index = u32;

/// Vulkan index type matching [`Index`].
pub const INDEX_TYPE: vk::IndexType = vk::IndexType::UINT32;

/// Mesh vertex: a position only.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
}

impl Vertex {
    /// Create a vertex at `(x, y, z)`.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
        }
    }

    /// Single interleaved binding at index 0.
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)]
    }

    /// Position at location 0.
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![vk::VertexInputAttributeDescription::default()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(std::mem::offset_of!(Self, position) as u32)]
    }
}

/// Vertex buffer plus optional index buffer in device-local memory.
pub struct Mesh {
    ctx: Arc<DeviceContext>,
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Upload vertices and, if any, indices.
    ///
    /// Each buffer goes through a host-visible staging buffer that is
    /// dropped before this returns.
    pub fn new(ctx: &Arc<DeviceContext>, vertices: &[Vertex], indices: &[Index]) -> Result<Self> {
        if vertices.is_empty() {
            return Err(GpuError::BufferCreation("mesh has no vertices".to_string()));
        }
        let vertex_count = u32::try_from(vertices.len())
            .map_err(|_| GpuError::BufferCreation("too many vertices".to_string()))?;
        let index_count = u32::try_from(indices.len())
            .map_err(|_| GpuError::BufferCreation("too many indices".to_string()))?;

        let vertex_buffer = upload_staged(ctx, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(upload_staged(ctx, indices, vk::BufferUsageFlags::INDEX_BUFFER)?)
        };

        tracing::debug!("Uploaded mesh: {vertex_count} vertices, {index_count} indices");

        Ok(Self {
            ctx: Arc::clone(ctx),
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
        })
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices; zero for non-indexed meshes.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Whether the mesh has an index buffer.
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Record vertex and index buffer binds.
    ///
    /// # Safety
    /// `cmd` must be recording and come from the mesh's device.
    pub unsafe fn bind(&self, cmd: vk::CommandBuffer) {
        let device = self.ctx.device();
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.handle()], &[0]);
        if let Some(index_buffer) = &self.index_buffer {
            device.cmd_bind_index_buffer(cmd, index_buffer.handle(), 0, INDEX_TYPE);
        }
    }

    /// Record an indexed draw if the mesh has indices, else a plain draw.
    ///
    /// # Safety
    /// `cmd` must be inside a render pass with the mesh bound.
    pub unsafe fn draw(&self, cmd: vk::CommandBuffer) {
        let device = self.ctx.device();
        if self.is_indexed() {
            device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
        } else {
            device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
        }
    }
}

/// Copy `data` into a new device-local buffer with `usage`.
fn upload_staged<T: Pod>(
    ctx: &Arc<DeviceContext>,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    let element_size = std::mem::size_of::<T>() as vk::DeviceSize;
    let count = data.len() as u64;

    let mut staging = ctx
        .create_buffer(
            element_size,
            count,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or_else(|| GpuError::BufferCreation("staging buffer".to_string()))?;
    staging.write(data)?;
    staging.unmap();

    let buffer = ctx
        .create_buffer(
            element_size,
            count,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .ok_or_else(|| GpuError::BufferCreation(format!("{usage:?} buffer")))?;

    if !ctx.copy_buffer(&staging, &buffer, staging.size()) {
        return Err(GpuError::BufferCreation(format!(
            "copy into {usage:?} buffer failed"
        )));
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 12);

        let bindings = Vertex::binding_descriptions();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].stride, 12);
        assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);

        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[0].offset, 0);
    }

    #[test]
    fn vertex_bytes() {
        let vertices = [Vertex::new(1.0, 2.0, 3.0)];
        let floats: &[f32] = bytemuck::cast_slice(&vertices);
        assert_eq!(floats, &[1.0, 2.0, 3.0]);
    }
}
