//! Full-screen canvas quad and the constants pushed to its fragment shader.

use crate::mesh::{Index, Mesh, Vertex};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use flare_gpu::error::Result;
use flare_gpu::DeviceContext;
use glam::Vec2;
use std::sync::Arc;

/// Quad corners in clip space.
pub const CANVAS_VERTICES: [Vertex; 4] = [
    Vertex::new(-1.0, 1.0, 0.0),
    Vertex::new(1.0, 1.0, 0.0),
    Vertex::new(1.0, -1.0, 0.0),
    Vertex::new(-1.0, -1.0, 0.0),
];

/// Two triangles covering the quad.
pub const CANVAS_INDICES: [Index; 6] = [0, 1, 2, 2, 3, 0];

/// Per-frame values visible to the canvas fragment shader.
///
/// Layout matches the shader's push-constant block:
/// `vec2 resolution` at offset 0, `float time` at offset 8.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GlobalConstants {
    /// Framebuffer size in pixels.
    pub resolution: Vec2,
    /// Seconds since the frame driver started.
    pub time: f32,
}

impl GlobalConstants {
    /// Size of the push-constant block in bytes.
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(extent: vk::Extent2D, time: f32) -> Self {
        Self {
            resolution: Vec2::new(extent.width as f32, extent.height as f32),
            time,
        }
    }

    /// Fragment-stage range at offset 0 covering the whole block.
    pub fn push_constant_range() -> vk::PushConstantRange {
        vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(Self::SIZE)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Upload the canvas quad.
pub fn create_canvas_mesh(ctx: &Arc<DeviceContext>) -> Result<Mesh> {
    Mesh::new(ctx, &CANVAS_VERTICES, &CANVAS_INDICES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constants_layout() {
        assert_eq!(GlobalConstants::SIZE, 12);
        assert_eq!(std::mem::offset_of!(GlobalConstants, time), 8);

        let range = GlobalConstants::push_constant_range();
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 12);
    }

    #[test]
    fn constants_from_extent() {
        let constants = GlobalConstants::new(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            1.25,
        );
        assert_relative_eq!(constants.resolution.x, 800.0);
        assert_relative_eq!(constants.resolution.y, 600.0);

        let floats: &[f32] = bytemuck::cast_slice(constants.as_bytes());
        assert_relative_eq!(floats[0], 800.0);
        assert_relative_eq!(floats[1], 600.0);
        assert_relative_eq!(floats[2], 1.25);
    }

    #[test]
    fn quad_covers_clip_space() {
        for vertex in &CANVAS_VERTICES {
            assert_relative_eq!(vertex.position.x.abs(), 1.0);
            assert_relative_eq!(vertex.position.y.abs(), 1.0);
            assert_relative_eq!(vertex.position.z, 0.0);
        }
        assert!(CANVAS_INDICES
            .iter()
            .all(|&i| (i as usize) < CANVAS_VERTICES.len()));

        // Both triangles share the 0-2 diagonal.
        assert_eq!(CANVAS_INDICES[0], CANVAS_INDICES[5]);
        assert_eq!(CANVAS_INDICES[2], CANVAS_INDICES[3]);
    }
}
