//! Rendering building blocks for the Flare engine.
//!
//! This crate provides:
//! - GPU-resident meshes uploaded through a staging buffer
//! - The full-screen canvas quad and its push constants
//! - A name-keyed shader library

pub mod canvas;
pub mod mesh;
pub mod shader_library;

pub use canvas::{create_canvas_mesh, GlobalConstants, CANVAS_INDICES, CANVAS_VERTICES};
pub use mesh::{Index, Mesh, Vertex};
pub use shader_library::ShaderLibrary;
