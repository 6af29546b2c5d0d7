//! Tests that need a Vulkan device. Run with `cargo test -- --ignored`.

use flare_gpu::DeviceContextBuilder;
use flare_render::{create_canvas_mesh, Mesh, ShaderLibrary, Vertex};
use flare_shaders::{builtin, ShaderStage};
use std::sync::Arc;

#[test]
#[ignore = "requires a Vulkan device"]
fn canvas_mesh_uploads() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    let mesh = create_canvas_mesh(&ctx).unwrap();
    assert!(mesh.is_indexed());
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.index_count(), 6);
}

#[test]
#[ignore = "requires a Vulkan device"]
fn non_indexed_mesh() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    let triangle = [
        Vertex::new(0.0, -0.5, 0.0),
        Vertex::new(0.5, 0.5, 0.0),
        Vertex::new(-0.5, 0.5, 0.0),
    ];
    let mesh = Mesh::new(&ctx, &triangle, &[]).unwrap();
    assert!(!mesh.is_indexed());
    assert_eq!(mesh.index_count(), 0);
}

#[test]
#[ignore = "requires a Vulkan device"]
fn empty_mesh_is_rejected() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    assert!(Mesh::new(&ctx, &[], &[]).is_err());
}

#[test]
#[ignore = "requires a Vulkan device"]
fn library_caches_by_name() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    let mut library = ShaderLibrary::new(ctx);
    assert!(library.optimizes());

    let first = library
        .create_from_source(builtin::DEFAULT_FRAG_NAME, builtin::DEFAULT_FRAG, ShaderStage::Fragment)
        .unwrap();
    // Same name, different source: the cached module is returned.
    let second = library
        .create_from_source(builtin::DEFAULT_FRAG_NAME, builtin::CANVAS_VERT, ShaderStage::Vertex)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(library.len(), 1);

    assert!(library.find_fragment("default").is_some());
    assert!(library.find_fragment("default.frag").is_some());
    assert!(library.find_fragment("missing").is_none());
}

#[test]
#[ignore = "requires a Vulkan device"]
fn bad_source_is_not_registered() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    let mut library = ShaderLibrary::new(ctx);

    assert!(library
        .create_from_source("broken.frag", "void main() {", ShaderStage::Fragment)
        .is_none());
    assert!(!library.contains("broken.frag"));
}

#[test]
#[ignore = "requires a Vulkan device"]
fn missing_directory_loads_nothing() {
    let ctx = DeviceContextBuilder::new().build_headless().unwrap();
    let mut library = ShaderLibrary::new(ctx);
    let dir = std::env::temp_dir().join("flare-render-no-such-dir");
    assert_eq!(library.load_dir(&dir), 0);
}
