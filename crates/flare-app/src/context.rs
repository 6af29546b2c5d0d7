//! Application context.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use ash::vk;
use flare_core::Settings;
use flare_gpu::{DeviceContext, ShaderModule};
use flare_render::ShaderLibrary;
use flare_shaders::{builtin, ShaderStage};
use winit::window::Window;

/// Everything the running application owns apart from the frame driver.
///
/// Fields drop in declaration order: shader modules go before the device,
/// and the device (with its surface) before the window.
pub struct AppContext {
    /// Registered shader modules.
    pub shaders: ShaderLibrary,
    /// Device, queues and surface.
    pub gpu: Arc<DeviceContext>,
    /// The window being rendered into.
    pub window: Arc<Window>,
    /// Settings the application started with.
    pub settings: Settings,
}

impl AppContext {
    /// Build the device for `window` and populate the shader library.
    ///
    /// Shaders found in `shader_dir` are registered first, so a file there
    /// can replace a built-in of the same name.
    pub fn new(
        window: Arc<Window>,
        gpu: Arc<DeviceContext>,
        settings: Settings,
        shader_dir: &Path,
    ) -> anyhow::Result<Self> {
        let mut shaders = ShaderLibrary::new(Arc::clone(&gpu));
        if shader_dir.is_dir() {
            shaders.load_dir(shader_dir);
        } else {
            tracing::info!("No shader directory at {}", shader_dir.display());
        }

        shaders
            .create_from_source(builtin::CANVAS_VERT_NAME, builtin::CANVAS_VERT, ShaderStage::Vertex)
            .context("canvas vertex shader is unavailable")?;
        // A missing default is tolerated as long as the selected shader exists.
        shaders.create_from_source(
            builtin::DEFAULT_FRAG_NAME,
            builtin::DEFAULT_FRAG,
            ShaderStage::Fragment,
        );

        Ok(Self {
            shaders,
            gpu,
            window,
            settings,
        })
    }

    /// Current framebuffer size of the window.
    pub fn window_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    pub fn vertex_shader(&self) -> anyhow::Result<Arc<ShaderModule>> {
        self.shaders
            .get(builtin::CANVAS_VERT_NAME)
            .context("canvas vertex shader is not registered")
    }

    /// The fragment shader named in the settings, or the built-in default.
    pub fn fragment_shader(&self) -> anyhow::Result<Arc<ShaderModule>> {
        let requested = self.settings.shader.as_str();
        if !requested.is_empty() {
            if let Some(module) = self.shaders.find_fragment(requested) {
                tracing::info!("Using fragment shader {requested}");
                return Ok(module);
            }
            tracing::warn!(
                "Fragment shader {requested:?} not found, falling back to {}",
                builtin::DEFAULT_FRAG_NAME
            );
        }

        self.shaders
            .get(builtin::DEFAULT_FRAG_NAME)
            .context("no fragment shader available")
    }
}
