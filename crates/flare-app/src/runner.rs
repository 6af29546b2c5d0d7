//! Application runner and event loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flare_core::{constants, Settings};
use flare_gpu::DeviceContextBuilder;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::context::AppContext;
use crate::frame::FrameDriver;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also reported to the driver as the application name.
    pub title: String,
    /// Where the settings document lives.
    pub settings_path: PathBuf,
    /// Directory scanned for precompiled shaders.
    pub shader_dir: PathBuf,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Directory for the daily-rotated log file; `None` logs to the console only.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: constants::ENGINE_NAME.to_string(),
            settings_path: PathBuf::from(constants::SETTINGS_FILE),
            shader_dir: PathBuf::from(constants::SHADER_DIR),
            validation: cfg!(debug_assertions),
            log_dir: Some(PathBuf::from(".")),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Write the log file into `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Log to the console only.
    pub fn without_log_file(mut self) -> Self {
        self.log_dir = None;
        self
    }
}

/// Console logging plus, with `log_dir`, a daily-rotated `flare.log` file.
///
/// The file is written from a background thread; keep the returned guard
/// alive for as long as events should reach it.
fn logging_subscriber(
    filter: EnvFilter,
    log_dir: Option<&Path>,
) -> (impl tracing::Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, constants::LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer);

    (subscriber, guard)
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Returns the file writer
/// guard, or `None` when there is no log file or a subscriber was already
/// installed.
pub fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (subscriber, guard) = logging_subscriber(filter, log_dir);
    subscriber.try_init().ok()?;
    guard
}

/// Run the engine until the window is closed.
///
/// Initializes logging, loads the settings, and drives the event loop.
/// Errors that stop the loop are returned.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    let _log_guard = init_logging(config.log_dir.as_deref());

    info!("{} starting...", config.title);

    let settings = Settings::load_or_init(&config.settings_path);
    info!(
        "Settings: {}x{}, shader {:?}",
        settings.width, settings.height, settings.shader
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        settings,
        state: None,
        error: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct AppRunner {
    config: AppConfig,
    settings: Settings,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

/// Live application state. The driver drops before the context.
struct AppState {
    driver: FrameDriver,
    ctx: AppContext,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("Escape pressed");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    tracing::debug!("Resized to {}x{}", size.width, size.height);
                    state.driver.request_rebuild();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    let extent = state.ctx.window_extent();
                    if let Err(e) = state.driver.draw_frame(extent) {
                        error!("Render error: {e}");
                        self.error = Some(e.into());
                        self.shutdown(event_loop);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.settings.width, self.settings.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = DeviceContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build(window.as_ref())?;

        info!("GPU: {}", gpu.device_info().summary());

        let ctx = AppContext::new(
            window,
            gpu,
            self.settings.clone(),
            &self.config.shader_dir,
        )?;
        let driver = FrameDriver::new(
            &ctx.gpu,
            ctx.vertex_shader()?,
            ctx.fragment_shader()?,
            ctx.window_extent(),
        )?;

        Ok(AppState { driver, ctx })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            info!("Starting cleanup...");
            if let Err(e) = state.ctx.gpu.wait_idle() {
                error!("Failed to wait idle: {e}");
            }
            info!("Rendered {} frames", state.driver.frame_count());
            drop(state);
            info!("Cleanup complete");
        }
        event_loop.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.title, "Flare");
        assert_eq!(config.settings_path, PathBuf::from("flare.json"));
        assert_eq!(config.shader_dir, PathBuf::from("shaders"));
        assert_eq!(config.validation, cfg!(debug_assertions));
        assert_eq!(config.log_dir, Some(PathBuf::from(".")));
    }

    #[test]
    fn config_builder() {
        let config = AppConfig::new("Viewer")
            .with_settings_path("custom.json")
            .with_shader_dir("assets/shaders")
            .with_validation(false)
            .with_log_dir("logs");
        assert_eq!(config.title, "Viewer");
        assert_eq!(config.settings_path, PathBuf::from("custom.json"));
        assert_eq!(config.shader_dir, PathBuf::from("assets/shaders"));
        assert!(!config.validation);
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.without_log_file().log_dir, None);
    }

    #[test]
    fn events_reach_the_log_file() {
        let dir = std::env::temp_dir().join(format!("flare-log-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (subscriber, guard) = logging_subscriber(EnvFilter::new("info"), Some(&dir));
        assert!(guard.is_some());
        tracing::subscriber::with_default(subscriber, || {
            info!("written to the daily log");
        });
        // Dropping the guard flushes the background writer.
        drop(guard);

        let log = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .find(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(constants::LOG_FILE)
            })
            .expect("no log file written");
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("written to the daily log"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn console_only_has_no_guard() {
        let (_subscriber, guard) = logging_subscriber(EnvFilter::new("info"), None);
        assert!(guard.is_none());
    }
}
