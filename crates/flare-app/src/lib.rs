//! Application layer for the Flare engine.
//!
//! This crate ties the engine together:
//! - Logging setup
//! - Window creation and the winit event loop
//! - Device context and shader library startup
//! - The frame driver that renders the canvas every frame
//!
//! # Example
//!
//! ```no_run
//! use flare_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Flare").with_settings_path("flare.json"))
//! }
//! ```

mod context;
mod frame;
mod runner;

pub use context::AppContext;
pub use frame::{FrameDriver, FrameStatus, CLEAR_COLOR};
pub use runner::{init_logging, run_app, AppConfig};
