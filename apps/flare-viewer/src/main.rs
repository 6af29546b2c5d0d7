//! Flare fragment shader viewer.
//!
//! Draws a full-screen quad with the fragment shader named in the settings
//! file, animated by the resolution and elapsed time push constants.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p flare-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--settings <PATH>`: Settings file (default: `flare.json`)
//! - `--shaders <DIR>`: Directory of precompiled `*.vert.spv` / `*.frag.spv` files (default: `shaders`)
//! - `--validation` / `--no-validation`: Toggle Vulkan validation layers
//! - `--log-dir <DIR>`: Directory for the daily `flare.log` file (default: working directory)
//! - `--no-log-file`: Log to the console only
//! - `-h, --help`: Print help message
//!
//! ## Controls
//!
//! - `Escape`: Quit

use anyhow::{bail, Context};
use flare_app::{run_app, AppConfig};
use flare_core::constants;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Check for help flag before starting the app
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app(parse_args(&args)?)
}

fn parse_args(args: &[String]) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::new("Flare Viewer");
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--settings" => {
                let path = iter.next().context("--settings requires a path")?;
                config = config.with_settings_path(path);
            }
            "--shaders" => {
                let dir = iter.next().context("--shaders requires a directory")?;
                config = config.with_shader_dir(dir);
            }
            "--validation" => config = config.with_validation(true),
            "--no-validation" => config = config.with_validation(false),
            "--log-dir" => {
                let dir = iter.next().context("--log-dir requires a directory")?;
                config = config.with_log_dir(dir);
            }
            "--no-log-file" => config = config.without_log_file(),
            other => bail!("unknown argument: {other} (see --help)"),
        }
    }

    Ok(config)
}

fn print_help() {
    eprintln!(
        "Flare Viewer

USAGE:
    cargo run -p flare-viewer -- [OPTIONS]

OPTIONS:
    --settings <PATH>   Settings file (default: {settings})
    --shaders <DIR>     Directory of precompiled shaders (default: {shaders})
    --validation        Enable Vulkan validation layers
    --no-validation     Disable Vulkan validation layers
    --log-dir <DIR>     Directory for the daily {log} file (default: .)
    --no-log-file       Log to the console only
    -h, --help          Print this help message

SETTINGS:
    {{ \"width\": 600, \"height\": 600, \"shader\": \"plasma.frag\" }}
    An empty shader name selects the built-in animated shader.

CONTROLS:
    Escape              Quit",
        settings = constants::SETTINGS_FILE,
        shaders = constants::SHADER_DIR,
        log = constants::LOG_FILE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_arguments() {
        let config = parse_args(&[]).unwrap();
        assert_eq!(config.settings_path, PathBuf::from(constants::SETTINGS_FILE));
        assert_eq!(config.shader_dir, PathBuf::from(constants::SHADER_DIR));
    }

    #[test]
    fn paths_and_validation() {
        let config = parse_args(&args(&[
            "--settings",
            "demo.json",
            "--shaders",
            "out/spv",
            "--no-validation",
        ]))
        .unwrap();
        assert_eq!(config.settings_path, PathBuf::from("demo.json"));
        assert_eq!(config.shader_dir, PathBuf::from("out/spv"));
        assert!(!config.validation);
    }

    #[test]
    fn log_file_options() {
        let config = parse_args(&args(&["--log-dir", "logs"])).unwrap();
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));

        let config = parse_args(&args(&["--no-log-file"])).unwrap();
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn missing_value() {
        assert!(parse_args(&args(&["--settings"])).is_err());
    }

    #[test]
    fn unknown_argument() {
        assert!(parse_args(&args(&["--fullscreen"])).is_err());
    }
}
