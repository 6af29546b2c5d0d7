//! Persisted engine settings.
//!
//! The settings document is a small JSON object holding the window size and
//! the name of the fragment shader to display. A missing or broken document
//! is replaced by the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Window size and shader selection read at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Registered name of the fragment shader to draw, such as `plasma.frag`.
    /// The `.frag` suffix may be left off. Empty selects the built-in shader.
    pub shader: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 600,
            height: 600,
            shader: String::new(),
        }
    }
}

impl Settings {
    /// Parse settings from a reader.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let settings: Self = serde_json::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings as pretty JSON into a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Load settings from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file))
    }

    /// Save settings to a file, replacing its contents.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }

    /// Load settings, falling back to the defaults when the file is missing
    /// or invalid. The defaults are written back on a best-effort basis.
    pub fn load_or_init(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => {
                tracing::info!(
                    "Loaded settings from {}: {}x{}, shader '{}'",
                    path.display(),
                    settings.width,
                    settings.height,
                    settings.shader
                );
                settings
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load settings from {} ({e}), using defaults",
                    path.display()
                );
                let settings = Self::default();
                if let Err(e) = settings.save(path) {
                    tracing::warn!("Could not write default settings to {}: {e}", path.display());
                }
                settings
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidData(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("flare-settings-{}-{name}", std::process::id()))
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.width, 600);
        assert_eq!(settings.height, 600);
        assert!(settings.shader.is_empty());
    }

    #[test]
    fn read_document() {
        let json = r#"{ "width": 1280, "height": 720, "shader": "plasma" }"#;
        let settings = Settings::read_from(json.as_bytes()).unwrap();
        assert_eq!(settings.width, 1280);
        assert_eq!(settings.height, 720);
        assert_eq!(settings.shader, "plasma");
    }

    #[test]
    fn write_then_read() {
        let settings = Settings {
            width: 800,
            height: 400,
            shader: "waves".to_string(),
        };
        let mut buf = Vec::new();
        settings.write_to(&mut buf).unwrap();
        assert_eq!(Settings::read_from(buf.as_slice()).unwrap(), settings);
    }

    #[test]
    fn rejects_missing_keys() {
        let json = r#"{ "width": 1280 }"#;
        assert!(matches!(
            Settings::read_from(json.as_bytes()),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn rejects_zero_size() {
        let json = r#"{ "width": 0, "height": 720, "shader": "" }"#;
        assert!(matches!(
            Settings::read_from(json.as_bytes()),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn load_or_init_writes_defaults() {
        let path = temp_path("missing.json");
        let _ = std::fs::remove_file(&path);

        let settings = Settings::load_or_init(&path);
        assert_eq!(settings, Settings::default());
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_or_init_replaces_garbage() {
        let path = temp_path("garbage.json");
        std::fs::write(&path, "not json at all").unwrap();

        let settings = Settings::load_or_init(&path);
        assert_eq!(settings, Settings::default());
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_or_init_keeps_existing() {
        let path = temp_path("existing.json");
        let stored = Settings {
            width: 320,
            height: 240,
            shader: "tunnel".to_string(),
        };
        stored.save(&path).unwrap();

        assert_eq!(Settings::load_or_init(&path), stored);

        std::fs::remove_file(&path).unwrap();
    }
}
