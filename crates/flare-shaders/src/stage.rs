//! Shader stages.

use crate::error::ShaderError;
use std::fmt;
use std::str::FromStr;

/// Pipeline stage a shader module is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// File-name suffix identifying the stage, without the dot.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Fragment => "frag",
        }
    }

    /// Parse a shader file name of the form `<name>.<stage>.<ext>`.
    ///
    /// Returns the registered name (`<name>.<stage>`) together with the
    /// stage, or `None` when the stage suffix is missing or unsupported.
    pub fn from_file_name(file_name: &str) -> Option<(String, Self)> {
        let (registered, _ext) = file_name.rsplit_once('.')?;
        let (_name, suffix) = registered.rsplit_once('.')?;
        let stage = suffix.parse().ok()?;
        Some((registered.to_string(), stage))
    }
}

impl FromStr for ShaderStage {
    type Err = ShaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vert" => Ok(Self::Vertex),
            "frag" => Ok(Self::Fragment),
            other => Err(ShaderError::UnsupportedStage(other.to_string())),
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spirv_file_names() {
        assert_eq!(
            ShaderStage::from_file_name("plasma.frag.spv"),
            Some(("plasma.frag".to_string(), ShaderStage::Fragment))
        );
        assert_eq!(
            ShaderStage::from_file_name("canvas.vert.bin"),
            Some(("canvas.vert".to_string(), ShaderStage::Vertex))
        );
    }

    #[test]
    fn keeps_dots_in_base_name() {
        assert_eq!(
            ShaderStage::from_file_name("my.fancy.frag.spv"),
            Some(("my.fancy.frag".to_string(), ShaderStage::Fragment))
        );
    }

    #[test]
    fn ignores_other_stages() {
        assert_eq!(ShaderStage::from_file_name("trace.comp.spv"), None);
        assert_eq!(ShaderStage::from_file_name("plasma.spv"), None);
        assert_eq!(ShaderStage::from_file_name("README"), None);
    }

    #[test]
    fn unsupported_stage_error() {
        assert!(matches!(
            "geom".parse::<ShaderStage>(),
            Err(ShaderError::UnsupportedStage(s)) if s == "geom"
        ));
    }
}
