//! GLSL to SPIR-V compilation.

use crate::error::{Result, ShaderError};
use crate::stage::ShaderStage;

/// Runtime GLSL compiler targeting Vulkan.
pub struct ShaderCompiler {
    compiler: shaderc::Compiler,
}

impl ShaderCompiler {
    /// Create a new compiler.
    pub fn new() -> Result<Self> {
        let compiler = shaderc::Compiler::new().ok_or_else(|| {
            ShaderError::CompilerUnavailable("failed to create shaderc compiler".to_string())
        })?;
        Ok(Self { compiler })
    }

    /// Compile GLSL `source` for `stage`.
    ///
    /// `name` is only used in diagnostics. With `optimize` the output is
    /// optimized for size.
    pub fn compile(
        &self,
        source: &str,
        stage: ShaderStage,
        name: &str,
        optimize: bool,
    ) -> Result<Vec<u32>> {
        let mut options = shaderc::CompileOptions::new().ok_or_else(|| {
            ShaderError::CompilerUnavailable("failed to create compile options".to_string())
        })?;
        options.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_2 as u32,
        );
        if optimize {
            options.set_optimization_level(shaderc::OptimizationLevel::Size);
        }

        let kind = match stage {
            ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
            ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        };

        let artifact = self
            .compiler
            .compile_into_spirv(source, kind, name, "main", Some(&options))
            .map_err(|e| compile_error(name, e))?;

        if artifact.get_num_warnings() > 0 {
            tracing::warn!(
                "Shader '{}' compiled with warnings: {}",
                name,
                artifact.get_warning_messages()
            );
        }

        tracing::debug!("Compiled shader '{}' ({} words)", name, artifact.as_binary().len());
        Ok(artifact.as_binary().to_vec())
    }
}

fn compile_error(name: &str, error: shaderc::Error) -> ShaderError {
    let (status, message) = match error {
        shaderc::Error::CompilationError(count, message) => {
            (format!("{count} error(s)"), message)
        }
        shaderc::Error::InvalidStage(message) => ("invalid stage".to_string(), message),
        shaderc::Error::InvalidAssembly(message) => ("invalid assembly".to_string(), message),
        shaderc::Error::InternalError(message) => ("internal error".to_string(), message),
        other => ("failed".to_string(), other.to_string()),
    };
    ShaderError::Compile {
        name: name.to_string(),
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use crate::spirv::SPIRV_MAGIC;

    #[test]
    fn compiles_builtin_shaders() {
        let compiler = ShaderCompiler::new().unwrap();

        let vert = compiler
            .compile(builtin::CANVAS_VERT, ShaderStage::Vertex, "canvas.vert", true)
            .unwrap();
        assert_eq!(vert[0], SPIRV_MAGIC, "Invalid SPIR-V magic number");

        let frag = compiler
            .compile(builtin::DEFAULT_FRAG, ShaderStage::Fragment, "default.frag", false)
            .unwrap();
        assert_eq!(frag[0], SPIRV_MAGIC, "Invalid SPIR-V magic number");
    }

    #[test]
    fn reports_compile_errors() {
        let compiler = ShaderCompiler::new().unwrap();
        let result = compiler.compile(
            "#version 450\nvoid main() { undefined_call(); }\n",
            ShaderStage::Fragment,
            "broken.frag",
            true,
        );
        match result {
            Err(ShaderError::Compile { name, message, .. }) => {
                assert_eq!(name, "broken.frag");
                assert!(message.contains("undefined_call"));
            }
            other => panic!("expected compile error, got {:?}", other.map(|v| v.len())),
        }
    }
}
