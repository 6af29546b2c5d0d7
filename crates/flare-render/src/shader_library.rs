//! Name-keyed cache of shader modules.

use flare_gpu::{DeviceContext, ShaderModule};
use flare_shaders::{load_spirv_dir, ShaderCompiler, ShaderStage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Whether source is size-optimized unless configured otherwise.
pub const OPTIMIZE_BY_DEFAULT: bool = true;

/// Shader modules registered by name (for example `plasma.frag`).
///
/// The first module registered under a name wins; later registrations
/// under the same name return it unchanged.
pub struct ShaderLibrary {
    ctx: Arc<DeviceContext>,
    shaders: HashMap<String, Arc<ShaderModule>>,
    compiler: Option<ShaderCompiler>,
    optimize: bool,
}

impl ShaderLibrary {
    pub fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            ctx,
            shaders: HashMap::new(),
            compiler: None,
            optimize: OPTIMIZE_BY_DEFAULT,
        }
    }

    /// Optimize source compiled from now on.
    pub fn with_optimization(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Whether source compiled from now on is size-optimized.
    pub fn optimizes(&self) -> bool {
        self.optimize
    }

    pub fn get(&self, name: &str) -> Option<Arc<ShaderModule>> {
        self.shaders.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register a module from SPIR-V words.
    pub fn create_from_binary(
        &mut self,
        name: &str,
        code: &[u32],
        stage: ShaderStage,
    ) -> Option<Arc<ShaderModule>> {
        if let Some(existing) = self.get(name) {
            return Some(existing);
        }

        match ShaderModule::new(&self.ctx, code, stage) {
            Ok(module) => {
                let module = Arc::new(module);
                self.shaders.insert(name.to_string(), Arc::clone(&module));
                tracing::debug!("Registered shader {name} ({stage})");
                Some(module)
            }
            Err(e) => {
                tracing::error!("Failed to create shader module {name}: {e}");
                None
            }
        }
    }

    /// Compile GLSL and register the result.
    pub fn create_from_source(
        &mut self,
        name: &str,
        source: &str,
        stage: ShaderStage,
    ) -> Option<Arc<ShaderModule>> {
        if let Some(existing) = self.get(name) {
            return Some(existing);
        }

        if self.compiler.is_none() {
            match ShaderCompiler::new() {
                Ok(compiler) => self.compiler = Some(compiler),
                Err(e) => {
                    tracing::error!("Cannot compile {name}: {e}");
                    return None;
                }
            }
        }
        let compiler = self.compiler.as_ref()?;

        let code = match compiler.compile(source, stage, name, self.optimize) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("{e}");
                return None;
            }
        };

        self.create_from_binary(name, &code, stage)
    }

    /// Register every `*.vert.spv` / `*.frag.spv` in `dir`.
    ///
    /// Returns the number of newly registered modules. A missing directory
    /// registers nothing.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        let files = match load_spirv_dir(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Skipping shader directory {}: {e}", dir.display());
                return 0;
            }
        };

        let before = self.len();
        for file in files {
            self.create_from_binary(&file.name, &file.code, file.stage);
        }
        let loaded = self.len() - before;
        tracing::info!("Loaded {loaded} shader(s) from {}", dir.display());
        loaded
    }

    /// Look up a fragment shader by name, with or without the `.frag` suffix.
    pub fn find_fragment(&self, name: &str) -> Option<Arc<ShaderModule>> {
        fragment_candidates(name)
            .iter()
            .filter_map(|candidate| self.get(candidate))
            .find(|module| module.stage() == ShaderStage::Fragment)
    }
}

/// Names tried, in order, when resolving a fragment shader.
fn fragment_candidates(name: &str) -> Vec<String> {
    let suffix = format!(".{}", ShaderStage::Fragment.suffix());
    if name.is_empty() {
        Vec::new()
    } else if name.ends_with(&suffix) {
        vec![name.to_string()]
    } else {
        vec![name.to_string(), format!("{name}{suffix}")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_is_on_by_default() {
        assert!(OPTIMIZE_BY_DEFAULT);
    }

    #[test]
    fn candidates_with_suffix() {
        assert_eq!(fragment_candidates("plasma.frag"), vec!["plasma.frag"]);
    }

    #[test]
    fn candidates_without_suffix() {
        assert_eq!(
            fragment_candidates("plasma"),
            vec!["plasma".to_string(), "plasma.frag".to_string()]
        );
    }

    #[test]
    fn candidates_empty() {
        assert!(fragment_candidates("").is_empty());
    }
}
