//! SPIR-V loading.

use crate::error::{Result, ShaderError};
use crate::stage::ShaderStage;
use std::path::Path;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Convert raw bytes to SPIR-V words.
///
/// The byte length must be a non-zero multiple of four and the first word
/// must be the SPIR-V magic number. Byte-swapped modules are accepted and
/// converted to host order.
pub fn bytes_to_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() {
        return Err(ShaderError::InvalidSpirv("empty module".to_string()));
    }
    if bytes.len() % 4 != 0 {
        return Err(ShaderError::InvalidSpirv(format!(
            "length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let mut words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] == SPIRV_MAGIC.swap_bytes() {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    } else if words[0] != SPIRV_MAGIC {
        return Err(ShaderError::InvalidSpirv(format!(
            "bad magic number {:#010x}",
            words[0]
        )));
    }

    Ok(words)
}

/// A precompiled shader found on disk.
#[derive(Debug, Clone)]
pub struct SpirvFile {
    /// Registered name, `<name>.<stage>`.
    pub name: String,
    pub stage: ShaderStage,
    pub code: Vec<u32>,
}

/// Load every `<name>.vert.<ext>` and `<name>.frag.<ext>` file in `dir`.
///
/// Files for other stages are ignored. Files that cannot be read or do not
/// hold SPIR-V are skipped with an error log. The result is sorted by name.
pub fn load_spirv_dir(dir: impl AsRef<Path>) -> Result<Vec<SpirvFile>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|source| ShaderError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((name, stage)) = ShaderStage::from_file_name(file_name) else {
            tracing::trace!("Skipping {}: not a vertex or fragment shader", path.display());
            continue;
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to read shader {}: {}", path.display(), e);
                continue;
            }
        };

        match bytes_to_spirv(&bytes) {
            Ok(code) => files.push(SpirvFile { name, stage, code }),
            Err(e) => tracing::error!("Failed to load shader {}: {}", path.display(), e),
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
