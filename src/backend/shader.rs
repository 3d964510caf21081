// Shader module loading
//
// Vulkan consumes SPIR-V words. Files are read whole and validated by
// `ash::util::read_spv` before a module is created from them.

use ash::vk;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use super::device::Device;
use super::{BackendError, BackendResult};

/// Read a compiled SPIR-V file into 32-bit words.
pub fn read_shader_file(path: &Path) -> BackendResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| BackendError::ShaderFileNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| BackendError::InvalidShader {
        path: path.to_path_buf(),
        source,
    })
}

/// A shader module, destroyed on drop.
pub struct ShaderModule {
    pub handle: vk::ShaderModule,
    device: Arc<Device>,
}

impl ShaderModule {
    pub fn from_file(device: &Arc<Device>, path: &Path) -> BackendResult<Self> {
        let code = read_shader_file(path)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let handle = unsafe { device.device.create_shader_module(&create_info, None) }?;

        log::debug!("Loaded shader {:?} ({} words)", path, code.len());

        Ok(Self {
            handle,
            device: device.clone(),
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_shader_module(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("canvas-renderer-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let path = Path::new("shaders/does-not-exist.spv");
        match read_shader_file(path) {
            Err(BackendError::ShaderFileNotFound { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected ShaderFileNotFound, got {:?}", other.map(|w| w.len())),
        }
    }

    #[test]
    fn truncated_file_is_invalid() {
        let path = temp_file("truncated.spv", &[0x03, 0x02, 0x23]);
        let result = read_shader_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(BackendError::InvalidShader { .. })));
    }

    #[test]
    fn reads_words_of_spirv_file() {
        let mut bytes = Vec::new();
        for word in [0x0723_0203u32, 0x0001_0000, 0, 1, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let path = temp_file("header.spv", &bytes);
        let words = read_shader_file(&path);
        std::fs::remove_file(&path).unwrap();

        let words = words.unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], 0x0723_0203);
    }
}
