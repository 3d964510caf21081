// Backend error types
//
// Construction-time failures are fatal and surface as `BackendError`.
// Swapchain staleness is not an error: see `AcquiredImage` / `PresentStatus`.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Validation layers requested, but {0} is not available")]
    ValidationUnavailable(String),

    #[error("Missing required instance extension: {0}")]
    MissingRequiredExtension(String),

    #[error("No suitable GPU found among {0} devices")]
    NoSuitableDevice(usize),

    #[error("No supported format among {0:?}")]
    NoSupportedFormat(Vec<vk::Format>),

    #[error("No memory type matches filter {type_filter:#b} with {properties:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    #[error("Failed to open shader file {path:?}: {source}")]
    ShaderFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shader file {path:?} is not valid SPIR-V: {source}")]
    InvalidShader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A model needs at least one vertex")]
    EmptyModel,

    #[error("Unsupported window system: {0}")]
    UnsupportedPlatform(String),

    #[error("Window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Swapchain has not been created")]
    SwapchainUnavailable,

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
