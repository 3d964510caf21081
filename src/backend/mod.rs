// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. Each type owns its Vulkan objects and releases
// them on drop; everything holds an `Arc<Device>` so the device goes last.

pub mod buffer;
pub mod device;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod render_system;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::{Device, DeviceConfig, Validation};
pub use error::{BackendError, BackendResult};
pub use model::{Model, Vertex};
pub use render::{Render, RenderSettings};
pub use render_system::{RenderSystem, ShaderPaths};
pub use surface::GraphicsCanvas;
