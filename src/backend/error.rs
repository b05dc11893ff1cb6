// Bring-up errors
//
// One variant per way the startup sequence can fail. Every variant is fatal:
// the sequence stops, releases what it already acquired, and the caller
// reports the error once.

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("name contains an interior nul byte: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("failed to enumerate instance layers: {0}")]
    LayerEnumeration(vk::Result),

    #[error("validation layer {0} requested, but not available")]
    MissingValidationLayer(String),

    #[error("failed to query required instance extensions: {0}")]
    RequiredExtensions(vk::Result),

    #[error("failed to create instance: {0}")]
    InstanceCreation(vk::Result),

    /// The instance was created but the extension's entry points did not resolve.
    #[error("extension {0} is not supported by the driver")]
    UnsupportedExtension(&'static str),

    #[error("failed to set up debug messenger: {0}")]
    DebugMessenger(vk::Result),

    #[error("failed to create window surface: {0}")]
    SurfaceCreation(vk::Result),

    #[error("failed to find GPUs with Vulkan support")]
    NoGpu,

    #[error("no GPU supports both graphics and presentation to the window surface")]
    NoSuitableGpu,

    #[error("failed to query physical device: {0}")]
    DeviceQuery(vk::Result),

    #[error("failed to create logical device: {0}")]
    DeviceCreation(vk::Result),
}
