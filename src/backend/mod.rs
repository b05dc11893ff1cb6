// Backend module - Vulkan bring-up
//
// Design: thin wrapper around ash, with the native calls behind a trait so the
// startup sequence can be exercised without a GPU.

pub mod ash_driver;
pub mod debug;
pub mod device;
pub mod driver;
pub mod error;
pub mod queue;

#[cfg(test)]
pub mod testing;

pub use ash_driver::AshDriver;
pub use device::{DevicePreference, InitOptions, ValidationOptions, VulkanContext};
pub use error::InitError;
