// Driver - the native calls the bring-up sequence depends on
//
// The sequence in `device.rs` only ever talks to the GPU and the window system
// through this trait. `AshDriver` is the real implementation; tests drive the
// sequence with a scripted one.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CString;

use super::InitError;

/// Everything needed to create an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDesc {
    pub application_name: CString,
    pub application_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
    /// Chained onto instance creation so that creation and destruction of the
    /// instance itself are covered by the validation layers.
    pub debug_messenger: Option<MessengerDesc>,
}

/// Debug messenger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessengerDesc {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    /// Messages below this severity are delivered but not reported.
    pub report_threshold: vk::DebugUtilsMessageSeverityFlagsEXT,
}

/// Everything needed to create a logical device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDesc {
    /// One queue is created per entry; entries are unique.
    pub queue_families: Vec<u32>,
    pub queue_priority: f32,
    pub layers: Vec<CString>,
    pub extensions: Vec<CString>,
}

/// The parts of `VkPhysicalDeviceProperties` used for selection and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
}

pub trait Driver {
    /// Whatever the surface is created from.
    type Window: ?Sized;

    /// Instance extensions the window system needs to present to `window`.
    fn required_extensions(&self, window: &Self::Window) -> Result<Vec<CString>, InitError>;

    fn available_layers(&self) -> VkResult<Vec<CString>>;

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance>;

    fn destroy_instance(&mut self, instance: vk::Instance);

    /// Returns `None` when the debug-utils entry points were not resolved for
    /// this instance.
    fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
        desc: &MessengerDesc,
    ) -> Option<VkResult<vk::DebugUtilsMessengerEXT>>;

    fn destroy_debug_messenger(&mut self, instance: vk::Instance, messenger: vk::DebugUtilsMessengerEXT);

    fn create_surface(&mut self, instance: vk::Instance, window: &Self::Window) -> VkResult<vk::SurfaceKHR>;

    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>>;

    fn device_info(&self, instance: vk::Instance, physical_device: vk::PhysicalDevice) -> VkResult<DeviceInfo>;

    fn queue_families(
        &self,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>>;

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;

    fn create_device(
        &mut self,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device>;

    fn device_queue(&self, device: vk::Device, queue_family: u32, index: u32) -> VkResult<vk::Queue>;

    fn destroy_device(&mut self, device: vk::Device);
}
