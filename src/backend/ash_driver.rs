// AshDriver - the Driver implementation backed by the Vulkan loader
//
// Holds the loaded function tables (entry, instance, device) so the bring-up
// sequence only needs to carry raw handles around. One instance and one
// device per driver.

use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use winit::window::Window;

use super::debug::{self, DEBUG_UTILS_EXTENSION};
use super::driver::{DeviceDesc, DeviceInfo, Driver, InstanceDesc, MessengerDesc};
use super::InitError;

/// Optional instance-level entry points, resolved once at instance creation.
#[derive(Default)]
struct ExtensionTable {
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    surface: Option<ash::khr::surface::Instance>,
}

impl ExtensionTable {
    fn load(entry: &Entry, instance: &ash::Instance, desc: &InstanceDesc) -> Self {
        let enabled = |name: &CStr| desc.extensions.iter().any(|e| e.as_c_str() == name);

        let debug_utils = (enabled(DEBUG_UTILS_EXTENSION)
            && resolves(entry, instance, c"vkCreateDebugUtilsMessengerEXT")
            && resolves(entry, instance, c"vkDestroyDebugUtilsMessengerEXT"))
        .then(|| ash::ext::debug_utils::Instance::new(entry, instance));

        let surface = (enabled(ash::khr::surface::NAME)
            && resolves(entry, instance, c"vkDestroySurfaceKHR"))
        .then(|| ash::khr::surface::Instance::new(entry, instance));

        log::debug!(
            "Extension table: debug_utils={}, surface={}",
            debug_utils.is_some(),
            surface.is_some()
        );

        Self { debug_utils, surface }
    }
}

fn resolves(entry: &Entry, instance: &ash::Instance, name: &CStr) -> bool {
    unsafe { entry.get_instance_proc_addr(instance.handle(), name.as_ptr()) }.is_some()
}

pub struct AshDriver {
    device: Option<ash::Device>,
    extensions: ExtensionTable,
    instance: Option<ash::Instance>,
    entry: Entry,
}

impl AshDriver {
    pub fn load() -> Result<Self, InitError> {
        let entry = unsafe { Entry::load() }?;
        Ok(Self {
            device: None,
            extensions: ExtensionTable::default(),
            instance: None,
            entry,
        })
    }

    fn instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&ash::khr::surface::Instance> {
        self.extensions.surface.as_ref().ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
    }
}

/// Destroy `handle` through its table entry, or warn that it leaks when the
/// entry was never loaded. Returns whether `destroy` ran.
fn destroy_with<L, H: std::fmt::Debug>(
    loader: Option<&L>,
    kind: &str,
    handle: H,
    destroy: impl FnOnce(&L, H),
) -> bool {
    match loader {
        Some(loader) => {
            destroy(loader, handle);
            true
        }
        None => {
            log::warn!("No {} functions loaded, leaking {:?}", kind, handle);
            false
        }
    }
}

fn as_ptrs(names: &[CString]) -> Vec<*const std::ffi::c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

impl Driver for AshDriver {
    type Window = Window;

    fn required_extensions(&self, window: &Window) -> Result<Vec<CString>, InitError> {
        let display_handle = window.display_handle()?.as_raw();
        let names = ash_window::enumerate_required_extensions(display_handle)
            .map_err(InitError::RequiredExtensions)?;

        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn available_layers(&self) -> VkResult<Vec<CString>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }?;
        Ok(layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .map(CStr::to_owned)
            .collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo::default()
            .application_name(&desc.application_name)
            .application_version(desc.application_version)
            .engine_name(&desc.engine_name)
            .engine_version(desc.engine_version)
            .api_version(desc.api_version);

        let extensions = as_ptrs(&desc.extensions);
        let layers = as_ptrs(&desc.layers);

        let mut debug_info = desc.debug_messenger.as_ref().map(debug::messenger_create_info);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        if let Some(debug_info) = debug_info.as_mut() {
            create_info = create_info.push_next(debug_info);
        }

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;

        self.extensions = ExtensionTable::load(&self.entry, &instance, desc);
        let handle = instance.handle();
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.extensions = ExtensionTable::default();
        if let Some(instance) = self.instance.take() {
            unsafe { instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        desc: &MessengerDesc,
    ) -> Option<VkResult<vk::DebugUtilsMessengerEXT>> {
        let debug_utils = self.extensions.debug_utils.as_ref()?;
        let create_info = debug::messenger_create_info(desc);
        Some(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) })
    }

    fn destroy_debug_messenger(&mut self, _instance: vk::Instance, messenger: vk::DebugUtilsMessengerEXT) {
        let debug_utils = self.extensions.debug_utils.as_ref();
        destroy_with(debug_utils, "debug messenger", messenger, |debug_utils, messenger| unsafe {
            debug_utils.destroy_debug_utils_messenger(messenger, None)
        });
    }

    fn create_surface(&mut self, _instance: vk::Instance, window: &Window) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        let display_handle = window
            .display_handle()
            .map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?
            .as_raw();

        unsafe { ash_window::create_surface(&self.entry, instance, display_handle, window_handle, None) }
    }

    fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        destroy_with(self.surface_loader().ok(), "surface", surface, |loader, surface| unsafe {
            loader.destroy_surface(surface, None)
        });
    }

    fn enumerate_physical_devices(&self, _instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
    }

    fn device_info(&self, _instance: vk::Instance, physical_device: vk::PhysicalDevice) -> VkResult<DeviceInfo> {
        let props = unsafe { self.instance()?.get_physical_device_properties(physical_device) };
        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DeviceInfo {
            name,
            device_type: props.device_type,
            api_version: props.api_version,
        })
    }

    fn queue_families(
        &self,
        _instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe {
            self.instance()?
                .get_physical_device_queue_family_properties(physical_device)
        })
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(physical_device, queue_family, surface)
        }
    }

    fn create_device(
        &mut self,
        _instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        let priorities = [desc.queue_priority];
        let queue_create_infos: Vec<_> = desc
            .queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extensions = as_ptrs(&desc.extensions);
        let layers = as_ptrs(&desc.layers);
        let features = vk::PhysicalDeviceFeatures::default();

        // Device layers are ignored by current loaders but older ones still read them
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers)
            .enabled_features(&features);

        let device = unsafe {
            self.instance()?
                .create_device(physical_device, &create_info, None)
        }?;

        let handle = device.handle();
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, _device: vk::Device, queue_family: u32, index: u32) -> VkResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(queue_family, index) })
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_destroy_runs_through_loaded_entry() {
        let surface = vk::SurfaceKHR::from_raw(0x42);
        let mut destroyed = None;

        let ran = destroy_with(Some(&()), "surface", surface, |_, surface| destroyed = Some(surface));

        assert!(ran);
        assert_eq!(destroyed, Some(surface));
    }

    #[test]
    fn test_destroy_without_entry_does_not_run() {
        let messenger = vk::DebugUtilsMessengerEXT::from_raw(0x7);
        let mut called = false;

        let ran = destroy_with(None::<&()>, "debug messenger", messenger, |_, _| called = true);

        assert!(!ran);
        assert!(!called);
    }
}
