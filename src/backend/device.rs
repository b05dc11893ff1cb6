// Vulkan Context - the bring-up sequence
//
// Responsibilities:
// - Instance creation with optional validation layers
// - Debug messenger (validation only)
// - Window surface
// - Physical device selection (graphics + present capable)
// - Logical device + queue creation
//
// Every handle is destroyed in reverse order of creation, also when a later
// step fails halfway through.

use ash::vk;
use std::ffi::CString;

use super::debug::DEBUG_UTILS_EXTENSION;
use super::driver::{DeviceDesc, DeviceInfo, Driver, InstanceDesc, MessengerDesc};
use super::queue::{find_queue_families, QueueFamilies};
use super::InitError;

/// How to choose between several suitable GPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// First suitable device in enumeration order
    First,
    /// Prefer discrete, then integrated GPUs
    Discrete,
}

impl DevicePreference {
    fn score(self, device_type: vk::PhysicalDeviceType) -> u32 {
        match self {
            DevicePreference::First => 1,
            DevicePreference::Discrete => match device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            },
        }
    }
}

/// Validation settings. Their presence is what turns debug mode on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
    pub layers: Vec<String>,
    pub report_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitOptions {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    pub validation: Option<ValidationOptions>,
    pub device_preference: DevicePreference,
}

/// Handles acquired so far. Dropping releases them in reverse order.
struct OwnedHandles<D: Driver> {
    device: Option<vk::Device>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: Option<vk::SurfaceKHR>,
    instance: Option<vk::Instance>,
    driver: D,
}

impl<D: Driver> Drop for OwnedHandles<D> {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            log::info!("Destroying logical device");
            self.driver.destroy_device(device);
        }

        let Some(instance) = self.instance.take() else {
            return;
        };

        if let Some(messenger) = self.debug_messenger.take() {
            log::debug!("Destroying debug messenger");
            self.driver.destroy_debug_messenger(instance, messenger);
        }
        if let Some(surface) = self.surface.take() {
            log::debug!("Destroying surface");
            self.driver.destroy_surface(instance, surface);
        }

        log::info!("Destroying instance");
        self.driver.destroy_instance(instance);
    }
}

/// Everything created during bring-up.
///
/// Dropping the context tears it down: device, debug messenger, surface,
/// instance. The window must outlive it.
pub struct VulkanContext<D: Driver> {
    pub instance: vk::Instance,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub device_info: DeviceInfo,
    pub device: vk::Device,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    /// Only held for its Drop, which releases everything above
    _handles: OwnedHandles<D>,
}

impl<D: Driver> VulkanContext<D> {
    /// Run the bring-up sequence against `window`.
    pub fn new(driver: D, window: &D::Window, options: &InitOptions) -> Result<Self, InitError> {
        log::info!("Creating Vulkan context: {}", options.application_name);

        let mut handles = OwnedHandles {
            device: None,
            debug_messenger: None,
            surface: None,
            instance: None,
            driver,
        };

        // Step 1: Create instance
        let instance = Self::create_instance(&mut handles, window, options)?;

        // Step 2: Setup debug messenger if validation enabled
        let debug_messenger = match &options.validation {
            Some(validation) => Some(Self::setup_debug_messenger(&mut handles, instance, validation)?),
            None => None,
        };

        // Step 3: Create surface
        let surface = handles
            .driver
            .create_surface(instance, window)
            .map_err(InitError::SurfaceCreation)?;
        handles.surface = Some(surface);

        // Step 4: Pick physical device (GPU)
        let (physical_device, device_info, queue_families) =
            Self::pick_physical_device(&handles.driver, instance, surface, options.device_preference)?;

        log::info!("Selected GPU: {} ({:?})", device_info.name, device_info.device_type);
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(device_info.api_version),
            vk::api_version_minor(device_info.api_version),
            vk::api_version_patch(device_info.api_version)
        );
        log::info!(
            "Queue families: graphics={}, present={}",
            queue_families.graphics,
            queue_families.present
        );

        // Step 5: Create logical device
        let (device, graphics_queue, present_queue) =
            Self::create_logical_device(&mut handles, instance, physical_device, queue_families, options)?;

        log::info!("Vulkan context ready");

        Ok(Self {
            instance,
            debug_messenger,
            surface,
            physical_device,
            device_info,
            device,
            queue_families,
            graphics_queue,
            present_queue,
            _handles: handles,
        })
    }

    fn create_instance(
        handles: &mut OwnedHandles<D>,
        window: &D::Window,
        options: &InitOptions,
    ) -> Result<vk::Instance, InitError> {
        let mut layers = Vec::new();
        if let Some(validation) = &options.validation {
            layers = to_cstrings(&validation.layers)?;
            let available = handles
                .driver
                .available_layers()
                .map_err(InitError::LayerEnumeration)?;
            check_validation_layers(&layers, &available)?;
        }

        let desc = InstanceDesc {
            application_name: CString::new(options.application_name.as_str())?,
            application_version: options.application_version,
            engine_name: CString::new(options.engine_name.as_str())?,
            engine_version: options.engine_version,
            api_version: vk::API_VERSION_1_0,
            extensions: Self::required_extensions(&handles.driver, window, options)?,
            layers,
            debug_messenger: options
                .validation
                .as_ref()
                .map(|validation| MessengerDesc::new(validation.report_severity)),
        };

        log::debug!("Instance extensions: {:?}", desc.extensions);
        log::debug!("Instance layers: {:?}", desc.layers);

        let instance = handles
            .driver
            .create_instance(&desc)
            .map_err(InitError::InstanceCreation)?;
        handles.instance = Some(instance);

        Ok(instance)
    }

    /// Window-system extensions, plus debug utils when validating.
    fn required_extensions(
        driver: &D,
        window: &D::Window,
        options: &InitOptions,
    ) -> Result<Vec<CString>, InitError> {
        let mut extensions = driver.required_extensions(window)?;

        if options.validation.is_some() && !extensions.iter().any(|e| e.as_c_str() == DEBUG_UTILS_EXTENSION) {
            extensions.push(DEBUG_UTILS_EXTENSION.to_owned());
        }

        Ok(extensions)
    }

    fn setup_debug_messenger(
        handles: &mut OwnedHandles<D>,
        instance: vk::Instance,
        validation: &ValidationOptions,
    ) -> Result<vk::DebugUtilsMessengerEXT, InitError> {
        let desc = MessengerDesc::new(validation.report_severity);

        let messenger = handles
            .driver
            .create_debug_messenger(instance, &desc)
            .ok_or(InitError::UnsupportedExtension("VK_EXT_debug_utils"))?
            .map_err(InitError::DebugMessenger)?;
        handles.debug_messenger = Some(messenger);

        Ok(messenger)
    }

    fn pick_physical_device(
        driver: &D,
        instance: vk::Instance,
        surface: vk::SurfaceKHR,
        preference: DevicePreference,
    ) -> Result<(vk::PhysicalDevice, DeviceInfo, QueueFamilies), InitError> {
        let devices = driver
            .enumerate_physical_devices(instance)
            .map_err(InitError::DeviceQuery)?;

        if devices.is_empty() {
            return Err(InitError::NoGpu);
        }

        // Score each suitable device
        let mut best = None;
        let mut best_score = 0;

        for device in devices {
            let info = driver.device_info(instance, device).map_err(InitError::DeviceQuery)?;
            let families = driver
                .queue_families(instance, device)
                .map_err(InitError::DeviceQuery)?;

            let indices = find_queue_families(&families, |family| {
                driver.surface_support(device, family, surface)
            })
            .map_err(InitError::DeviceQuery)?;

            let Some(queue_families) = indices.complete() else {
                log::debug!("Skipping {}: {:?}", info.name, indices);
                continue;
            };

            let score = preference.score(info.device_type);
            if score > best_score {
                best_score = score;
                best = Some((device, info, queue_families));
            }

            if preference == DevicePreference::First {
                break;
            }
        }

        best.ok_or(InitError::NoSuitableGpu)
    }

    fn create_logical_device(
        handles: &mut OwnedHandles<D>,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: QueueFamilies,
        options: &InitOptions,
    ) -> Result<(vk::Device, vk::Queue, vk::Queue), InitError> {
        let layers = match &options.validation {
            Some(validation) => to_cstrings(&validation.layers)?,
            None => Vec::new(),
        };

        let desc = DeviceDesc {
            queue_families: queue_families.unique(),
            queue_priority: 1.0,
            layers,
            extensions: Vec::new(),
        };

        let device = handles
            .driver
            .create_device(instance, physical_device, &desc)
            .map_err(InitError::DeviceCreation)?;
        handles.device = Some(device);

        let graphics_queue = handles
            .driver
            .device_queue(device, queue_families.graphics, 0)
            .map_err(InitError::DeviceQuery)?;
        let present_queue = handles
            .driver
            .device_queue(device, queue_families.present, 0)
            .map_err(InitError::DeviceQuery)?;

        Ok((device, graphics_queue, present_queue))
    }
}

fn to_cstrings(names: &[String]) -> Result<Vec<CString>, InitError> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(InitError::from))
        .collect()
}

/// Every requested layer must be available by exact name.
fn check_validation_layers(requested: &[CString], available: &[CString]) -> Result<(), InitError> {
    match requested.iter().find(|&layer| !available.contains(layer)) {
        Some(missing) => Err(InitError::MissingValidationLayer(
            missing.to_string_lossy().into_owned(),
        )),
        None => Ok(()),
    }
}
