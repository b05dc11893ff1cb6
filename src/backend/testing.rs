// Scripted driver for tests
//
// Records every call into a shared journal and counts live handles, so tests
// can check creation order, teardown order and leaks without a GPU.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

use super::driver::{DeviceDesc, DeviceInfo, Driver, InstanceDesc, MessengerDesc};
use super::InitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    AvailableLayers,
    CreateInstance,
    CreateDebugMessenger,
    CreateSurface,
    EnumeratePhysicalDevices,
    SurfaceSupport(u32),
    CreateDevice,
    DeviceQueue(u32),
    DestroyDevice,
    DestroyDebugMessenger,
    DestroySurface,
    DestroyInstance,
}

impl Call {
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Call::CreateInstance | Call::CreateDebugMessenger | Call::CreateSurface | Call::CreateDevice
        )
    }

    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Call::DestroyInstance | Call::DestroyDebugMessenger | Call::DestroySurface | Call::DestroyDevice
        )
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    pub calls: Vec<Call>,
    /// Created minus destroyed handles
    pub live: i32,
    pub instance_desc: Option<InstanceDesc>,
    pub device_desc: Option<DeviceDesc>,
    pub selected: Option<vk::PhysicalDevice>,
}

#[derive(Debug, Clone, Copy)]
pub struct MockFamily {
    pub graphics: bool,
    pub present: bool,
}

#[derive(Debug, Clone)]
pub struct MockGpu {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub families: Vec<MockFamily>,
}

impl MockGpu {
    pub fn discrete(name: &str) -> Self {
        Self::new(name, vk::PhysicalDeviceType::DISCRETE_GPU)
    }

    pub fn integrated(name: &str) -> Self {
        Self::new(name, vk::PhysicalDeviceType::INTEGRATED_GPU)
    }

    fn new(name: &str, device_type: vk::PhysicalDeviceType) -> Self {
        Self {
            name: name.to_string(),
            device_type,
            families: Vec::new(),
        }
    }

    pub fn family(mut self, graphics: bool, present: bool) -> Self {
        self.families.push(MockFamily { graphics, present });
        self
    }

    /// Handle of the GPU at `index` in the driver's list
    pub fn handle(index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(0x10 + index as u64)
    }
}

pub struct MockDriver {
    pub layers: Vec<String>,
    pub debug_utils: bool,
    pub gpus: Vec<MockGpu>,
    /// The create call that should fail
    pub fail: Option<Call>,
    journal: Rc<RefCell<Journal>>,
}

impl MockDriver {
    /// One discrete GPU with a single graphics + present family, validation
    /// layer and debug utils available.
    pub fn new() -> (Self, Rc<RefCell<Journal>>) {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let driver = Self {
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            debug_utils: true,
            gpus: vec![MockGpu::discrete("Mock GPU").family(true, true)],
            fail: None,
            journal: journal.clone(),
        };
        (driver, journal)
    }

    fn record(&self, call: Call) {
        self.journal.borrow_mut().calls.push(call);
    }

    fn create<T: Handle>(&self, call: Call, raw: u64) -> VkResult<T> {
        self.record(call);
        if self.fail == Some(call) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        self.journal.borrow_mut().live += 1;
        Ok(T::from_raw(raw))
    }

    fn destroy(&self, call: Call) {
        self.record(call);
        self.journal.borrow_mut().live -= 1;
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> VkResult<&MockGpu> {
        let index = physical_device.as_raw().wrapping_sub(0x10) as usize;
        self.gpus.get(index).ok_or(vk::Result::ERROR_DEVICE_LOST)
    }
}

impl Driver for MockDriver {
    type Window = ();

    fn required_extensions(&self, _window: &()) -> Result<Vec<CString>, InitError> {
        Ok(vec![CString::from(c"VK_KHR_surface")])
    }

    fn available_layers(&self) -> VkResult<Vec<CString>> {
        self.record(Call::AvailableLayers);
        Ok(self
            .layers
            .iter()
            .map(|layer| CString::new(layer.as_str()).unwrap())
            .collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        let instance = self.create(Call::CreateInstance, 1)?;
        self.journal.borrow_mut().instance_desc = Some(desc.clone());
        Ok(instance)
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.destroy(Call::DestroyInstance);
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        _desc: &MessengerDesc,
    ) -> Option<VkResult<vk::DebugUtilsMessengerEXT>> {
        if !self.debug_utils {
            return None;
        }
        Some(self.create(Call::CreateDebugMessenger, 2))
    }

    fn destroy_debug_messenger(&mut self, _instance: vk::Instance, _messenger: vk::DebugUtilsMessengerEXT) {
        self.destroy(Call::DestroyDebugMessenger);
    }

    fn create_surface(&mut self, _instance: vk::Instance, _window: &()) -> VkResult<vk::SurfaceKHR> {
        self.create(Call::CreateSurface, 3)
    }

    fn destroy_surface(&mut self, _instance: vk::Instance, _surface: vk::SurfaceKHR) {
        self.destroy(Call::DestroySurface);
    }

    fn enumerate_physical_devices(&self, _instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.record(Call::EnumeratePhysicalDevices);
        Ok((0..self.gpus.len()).map(MockGpu::handle).collect())
    }

    fn device_info(&self, _instance: vk::Instance, physical_device: vk::PhysicalDevice) -> VkResult<DeviceInfo> {
        let gpu = self.gpu(physical_device)?;
        Ok(DeviceInfo {
            name: gpu.name.clone(),
            device_type: gpu.device_type,
            api_version: vk::API_VERSION_1_0,
        })
    }

    fn queue_families(
        &self,
        _instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        let gpu = self.gpu(physical_device)?;
        Ok(gpu
            .families
            .iter()
            .map(|family| vk::QueueFamilyProperties {
                queue_flags: if family.graphics {
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER
                } else {
                    vk::QueueFlags::TRANSFER
                },
                queue_count: 1,
                ..Default::default()
            })
            .collect())
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.record(Call::SurfaceSupport(queue_family));
        let gpu = self.gpu(physical_device)?;
        gpu.families
            .get(queue_family as usize)
            .map(|family| family.present)
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn create_device(
        &mut self,
        _instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        let device = self.create(Call::CreateDevice, 4)?;
        let mut journal = self.journal.borrow_mut();
        journal.device_desc = Some(desc.clone());
        journal.selected = Some(physical_device);
        Ok(device)
    }

    fn device_queue(&self, _device: vk::Device, queue_family: u32, _index: u32) -> VkResult<vk::Queue> {
        self.record(Call::DeviceQueue(queue_family));
        Ok(vk::Queue::from_raw(0x100 + u64::from(queue_family)))
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        self.destroy(Call::DestroyDevice);
    }
}
