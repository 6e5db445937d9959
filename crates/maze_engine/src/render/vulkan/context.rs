//! Vulkan context management
//!
//! Instance (with validation in debug builds), window surface, physical device
//! selection and the shared [`VulkanDevice`].
//!
//! Everything created on the device must be dropped before the context: the
//! context destroys the surface and instance when it goes away.

use std::ffi::{CStr, CString};
use std::sync::Arc;

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Entry, Instance};

use crate::render::device::SharedDevice;
use crate::render::vulkan::{VulkanDevice, VulkanError, VulkanResult, Window};

/// Vulkan instance wrapper with RAII cleanup
///
/// In debug builds with validation requested, the instance also enables the
/// Khronos validation layer and a debug messenger that forwards messages to `log`.
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    #[cfg(debug_assertions)]
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the extensions `window` needs
    ///
    /// # Errors
    /// Returns [`VulkanError::InitializationFailed`] when the Vulkan loader is
    /// missing or GLFW reports no surface extensions, and [`VulkanError::Api`] when
    /// instance creation fails.
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name = CString::new("MazeEngine")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;
        let extension_names = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        #[allow(unused_mut)] // Extended with debug utils in debug builds
        let mut extensions: Vec<*const std::ffi::c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let validation = cfg!(debug_assertions) && enable_validation;
        #[cfg(debug_assertions)]
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names: Vec<CString> = if validation {
            vec![CString::new("VK_LAYER_KHRONOS_validation").map_err(|e| VulkanError::InitializationFailed(e.to_string()))?]
        } else {
            Vec::new()
        };
        let layers: Vec<*const std::ffi::c_char> = layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::Api)? };

        #[cfg(debug_assertions)]
        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!("Vulkan instance created (validation: {validation})");

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Selected physical device and the queue family used for graphics and present
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device name
    pub name: String,
    /// Queue family supporting both graphics and presentation to the surface
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the first device with a graphics+present queue family and swapchain support
    pub fn select_suitable_device(instance: &Instance, surface: vk::SurfaceKHR, surface_loader: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => {
                    log::info!("Selected GPU: {}", info.name);
                    return Ok(info);
                }
                Err(e) => log::debug!("Skipping GPU: {e}"),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut queue_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && present_support {
                queue_family = Some(index);
                break;
            }
        }
        let queue_family = queue_family.ok_or_else(|| {
            VulkanError::InitializationFailed(format!("{name}: no queue family with graphics and present support"))
        })?;

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(format!("{name}: swapchain extension not supported")));
        }

        Ok(Self {
            device,
            name,
            queue_family,
        })
    }
}

/// Main Vulkan context that owns the instance, surface and device
///
/// Dropping it waits for the device to go idle and destroys the surface, then
/// the device and finally the instance. Anything holding a
/// [`SharedDevice`] from [`VulkanContext::shared_device`] must be dropped
/// before the context, since the instance goes away with it.
///
/// # Device Selection
/// The first physical device with one queue family that supports both graphics
/// and presentation to the window's surface, and that exposes the swapchain
/// extension, is used.
pub struct VulkanContext {
    device: Arc<VulkanDevice>,
    physical_device: PhysicalDeviceInfo,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a context presenting to `window`
    ///
    /// Validation is enabled in debug builds.
    ///
    /// # Errors
    /// Fails when the instance or surface cannot be created, or when no physical
    /// device qualifies ([`VulkanError::InitializationFailed`]). The surface is
    /// destroyed again if device creation fails after it.
    pub fn new(window: &Window, app_name: &str) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, cfg!(debug_assertions))?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        let device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader)
            .and_then(|physical_device| {
                VulkanDevice::new(
                    &instance.instance,
                    physical_device.device,
                    physical_device.queue_family,
                    &[SwapchainLoader::name()],
                )
                .map(|device| (physical_device, device))
            });
        let (physical_device, device) = match device {
            Ok(pair) => pair,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: Arc::new(device),
            physical_device,
            surface,
            surface_loader,
            instance,
        })
    }

    /// The Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// The logical device
    pub fn device(&self) -> &VulkanDevice {
        &self.device
    }

    /// The logical device as a shared [`crate::render::RenderDevice`]
    pub fn shared_device(&self) -> SharedDevice {
        let device: SharedDevice = self.device.clone();
        device
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        if Arc::strong_count(&self.device) > 1 {
            log::error!("Vulkan context dropped while device resources are still alive");
        }
        unsafe {
            let _ = self.device.raw().device_wait_idle();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Fields drop in declaration order: the device goes before the instance
    }
}
