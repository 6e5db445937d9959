//! Vulkan swapchain management
//!
//! Handles swapchain creation, recreation, acquisition and presentation

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use crate::render::main_pass::MainPassTarget;
use crate::render::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// Swapchain management wrapper with RAII cleanup
///
/// Owns the presentable images' views and presents on the device's graphics
/// queue, which [`crate::render::vulkan::context::PhysicalDeviceInfo`] picked to
/// support presentation as well.
///
/// # Format Selection
/// Prefers `B8G8R8A8_SRGB` with a non-linear sRGB color space and falls back to
/// the first format the surface reports.
///
/// # Present Mode
/// Uses `MAILBOX` when available, else `FIFO`, which every implementation supports.
///
/// # Resize Handling
/// There is no in-place recreate. A resize builds a new swapchain with
/// [`Swapchain::new`], passing the current one as `old`, then drops the old one.
pub struct Swapchain {
    device: ash::Device,
    queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the context's surface, retiring `old` if given
    ///
    /// `window_extent` is only used when the surface leaves the extent to the
    /// application; it is clamped to the surface's limits. One image more than the
    /// surface minimum is requested.
    ///
    /// # Errors
    /// Returns [`VulkanError::NoSupportedFormat`] when the surface reports no
    /// formats, and [`VulkanError::Api`] for failed surface queries, swapchain or
    /// image view creation. Views created before a failure are destroyed.
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D, old: Option<&Swapchain>) -> VulkanResult<Self> {
        let device = context.device().raw().clone();
        let physical_device = context.physical_device().device;
        let surface = context.surface();
        let surface_loader = context.surface_loader();
        let swapchain_loader = SwapchainLoader::new(context.instance(), &device);

        let surface_caps = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let format = surface_formats
            .iter()
            .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .or_else(|| surface_formats.first())
            .copied()
            .ok_or_else(|| VulkanError::NoSupportedFormat(vec![vk::Format::B8G8R8A8_SRGB]))?;

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_mode = present_modes
            .iter()
            .copied()
            .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO);

        let extent = if surface_caps.current_extent.width == u32::MAX {
            vk::Extent2D {
                width: window_extent
                    .width
                    .clamp(surface_caps.min_image_extent.width, surface_caps.max_image_extent.width),
                height: window_extent
                    .height
                    .clamp(surface_caps.min_image_extent.height, surface_caps.max_image_extent.height),
            }
        } else {
            surface_caps.current_extent
        };

        let image_count = if surface_caps.max_image_count > 0 {
            (surface_caps.min_image_count + 1).min(surface_caps.max_image_count)
        } else {
            surface_caps.min_image_count + 1
        };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or_else(vk::SwapchainKHR::null, |old| old.swapchain));

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let mut result = Self {
            device,
            queue: context.device().queue(),
            swapchain_loader,
            swapchain,
            image_views: Vec::new(),
            format,
            extent,
        };

        // Views are pushed one by one so a failure part-way is cleaned up by Drop
        let images = unsafe {
            result
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };
        for image in images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { result.device.create_image_view(&create_info, None).map_err(VulkanError::Api)? };
            result.image_views.push(view);
        }

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            result.image_views.len(),
            format.format,
            present_mode
        );
        Ok(result)
    }

    /// Swapchain images as a main-pass target
    ///
    /// The main pass leaves each image in `PRESENT_SRC_KHR`.
    pub fn target(&self) -> MainPassTarget {
        MainPassTarget {
            format: self.format.format,
            extent: self.extent,
            views: self.image_views.clone(),
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Acquire the next image, signalling `image_available`
    ///
    /// Returns `None` when the swapchain is out of date and must be recreated.
    pub fn acquire_next_image(&self, image_available: vk::Semaphore) -> VulkanResult<Option<u32>> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
        };
        match result {
            Ok((index, _suboptimal)) => Ok(Some(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Present `image_index` after `render_finished`
    ///
    /// Returns `true` when the swapchain should be recreated.
    pub fn present(&self, image_index: u32, render_finished: vk::Semaphore) -> VulkanResult<bool> {
        let wait_semaphores = [render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
