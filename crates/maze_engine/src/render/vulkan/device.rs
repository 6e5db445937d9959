//! Logical device, graphics queue and command pool
//!
//! [`VulkanDevice`] is the ash implementation of [`RenderDevice`]. Every trait
//! method is a direct translation to the corresponding `vk*` call; ordering and
//! synchronization are entirely the caller's responsibility.

use std::ffi::{c_char, CStr};
use std::io::Cursor;

use ash::vk;

use crate::render::device::{
    AllocatedBuffer, AllocatedImage, DescriptorWrite, DeviceResource, ImageCopy, ImageDesc,
    ImageTransition, ImageViewDesc, PipelineDesc, RenderDevice, RenderPassDesc, SamplerDesc,
    Submission,
};
use crate::render::mesh::Vertex;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Depth formats in order of preference
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Dependency ordering a render pass after whatever last touched its attachments
///
/// The depth attachment is reused by every pass and face. The previous pass's
/// depth writes may finish in late fragment tests, so those writes are waited on
/// before this pass clears and writes the attachment again.
fn external_dependency() -> vk::SubpassDependency {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .dst_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .build()
}

/// Logical device wrapper with RAII cleanup
///
/// Holds a single queue used for graphics, transfers and presentation, and a
/// command pool whose buffers can be reset individually. The first supported
/// depth format (`D32_SFLOAT`, then the stencil variants) is looked up once at
/// creation.
pub struct VulkanDevice {
    device: ash::Device,
    queue: vk::Queue,
    queue_family: u32,
    command_pool: vk::CommandPool,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    depth_format: Option<vk::Format>,
}

impl VulkanDevice {
    /// Create the logical device with one queue from `queue_family`
    ///
    /// # Errors
    /// Returns [`VulkanError::Api`] when device or command pool creation fails.
    /// A device created before a failing pool is destroyed.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        extensions: &[&CStr],
    ) -> VulkanResult<Self> {
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build()];
        let extension_names: Vec<*const c_char> = extensions.iter().map(|name| name.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .create_device(physical_device, &create_info, None)
                .map_err(VulkanError::Api)?
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);
        let command_pool = match unsafe { device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(VulkanError::Api(e));
            }
        };

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let depth_format = DEPTH_FORMAT_CANDIDATES.iter().copied().find(|&format| {
            let properties = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
            properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        });

        log::debug!("Logical device created on queue family {queue_family}, depth format {depth_format:?}");

        Ok(Self {
            device,
            queue,
            queue_family,
            command_pool,
            memory_properties,
            depth_format,
        })
    }

    /// Raw ash device, for swapchain and presentation code
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Graphics (and present) queue
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Queue family of [`VulkanDevice::queue`]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    fn allocate_memory(&self, requirements: vk::MemoryRequirements, properties: vk::MemoryPropertyFlags) -> VulkanResult<vk::DeviceMemory> {
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(self.find_memory_type(requirements.memory_type_bits, properties)?);

        unsafe { self.device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api) }
    }
}

impl RenderDevice for VulkanDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<AllocatedBuffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory = match self.allocate_memory(requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(AllocatedBuffer { buffer, memory, size })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > buffer.size {
            return Err(VulkanError::invalid(format!(
                "writing {} bytes into a {} byte buffer",
                bytes.len(),
                buffer.size
            )));
        }

        unsafe {
            let data = self
                .device
                .map_memory(buffer.memory, 0, bytes.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), data.cast::<u8>(), bytes.len());
            self.device.unmap_memory(buffer.memory);
        }
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> VulkanResult<AllocatedImage> {
        let image_info = vk::ImageCreateInfo::builder()
            .flags(desc.flags)
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(desc.array_layers)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe { self.device.create_image(&image_info, None).map_err(VulkanError::Api)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let memory = match self.allocate_memory(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            unsafe {
                self.device.destroy_image(image, None);
                self.device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(AllocatedImage { image, memory })
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(desc.image)
            .view_type(desc.view_type)
            .format(desc.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: desc.layer_count,
            });

        unsafe { self.device.create_image_view(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> VulkanResult<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(desc.filter)
            .min_filter(desc.filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(desc.address_mode)
            .address_mode_v(desc.address_mode)
            .address_mode_w(desc.address_mode)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(0.0);

        unsafe { self.device.create_sampler(&create_info, None).map_err(VulkanError::Api) }
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                type_filter & (1 << i) != 0
                    && self.memory_properties.memory_types[i as usize]
                        .property_flags
                        .contains(properties)
            })
            .ok_or(VulkanError::NoSuitableMemoryType)
    }

    fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        self.depth_format
            .ok_or_else(|| VulkanError::NoSupportedFormat(DEPTH_FORMAT_CANDIDATES.to_vec()))
    }

    fn create_shader_module(&self, code: &[u8]) -> VulkanResult<vk::ShaderModule> {
        let words = ash::util::read_spv(&mut Cursor::new(code))
            .map_err(|e| VulkanError::invalid(format!("invalid SPIR-V: {e}")))?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

        unsafe { self.device.create_shader_module(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> VulkanResult<vk::RenderPass> {
        let attachments = [
            vk::AttachmentDescription::builder()
                .format(desc.color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(desc.color_initial_layout)
                .final_layout(desc.color_final_layout)
                .build(),
            vk::AttachmentDescription::builder()
                .format(desc.depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build()];

        let dependencies = [external_dependency()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { self.device.create_render_pass(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.create_framebuffer(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);

        unsafe {
            self.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_descriptor_pool(
        &self,
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> VulkanResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(max_sets);

        unsafe { self.device.create_descriptor_pool(&create_info, None).map_err(VulkanError::Api) }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info).map_err(VulkanError::Api)? };
        sets.into_iter()
            .next()
            .ok_or_else(|| VulkanError::invalid("descriptor set allocation returned nothing"))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) -> VulkanResult<()> {
        enum Info {
            Buffer([vk::DescriptorBufferInfo; 1]),
            Images(Vec<vk::DescriptorImageInfo>),
        }

        let infos: Vec<(u32, Info)> = writes
            .iter()
            .map(|write| match write {
                DescriptorWrite::UniformBuffer { binding, buffer, range } => (
                    *binding,
                    Info::Buffer([vk::DescriptorBufferInfo {
                        buffer: *buffer,
                        offset: 0,
                        range: *range,
                    }]),
                ),
                DescriptorWrite::CombinedImageSamplers { binding, images } => (
                    *binding,
                    Info::Images(
                        images
                            .iter()
                            .map(|&(image_view, sampler)| vk::DescriptorImageInfo {
                                sampler,
                                image_view,
                                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                            })
                            .collect(),
                    ),
                ),
            })
            .collect();

        let descriptor_writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(binding, info)| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(0);
                match info {
                    Info::Buffer(buffer_info) => write
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(buffer_info)
                        .build(),
                    Info::Images(image_info) => write
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(image_info)
                        .build(),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&descriptor_writes, &[]) };
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        unsafe { self.device.create_pipeline_layout(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> VulkanResult<vk::Pipeline> {
        let entry_point = CStr::from_bytes_with_nul(b"main\0")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(desc.vertex_shader)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(desc.fragment_shader)
                .name(entry_point)
                .build(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.extent.width as f32,
            height: desc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: desc.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| VulkanError::Api(e))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::invalid("pipeline creation returned nothing"))
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.create_semaphore(&create_info, None).map_err(VulkanError::Api) }
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&create_info, None).map_err(VulkanError::Api) }
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX).map_err(VulkanError::Api) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[fence]).map_err(VulkanError::Api) }
    }

    fn submit(&self, submission: &Submission<'_>) -> VulkanResult<()> {
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(submission.wait_semaphores)
            .wait_dst_stage_mask(submission.wait_stages)
            .command_buffers(submission.command_buffers)
            .signal_semaphores(submission.signal_semaphores)
            .build();

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], submission.fence.unwrap_or_else(vk::Fence::null))
                .map_err(VulkanError::Api)
        }
    }

    fn queue_wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.queue_wait_idle(self.queue).map_err(VulkanError::Api) }
    }

    fn device_wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    fn allocate_command_buffer(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info).map_err(VulkanError::Api)? };
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::invalid("command buffer allocation returned nothing"))
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, usage: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(usage);
        unsafe { self.device.begin_command_buffer(cmd, &begin_info).map_err(VulkanError::Api) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe { self.device.end_command_buffer(cmd).map_err(VulkanError::Api) }
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    fn cmd_transition_image_layout(&self, cmd: vk::CommandBuffer, transition: &ImageTransition) -> VulkanResult<()> {
        let (src_access, dst_access, src_stage, dst_stage) = transition.barrier_scope();
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(transition.old_layout)
            .new_layout(transition.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(transition.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: transition.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: transition.base_layer,
                layer_count: transition.layer_count,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        Ok(())
    }

    fn cmd_copy_image(&self, cmd: vk::CommandBuffer, copy: &ImageCopy) -> VulkanResult<()> {
        let layers = |base_array_layer| vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer,
            layer_count: 1,
        };
        let region = vk::ImageCopy {
            src_subresource: layers(0),
            src_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            dst_subresource: layers(copy.dst_layer),
            dst_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            extent: vk::Extent3D {
                width: copy.extent.width,
                height: copy.extent.height,
                depth: 1,
            },
        };

        unsafe {
            self.device
                .cmd_copy_image(cmd, copy.src, copy.src_layout, copy.dst, copy.dst_layout, &[region]);
        }
        Ok(())
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, &[region]) };
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<()> {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe { self.device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE) };
        Ok(())
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe { self.device.cmd_end_render_pass(cmd) };
        Ok(())
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) -> VulkanResult<()> {
        unsafe { self.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) };
        Ok(())
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) -> VulkanResult<()> {
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(cmd, vk::PipelineBindPoint::GRAPHICS, layout, 0, &[set], &[]);
        }
        Ok(())
    }

    fn cmd_bind_mesh_buffers(&self, cmd: vk::CommandBuffer, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer) -> VulkanResult<()> {
        unsafe {
            self.device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[0]);
            self.device.cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
        }
        Ok(())
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        bytes: &[u8],
    ) -> VulkanResult<()> {
        unsafe { self.device.cmd_push_constants(cmd, layout, stages, 0, bytes) };
        Ok(())
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) -> VulkanResult<()> {
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0) };
        Ok(())
    }

    fn destroy(&self, resource: DeviceResource) {
        unsafe {
            match resource {
                DeviceResource::Buffer(buffer) => {
                    self.device.destroy_buffer(buffer.buffer, None);
                    self.device.free_memory(buffer.memory, None);
                }
                DeviceResource::Image(image) => {
                    self.device.destroy_image(image.image, None);
                    self.device.free_memory(image.memory, None);
                }
                DeviceResource::ImageView(view) => self.device.destroy_image_view(view, None),
                DeviceResource::Sampler(sampler) => self.device.destroy_sampler(sampler, None),
                DeviceResource::ShaderModule(module) => self.device.destroy_shader_module(module, None),
                DeviceResource::Semaphore(semaphore) => self.device.destroy_semaphore(semaphore, None),
                DeviceResource::Fence(fence) => self.device.destroy_fence(fence, None),
                DeviceResource::CommandBuffer(cmd) => self.device.free_command_buffers(self.command_pool, &[cmd]),
                DeviceResource::RenderPass(render_pass) => self.device.destroy_render_pass(render_pass, None),
                DeviceResource::Framebuffer(framebuffer) => self.device.destroy_framebuffer(framebuffer, None),
                DeviceResource::DescriptorSetLayout(layout) => self.device.destroy_descriptor_set_layout(layout, None),
                DeviceResource::DescriptorPool(pool) => self.device.destroy_descriptor_pool(pool, None),
                DeviceResource::PipelineLayout(layout) => self.device.destroy_pipeline_layout(layout, None),
                DeviceResource::Pipeline(pipeline) => self.device.destroy_pipeline(pipeline, None),
            }
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            // Ensure device is idle before destruction
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pass_waits_on_previous_depth_writes() {
        let dependency = external_dependency();
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert!(dependency.src_stage_mask.contains(vk::PipelineStageFlags::LATE_FRAGMENT_TESTS));
        assert!(dependency.dst_stage_mask.contains(
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        ));
        assert!(dependency.src_access_mask.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert!(dependency.dst_access_mask.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }
}
