//! Render device abstraction
//!
//! [`RenderDevice`] is the narrow interface the scene uses to create GPU
//! resources, record command buffers and submit work. It speaks raw `ash::vk`
//! handles so the backend stays a thin translation layer:
//!
//! - [`crate::render::vulkan::VulkanDevice`] forwards every call to ash.
//! - `RecordingDevice` (feature `test-support`) records calls, hands out fake
//!   handles and validates image layouts so render graphs can be tested headless.
//!
//! Callers own ordering: the device never reorders, batches or defers work.
//! Every created handle must eventually be passed back to [`RenderDevice::destroy`].

use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::VulkanResult;

/// Buffer handle plus its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Bound device memory
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// Image handle plus its backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedImage {
    /// Image handle
    pub image: vk::Image,
    /// Bound device memory
    pub memory: vk::DeviceMemory,
}

/// Parameters for a 2D (optionally layered) image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Width and height in texels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Number of array layers (6 for cube maps)
    pub array_layers: u32,
    /// Creation flags, e.g. `CUBE_COMPATIBLE`
    pub flags: vk::ImageCreateFlags,
}

impl ImageDesc {
    /// Single-layer image such as a framebuffer attachment
    pub fn attachment(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent,
            format,
            usage,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
        }
    }

    /// Six-layer cube-compatible square image
    pub fn cube(size: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            extent: vk::Extent2D { width: size, height: size },
            format,
            usage,
            array_layers: 6,
            flags: vk::ImageCreateFlags::CUBE_COMPATIBLE,
        }
    }
}

/// Parameters for an image view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewDesc {
    /// Viewed image
    pub image: vk::Image,
    /// View format
    pub format: vk::Format,
    /// `TYPE_2D` or `CUBE`
    pub view_type: vk::ImageViewType,
    /// Color or depth aspect
    pub aspect: vk::ImageAspectFlags,
    /// Layers covered by the view
    pub layer_count: u32,
}

/// Parameters for a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    /// Min and mag filter
    pub filter: vk::Filter,
    /// Address mode on all three axes
    pub address_mode: vk::SamplerAddressMode,
}

/// Layout transition of a range of array layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransition {
    /// Transitioned image
    pub image: vk::Image,
    /// Layout the layers are in before the barrier
    pub old_layout: vk::ImageLayout,
    /// Layout after the barrier
    pub new_layout: vk::ImageLayout,
    /// Affected aspect
    pub aspect: vk::ImageAspectFlags,
    /// First affected layer
    pub base_layer: u32,
    /// Number of affected layers
    pub layer_count: u32,
}

impl ImageTransition {
    /// Transition of every layer of a color image
    pub fn color(image: vk::Image, layers: u32, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        Self {
            image,
            old_layout,
            new_layout,
            aspect: vk::ImageAspectFlags::COLOR,
            base_layer: 0,
            layer_count: layers,
        }
    }

    /// Access masks and pipeline stages for the barrier
    ///
    /// Only the transitions the renderer performs get tight masks; anything
    /// else falls back to a full barrier.
    pub fn barrier_scope(&self) -> (vk::AccessFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::PipelineStageFlags) {
        use vk::{AccessFlags as A, ImageLayout as L, PipelineStageFlags as S};

        match (self.old_layout, self.new_layout) {
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => {
                (A::empty(), A::TRANSFER_WRITE, S::TOP_OF_PIPE, S::TRANSFER)
            }
            (L::UNDEFINED | L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => {
                (A::TRANSFER_WRITE, A::SHADER_READ, S::TRANSFER, S::FRAGMENT_SHADER)
            }
            (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL) => {
                (A::SHADER_READ, A::TRANSFER_WRITE, S::FRAGMENT_SHADER, S::TRANSFER)
            }
            (L::UNDEFINED | L::TRANSFER_SRC_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL) => (
                A::TRANSFER_READ,
                A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
                S::TRANSFER,
                S::COLOR_ATTACHMENT_OUTPUT,
            ),
            (L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => {
                (A::COLOR_ATTACHMENT_WRITE, A::TRANSFER_READ, S::COLOR_ATTACHMENT_OUTPUT, S::TRANSFER)
            }
            (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
                A::empty(),
                A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
                S::TOP_OF_PIPE,
                S::EARLY_FRAGMENT_TESTS,
            ),
            _ => (
                A::MEMORY_READ | A::MEMORY_WRITE,
                A::MEMORY_READ | A::MEMORY_WRITE,
                S::ALL_COMMANDS,
                S::ALL_COMMANDS,
            ),
        }
    }
}

/// Copy of a full single-layer image into one layer of another image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCopy {
    /// Source image (layer 0 is read)
    pub src: vk::Image,
    /// Layout the source is in
    pub src_layout: vk::ImageLayout,
    /// Destination image
    pub dst: vk::Image,
    /// Layout the destination layer is in
    pub dst_layout: vk::ImageLayout,
    /// Destination array layer
    pub dst_layer: u32,
    /// Copied region size
    pub extent: vk::Extent2D,
}

/// Attachments of a render pass with one color and one depth attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDesc {
    /// Color attachment format
    pub color_format: vk::Format,
    /// Layout the color attachment is in when the pass begins
    pub color_initial_layout: vk::ImageLayout,
    /// Layout the color attachment is left in when the pass ends
    pub color_final_layout: vk::ImageLayout,
    /// Depth attachment format
    pub depth_format: vk::Format,
}

/// Fixed-function state for a graphics pipeline drawing [`crate::render::mesh::Vertex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineDesc {
    /// Vertex stage module
    pub vertex_shader: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_shader: vk::ShaderModule,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Render pass the pipeline is used in
    pub render_pass: vk::RenderPass,
    /// Static viewport and scissor
    pub extent: vk::Extent2D,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
}

/// SPIR-V bytes for the two stages of a graphics pipeline
#[derive(Debug, Clone, Copy)]
pub struct ShaderStages<'a> {
    /// Vertex stage
    pub vertex: &'a [u8],
    /// Fragment stage
    pub fragment: &'a [u8],
}

/// A descriptor binding update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorWrite {
    /// Uniform buffer at `binding`
    UniformBuffer {
        /// Binding index
        binding: u32,
        /// Source buffer
        buffer: vk::Buffer,
        /// Bytes visible to the shader
        range: vk::DeviceSize,
    },
    /// Array of combined image samplers at `binding`, sampled in `SHADER_READ_ONLY_OPTIMAL`
    CombinedImageSamplers {
        /// Binding index
        binding: u32,
        /// (view, sampler) per array element
        images: Vec<(vk::ImageView, vk::Sampler)>,
    },
}

/// One queue submission
#[derive(Debug, Clone, Copy, Default)]
pub struct Submission<'a> {
    /// Command buffers executed in order
    pub command_buffers: &'a [vk::CommandBuffer],
    /// Semaphores waited on before execution
    pub wait_semaphores: &'a [vk::Semaphore],
    /// Stage at which each wait applies
    pub wait_stages: &'a [vk::PipelineStageFlags],
    /// Semaphores signalled on completion
    pub signal_semaphores: &'a [vk::Semaphore],
    /// Fence signalled on completion
    pub fence: Option<vk::Fence>,
}

/// Any handle the device created, passed back for destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceResource {
    /// Buffer and its memory
    Buffer(AllocatedBuffer),
    /// Image and its memory
    Image(AllocatedImage),
    /// Image view
    ImageView(vk::ImageView),
    /// Sampler
    Sampler(vk::Sampler),
    /// Shader module
    ShaderModule(vk::ShaderModule),
    /// Semaphore
    Semaphore(vk::Semaphore),
    /// Fence
    Fence(vk::Fence),
    /// Command buffer from the device's pool
    CommandBuffer(vk::CommandBuffer),
    /// Render pass
    RenderPass(vk::RenderPass),
    /// Framebuffer
    Framebuffer(vk::Framebuffer),
    /// Descriptor set layout
    DescriptorSetLayout(vk::DescriptorSetLayout),
    /// Descriptor pool (frees its sets)
    DescriptorPool(vk::DescriptorPool),
    /// Pipeline layout
    PipelineLayout(vk::PipelineLayout),
    /// Pipeline
    Pipeline(vk::Pipeline),
}

/// GPU resource, command and submission primitives consumed by the scene
pub trait RenderDevice {
    // --- resources ---

    /// Create a buffer and bind freshly allocated memory with `properties`
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<AllocatedBuffer>;

    /// Copy `bytes` into a host-visible buffer
    fn write_buffer(&self, buffer: &AllocatedBuffer, bytes: &[u8]) -> VulkanResult<()>;

    /// Create an optimal-tiling, device-local image in `UNDEFINED` layout
    fn create_image(&self, desc: &ImageDesc) -> VulkanResult<AllocatedImage>;

    /// Create an image view
    fn create_image_view(&self, desc: &ImageViewDesc) -> VulkanResult<vk::ImageView>;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> VulkanResult<vk::Sampler>;

    /// Index of a memory type allowed by `type_filter` with all `properties`
    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32>;

    /// First supported depth attachment format
    fn find_depth_format(&self) -> VulkanResult<vk::Format>;

    /// Create a shader module from SPIR-V bytes
    fn create_shader_module(&self, code: &[u8]) -> VulkanResult<vk::ShaderModule>;

    /// Create a render pass with one color and one depth attachment
    fn create_render_pass(&self, desc: &RenderPassDesc) -> VulkanResult<vk::RenderPass>;

    /// Create a framebuffer over `attachments` (color first, then depth)
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer>;

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;

    /// Create a descriptor pool
    fn create_descriptor_pool(
        &self,
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> VulkanResult<vk::DescriptorPool>;

    /// Allocate one descriptor set from `pool`
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<vk::DescriptorSet>;

    /// Point descriptor bindings at resources
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) -> VulkanResult<()>;

    /// Create a pipeline layout
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout>;

    /// Create a graphics pipeline
    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> VulkanResult<vk::Pipeline>;

    // --- synchronization and submission ---

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;

    /// Create a fence, optionally already signalled
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;

    /// Block until `fence` is signalled
    fn wait_for_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Return `fence` to the unsignalled state
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Submit work to the graphics queue
    fn submit(&self, submission: &Submission<'_>) -> VulkanResult<()>;

    /// Block until the graphics queue is idle
    fn queue_wait_idle(&self) -> VulkanResult<()>;

    /// Block until the whole device is idle
    fn device_wait_idle(&self) -> VulkanResult<()>;

    // --- command buffers ---

    /// Allocate a primary command buffer
    fn allocate_command_buffer(&self) -> VulkanResult<vk::CommandBuffer>;

    /// Begin recording
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, usage: vk::CommandBufferUsageFlags) -> VulkanResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()>;

    /// Reset a command buffer to the initial state
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()>;

    /// Record an image layout barrier
    fn cmd_transition_image_layout(&self, cmd: vk::CommandBuffer, transition: &ImageTransition) -> VulkanResult<()>;

    /// Record an image-to-image copy
    fn cmd_copy_image(&self, cmd: vk::CommandBuffer, copy: &ImageCopy) -> VulkanResult<()>;

    /// Record a buffer-to-buffer copy
    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()>;

    /// Begin a render pass over the whole framebuffer
    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<()>;

    /// End the current render pass
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) -> VulkanResult<()>;

    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) -> VulkanResult<()>;

    /// Bind one descriptor set at set index 0
    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) -> VulkanResult<()>;

    /// Bind a vertex buffer at binding 0 and a `u32` index buffer
    fn cmd_bind_mesh_buffers(&self, cmd: vk::CommandBuffer, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer) -> VulkanResult<()>;

    /// Upload push constants at offset 0
    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        bytes: &[u8],
    ) -> VulkanResult<()>;

    /// Draw `index_count` indices, one instance
    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) -> VulkanResult<()>;

    // --- destruction ---

    /// Destroy a handle created by this device
    fn destroy(&self, resource: DeviceResource);

    // --- provided helpers ---

    /// Allocate and begin a one-time-submit command buffer
    fn begin_single_time_commands(&self) -> VulkanResult<vk::CommandBuffer> {
        let cmd = self.allocate_command_buffer()?;
        self.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(cmd)
    }

    /// End, submit and wait for a buffer from [`RenderDevice::begin_single_time_commands`], then free it
    fn end_single_time_commands(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        self.end_command_buffer(cmd)?;
        let command_buffers = [cmd];
        self.submit(&Submission {
            command_buffers: &command_buffers,
            ..Submission::default()
        })?;
        self.queue_wait_idle()?;
        self.destroy(DeviceResource::CommandBuffer(cmd));
        Ok(())
    }

    /// Transition image layers immediately using a single-time command buffer
    fn transition_image_layout(&self, transition: &ImageTransition) -> VulkanResult<()> {
        let cmd = self.begin_single_time_commands()?;
        self.cmd_transition_image_layout(cmd, transition)?;
        self.end_single_time_commands(cmd)
    }

    /// Copy an image immediately using a single-time command buffer
    fn copy_image(&self, copy: &ImageCopy) -> VulkanResult<()> {
        let cmd = self.begin_single_time_commands()?;
        self.cmd_copy_image(cmd, copy)?;
        self.end_single_time_commands(cmd)
    }

    /// Copy a buffer immediately using a single-time command buffer
    fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let cmd = self.begin_single_time_commands()?;
        self.cmd_copy_buffer(cmd, src, dst, size)?;
        self.end_single_time_commands(cmd)
    }

    /// Upload `bytes` into a new device-local buffer through a staging buffer
    fn create_device_local_buffer(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<AllocatedBuffer> {
        let size = bytes.len() as vk::DeviceSize;
        let staging = self.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let upload = self.write_buffer(&staging, bytes).and_then(|()| {
            let buffer = self.create_buffer(
                size,
                usage | vk::BufferUsageFlags::TRANSFER_DST,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            match self.copy_buffer(staging.buffer, buffer.buffer, size) {
                Ok(()) => Ok(buffer),
                Err(e) => {
                    self.destroy(DeviceResource::Buffer(buffer));
                    Err(e)
                }
            }
        });

        self.destroy(DeviceResource::Buffer(staging));
        upload
    }
}

macro_rules! device_resource_from {
    ($($handle:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$handle> for DeviceResource {
                fn from(handle: $handle) -> Self {
                    DeviceResource::$variant(handle)
                }
            }
        )*
    };
}

device_resource_from! {
    AllocatedBuffer => Buffer,
    AllocatedImage => Image,
    vk::ImageView => ImageView,
    vk::Sampler => Sampler,
    vk::ShaderModule => ShaderModule,
    vk::Semaphore => Semaphore,
    vk::Fence => Fence,
    vk::CommandBuffer => CommandBuffer,
    vk::RenderPass => RenderPass,
    vk::Framebuffer => Framebuffer,
    vk::DescriptorSetLayout => DescriptorSetLayout,
    vk::DescriptorPool => DescriptorPool,
    vk::PipelineLayout => PipelineLayout,
    vk::Pipeline => Pipeline,
}

/// Shared handle to the device every resource was created on
pub type SharedDevice = Arc<dyn RenderDevice>;

/// A device handle destroyed when dropped
///
/// Creation sequences use `?` freely: anything created before a failure is
/// released as the partially built owners unwind.
pub struct Owned<H>
where
    H: Copy + Into<DeviceResource>,
{
    device: SharedDevice,
    handle: H,
}

impl<H> Owned<H>
where
    H: Copy + Into<DeviceResource>,
{
    /// Take ownership of `handle`
    pub fn new(device: &SharedDevice, handle: H) -> Self {
        Self {
            device: Arc::clone(device),
            handle,
        }
    }

    /// The wrapped handle
    pub fn get(&self) -> H {
        self.handle
    }
}

impl<H> std::fmt::Debug for Owned<H>
where
    H: Copy + Into<DeviceResource> + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Owned").field(&self.handle).finish()
    }
}

impl<H> Drop for Owned<H>
where
    H: Copy + Into<DeviceResource>,
{
    fn drop(&mut self) {
        self.device.destroy(self.handle.into());
    }
}

/// Build a pipeline from SPIR-V; the shader modules are released once it exists
pub fn build_pipeline(
    device: &SharedDevice,
    stages: ShaderStages<'_>,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    cull_mode: vk::CullModeFlags,
) -> VulkanResult<Owned<vk::Pipeline>> {
    let vertex = Owned::new(device, device.create_shader_module(stages.vertex)?);
    let fragment = Owned::new(device, device.create_shader_module(stages.fragment)?);
    let pipeline = device.create_graphics_pipeline(&PipelineDesc {
        vertex_shader: vertex.get(),
        fragment_shader: fragment.get(),
        layout,
        render_pass,
        extent,
        cull_mode,
    })?;
    Ok(Owned::new(device, pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_desc_is_six_layer_cube_compatible() {
        let desc = ImageDesc::cube(1024, vk::Format::R32_SFLOAT, vk::ImageUsageFlags::SAMPLED);
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.extent.width, 1024);
        assert!(desc.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
    }

    #[test]
    fn test_shadow_transitions_use_tight_scopes() {
        let image = vk::Image::null();
        let to_dst = ImageTransition::color(
            image,
            6,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let (src_access, dst_access, src_stage, dst_stage) = to_dst.barrier_scope();
        assert_eq!(src_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_src = ImageTransition::color(
            image,
            1,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        assert_eq!(to_src.barrier_scope().3, vk::PipelineStageFlags::TRANSFER);
    }
}
