//! Instrumented render device for headless tests
//!
//! [`RecordingDevice`] implements [`RenderDevice`] without a GPU. It hands out
//! fake handles, logs every call, and enforces the API rules that are easy to
//! get wrong when orchestrating passes by hand:
//!
//! - image layers must be in the layout a barrier or copy claims they are in
//!   ([`VulkanError::LayoutViolation`])
//! - commands are only recorded into a command buffer that is recording, and
//!   draws only happen inside a render pass with a bound pipeline
//! - a command buffer submitted with a fence cannot be reset until the fence
//!   has been waited on
//! - binary semaphores alternate between signal and wait
//! - every created handle is destroyed exactly once
//!
//! Submitted work "completes" instantly, so fences signal at submission time.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use ash::vk::{self, Handle};

use crate::render::device::{
    AllocatedBuffer, AllocatedImage, DescriptorWrite, DeviceResource, ImageCopy, ImageDesc,
    ImageTransition, ImageViewDesc, PipelineDesc, RenderDevice, RenderPassDesc, SamplerDesc,
    Submission,
};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// One recorded device call, with handles as raw `u64`s
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// A handle was created
    Create {
        /// Resource kind
        kind: &'static str,
        /// Raw handle
        handle: u64,
    },
    /// A handle was destroyed
    Destroy {
        /// Resource kind
        kind: &'static str,
        /// Raw handle
        handle: u64,
    },
    /// Host write into a buffer
    WriteBuffer {
        /// Buffer
        buffer: u64,
        /// Bytes written
        len: usize,
    },
    /// Descriptor set update
    UpdateDescriptorSet {
        /// Descriptor set
        set: u64,
    },
    /// Fence wait
    WaitForFence(u64),
    /// Fence reset
    ResetFence(u64),
    /// Queue submission
    Submit {
        /// Submitted command buffers
        command_buffers: Vec<u64>,
        /// Waited semaphores
        wait: Vec<u64>,
        /// Signalled semaphores
        signal: Vec<u64>,
        /// Signalled fence
        fence: Option<u64>,
    },
    /// Queue idle wait
    QueueWaitIdle,
    /// Device idle wait
    DeviceWaitIdle,
    /// Recording started
    BeginCommandBuffer(u64),
    /// Recording finished
    EndCommandBuffer(u64),
    /// Command buffer reset
    ResetCommandBuffer(u64),
    /// Layout barrier
    Transition {
        /// Command buffer
        cmd: u64,
        /// Image
        image: u64,
        /// Claimed old layout
        old: vk::ImageLayout,
        /// New layout
        new: vk::ImageLayout,
        /// First layer
        base_layer: u32,
        /// Layer count
        layer_count: u32,
    },
    /// Image copy
    CopyImage {
        /// Command buffer
        cmd: u64,
        /// Source image
        src: u64,
        /// Destination image
        dst: u64,
        /// Destination layer
        dst_layer: u32,
    },
    /// Buffer copy
    CopyBuffer {
        /// Command buffer
        cmd: u64,
        /// Source buffer
        src: u64,
        /// Destination buffer
        dst: u64,
    },
    /// Render pass begin
    BeginRenderPass {
        /// Command buffer
        cmd: u64,
        /// Render pass
        render_pass: u64,
        /// Framebuffer
        framebuffer: u64,
    },
    /// Render pass end
    EndRenderPass {
        /// Command buffer
        cmd: u64,
    },
    /// Pipeline bind
    BindPipeline {
        /// Command buffer
        cmd: u64,
        /// Pipeline
        pipeline: u64,
    },
    /// Descriptor set bind
    BindDescriptorSet {
        /// Command buffer
        cmd: u64,
        /// Descriptor set
        set: u64,
    },
    /// Vertex and index buffer bind
    BindMeshBuffers {
        /// Command buffer
        cmd: u64,
        /// Vertex buffer
        vertex: u64,
        /// Index buffer
        index: u64,
    },
    /// Push constant upload
    PushConstants {
        /// Command buffer
        cmd: u64,
        /// Uploaded bytes
        bytes: Vec<u8>,
    },
    /// Indexed draw
    DrawIndexed {
        /// Command buffer
        cmd: u64,
        /// Index count
        index_count: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Initial,
    Recording,
    Executable,
}

#[derive(Debug)]
struct CommandBufferState {
    state: CommandState,
    pending_fence: Option<u64>,
    pending_idle: bool,
    active_pass: Option<ActivePass>,
    pipeline_bound: bool,
    /// Layouts this buffer leaves behind once executed, keyed by (image, layer)
    recorded_layouts: HashMap<(u64, u32), vk::ImageLayout>,
}

#[derive(Debug, Clone, Copy)]
struct ActivePass {
    color_image: u64,
    color_final: vk::ImageLayout,
    depth_image: Option<u64>,
}

#[derive(Default)]
struct State {
    next_handle: u64,
    calls: Vec<Call>,
    live: HashMap<u64, &'static str>,
    errors: Vec<String>,
    layouts: HashMap<u64, Vec<vk::ImageLayout>>,
    views: HashMap<u64, u64>,
    framebuffers: HashMap<u64, Vec<u64>>,
    render_passes: HashMap<u64, RenderPassDesc>,
    command_buffers: HashMap<u64, CommandBufferState>,
    fences: HashMap<u64, bool>,
    signalled_semaphores: HashSet<u64>,
    buffer_contents: HashMap<u64, Vec<u8>>,
}

impl State {
    fn allocate(&mut self, kind: &'static str) -> u64 {
        self.next_handle += 1;
        let handle = 0x1000 + self.next_handle;
        self.live.insert(handle, kind);
        self.calls.push(Call::Create { kind, handle });
        handle
    }

    fn recording(&mut self, cmd: vk::CommandBuffer) -> VulkanResult<&mut CommandBufferState> {
        match self.command_buffers.get_mut(&cmd.as_raw()) {
            Some(buffer) if buffer.state == CommandState::Recording => Ok(buffer),
            Some(_) => Err(VulkanError::invalid(format!("command buffer {:#x} is not recording", cmd.as_raw()))),
            None => Err(VulkanError::invalid(format!("unknown command buffer {:#x}", cmd.as_raw()))),
        }
    }

    fn outside_render_pass(&mut self, cmd: vk::CommandBuffer, what: &str) -> VulkanResult<()> {
        if self.recording(cmd)?.active_pass.is_some() {
            return Err(VulkanError::invalid(format!("{what} recorded inside a render pass")));
        }
        Ok(())
    }

    fn layer_layout(&self, image: u64, layer: u32) -> VulkanResult<vk::ImageLayout> {
        self.layouts
            .get(&image)
            .and_then(|layers| layers.get(layer as usize))
            .copied()
            .ok_or_else(|| VulkanError::invalid(format!("image {image:#x} has no layer {layer}")))
    }

    fn set_layout(&mut self, image: u64, layer: u32, layout: vk::ImageLayout) {
        if let Some(slot) = self.layouts.get_mut(&image).and_then(|layers| layers.get_mut(layer as usize)) {
            *slot = layout;
        }
    }

    /// Layout seen by the next command in `cmd`: its own earlier transitions, else the executed layout
    fn recorded_layout(&mut self, cmd: vk::CommandBuffer, image: u64, layer: u32) -> VulkanResult<vk::ImageLayout> {
        let executed = self.layer_layout(image, layer)?;
        Ok(self.recording(cmd)?.recorded_layouts.get(&(image, layer)).copied().unwrap_or(executed))
    }

    fn expect_recorded_layout(&mut self, cmd: vk::CommandBuffer, image: u64, layer: u32, expected: vk::ImageLayout) -> VulkanResult<()> {
        let found = self.recorded_layout(cmd, image, layer)?;
        if found != expected {
            return Err(VulkanError::LayoutViolation { image, layer, expected, found });
        }
        Ok(())
    }

    fn record_layout(&mut self, cmd: vk::CommandBuffer, image: u64, layer: u32, layout: vk::ImageLayout) -> VulkanResult<()> {
        self.layer_layout(image, layer)?;
        self.recording(cmd)?.recorded_layouts.insert((image, layer), layout);
        Ok(())
    }

    fn complete_pending(&mut self, fence: Option<u64>) {
        for buffer in self.command_buffers.values_mut() {
            match fence {
                Some(fence) if buffer.pending_fence == Some(fence) => buffer.pending_fence = None,
                None => {
                    buffer.pending_fence = None;
                    buffer.pending_idle = false;
                }
                _ => {}
            }
        }
    }
}

/// Headless [`RenderDevice`] that records and validates every call
#[derive(Default)]
pub struct RecordingDevice {
    state: RefCell<State>,
    creations_before_failure: Cell<Option<usize>>,
}

impl RecordingDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the creation call after the next `successes` ones fail with out-of-memory
    pub fn fail_creation_after(&self, successes: usize) {
        self.creations_before_failure.set(Some(successes));
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls; validation state is kept
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Number of created handles not yet destroyed
    pub fn live_resource_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Live handles grouped by kind
    pub fn live_resources_of(&self, kind: &str) -> usize {
        self.state.borrow().live.values().filter(|k| **k == kind).count()
    }

    /// Misuse detected outside of `Result`-returning calls (double destroys)
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    /// Layout of one image layer as left by submitted work
    ///
    /// Transitions recorded into a command buffer take effect when it is submitted
    /// and are dropped if it is reset first.
    pub fn layout_of(&self, image: vk::Image, layer: u32) -> Option<vk::ImageLayout> {
        self.state.borrow().layer_layout(image.as_raw(), layer).ok()
    }

    /// Bytes last written to a host-visible buffer
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.state.borrow().buffer_contents.get(&buffer.as_raw()).cloned()
    }

    fn check_creation(&self) -> VulkanResult<()> {
        match self.creations_before_failure.get() {
            Some(0) => Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)),
            Some(n) => {
                self.creations_before_failure.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn create<H: Handle>(&self, kind: &'static str) -> VulkanResult<H> {
        self.check_creation()?;
        Ok(H::from_raw(self.state.borrow_mut().allocate(kind)))
    }

    fn record(&self, cmd: vk::CommandBuffer, call: Call) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.recording(cmd)?;
        state.calls.push(call);
        Ok(())
    }
}

fn resource_parts(resource: DeviceResource) -> (&'static str, u64) {
    match resource {
        DeviceResource::Buffer(buffer) => ("buffer", buffer.buffer.as_raw()),
        DeviceResource::Image(image) => ("image", image.image.as_raw()),
        DeviceResource::ImageView(view) => ("image_view", view.as_raw()),
        DeviceResource::Sampler(sampler) => ("sampler", sampler.as_raw()),
        DeviceResource::ShaderModule(module) => ("shader_module", module.as_raw()),
        DeviceResource::Semaphore(semaphore) => ("semaphore", semaphore.as_raw()),
        DeviceResource::Fence(fence) => ("fence", fence.as_raw()),
        DeviceResource::CommandBuffer(cmd) => ("command_buffer", cmd.as_raw()),
        DeviceResource::RenderPass(render_pass) => ("render_pass", render_pass.as_raw()),
        DeviceResource::Framebuffer(framebuffer) => ("framebuffer", framebuffer.as_raw()),
        DeviceResource::DescriptorSetLayout(layout) => ("descriptor_set_layout", layout.as_raw()),
        DeviceResource::DescriptorPool(pool) => ("descriptor_pool", pool.as_raw()),
        DeviceResource::PipelineLayout(layout) => ("pipeline_layout", layout.as_raw()),
        DeviceResource::Pipeline(pipeline) => ("pipeline", pipeline.as_raw()),
    }
}

impl RenderDevice for RecordingDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
        _properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<AllocatedBuffer> {
        let buffer: vk::Buffer = self.create("buffer")?;
        Ok(AllocatedBuffer {
            buffer,
            memory: vk::DeviceMemory::from_raw(buffer.as_raw()),
            size,
        })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > buffer.size {
            return Err(VulkanError::invalid(format!(
                "writing {} bytes into a {} byte buffer",
                bytes.len(),
                buffer.size
            )));
        }
        let mut state = self.state.borrow_mut();
        let raw = buffer.buffer.as_raw();
        if !state.live.contains_key(&raw) {
            return Err(VulkanError::invalid(format!("write to destroyed buffer {raw:#x}")));
        }
        state.buffer_contents.insert(raw, bytes.to_vec());
        state.calls.push(Call::WriteBuffer { buffer: raw, len: bytes.len() });
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> VulkanResult<AllocatedImage> {
        let image: vk::Image = self.create("image")?;
        self.state
            .borrow_mut()
            .layouts
            .insert(image.as_raw(), vec![vk::ImageLayout::UNDEFINED; desc.array_layers as usize]);
        Ok(AllocatedImage {
            image,
            memory: vk::DeviceMemory::from_raw(image.as_raw()),
        })
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> VulkanResult<vk::ImageView> {
        let view: vk::ImageView = self.create("image_view")?;
        self.state.borrow_mut().views.insert(view.as_raw(), desc.image.as_raw());
        Ok(view)
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> VulkanResult<vk::Sampler> {
        self.create("sampler")
    }

    fn find_memory_type(&self, _type_filter: u32, _properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        Ok(0)
    }

    fn find_depth_format(&self) -> VulkanResult<vk::Format> {
        Ok(vk::Format::D32_SFLOAT)
    }

    fn create_shader_module(&self, _code: &[u8]) -> VulkanResult<vk::ShaderModule> {
        self.create("shader_module")
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> VulkanResult<vk::RenderPass> {
        let render_pass: vk::RenderPass = self.create("render_pass")?;
        self.state.borrow_mut().render_passes.insert(render_pass.as_raw(), *desc);
        Ok(render_pass)
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        let framebuffer: vk::Framebuffer = self.create("framebuffer")?;
        self.state
            .borrow_mut()
            .framebuffers
            .insert(framebuffer.as_raw(), attachments.iter().map(|view| view.as_raw()).collect());
        Ok(framebuffer)
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        self.create("descriptor_set_layout")
    }

    fn create_descriptor_pool(
        &self,
        _pool_sizes: &[vk::DescriptorPoolSize],
        _max_sets: u32,
    ) -> VulkanResult<vk::DescriptorPool> {
        self.create("descriptor_pool")
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<vk::DescriptorSet> {
        let mut state = self.state.borrow_mut();
        if !state.live.contains_key(&pool.as_raw()) {
            return Err(VulkanError::invalid("descriptor set from a destroyed pool"));
        }
        state.next_handle += 1;
        Ok(vk::DescriptorSet::from_raw(0x1000 + state.next_handle))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, _writes: &[DescriptorWrite]) -> VulkanResult<()> {
        self.state.borrow_mut().calls.push(Call::UpdateDescriptorSet { set: set.as_raw() });
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout> {
        self.create("pipeline_layout")
    }

    fn create_graphics_pipeline(&self, _desc: &PipelineDesc) -> VulkanResult<vk::Pipeline> {
        self.create("pipeline")
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        self.create("semaphore")
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let fence: vk::Fence = self.create("fence")?;
        self.state.borrow_mut().fences.insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let raw = fence.as_raw();
        match state.fences.get(&raw) {
            Some(true) => {}
            Some(false) => return Err(VulkanError::invalid(format!("waiting on fence {raw:#x} that can never signal"))),
            None => return Err(VulkanError::invalid(format!("unknown fence {raw:#x}"))),
        }
        state.complete_pending(Some(raw));
        state.calls.push(Call::WaitForFence(raw));
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let raw = fence.as_raw();
        let signaled = state
            .fences
            .get_mut(&raw)
            .ok_or_else(|| VulkanError::invalid(format!("unknown fence {raw:#x}")))?;
        *signaled = false;
        state.calls.push(Call::ResetFence(raw));
        Ok(())
    }

    fn submit(&self, submission: &Submission<'_>) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();

        if submission.wait_semaphores.len() != submission.wait_stages.len() {
            return Err(VulkanError::invalid("every waited semaphore needs a wait stage"));
        }
        for cmd in submission.command_buffers {
            match state.command_buffers.get(&cmd.as_raw()) {
                Some(buffer) if buffer.state == CommandState::Executable => {}
                _ => return Err(VulkanError::invalid(format!("submitting command buffer {:#x} that is not executable", cmd.as_raw()))),
            }
        }
        for semaphore in submission.wait_semaphores {
            if !state.signalled_semaphores.remove(&semaphore.as_raw()) {
                return Err(VulkanError::invalid(format!("waiting on semaphore {:#x} with no pending signal", semaphore.as_raw())));
            }
        }
        for semaphore in submission.signal_semaphores {
            if !state.signalled_semaphores.insert(semaphore.as_raw()) {
                return Err(VulkanError::invalid(format!("semaphore {:#x} signalled twice without a wait", semaphore.as_raw())));
            }
        }
        if let Some(fence) = submission.fence {
            match state.fences.get_mut(&fence.as_raw()) {
                Some(signaled) if !*signaled => *signaled = true,
                Some(_) => return Err(VulkanError::invalid("submitting with a fence that is still signalled")),
                None => return Err(VulkanError::invalid("submitting with an unknown fence")),
            }
        }
        for cmd in submission.command_buffers {
            let changes: Vec<((u64, u32), vk::ImageLayout)> = match state.command_buffers.get_mut(&cmd.as_raw()) {
                Some(buffer) => {
                    buffer.pending_fence = submission.fence.map(|fence| fence.as_raw());
                    buffer.pending_idle = submission.fence.is_none();
                    buffer.recorded_layouts.iter().map(|(key, layout)| (*key, *layout)).collect()
                }
                None => Vec::new(),
            };
            for ((image, layer), layout) in changes {
                state.set_layout(image, layer, layout);
            }
        }

        state.calls.push(Call::Submit {
            command_buffers: submission.command_buffers.iter().map(|c| c.as_raw()).collect(),
            wait: submission.wait_semaphores.iter().map(|s| s.as_raw()).collect(),
            signal: submission.signal_semaphores.iter().map(|s| s.as_raw()).collect(),
            fence: submission.fence.map(|fence| fence.as_raw()),
        });
        Ok(())
    }

    fn queue_wait_idle(&self) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.complete_pending(None);
        state.calls.push(Call::QueueWaitIdle);
        Ok(())
    }

    fn device_wait_idle(&self) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.complete_pending(None);
        state.calls.push(Call::DeviceWaitIdle);
        Ok(())
    }

    fn allocate_command_buffer(&self) -> VulkanResult<vk::CommandBuffer> {
        let cmd: vk::CommandBuffer = self.create("command_buffer")?;
        self.state.borrow_mut().command_buffers.insert(
            cmd.as_raw(),
            CommandBufferState {
                state: CommandState::Initial,
                pending_fence: None,
                pending_idle: false,
                active_pass: None,
                pipeline_bound: false,
                recorded_layouts: HashMap::new(),
            },
        );
        Ok(cmd)
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, _usage: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let buffer = state
            .command_buffers
            .get_mut(&cmd.as_raw())
            .ok_or_else(|| VulkanError::invalid("begin on unknown command buffer"))?;
        if buffer.state != CommandState::Initial {
            return Err(VulkanError::invalid(format!(
                "begin on command buffer {:#x} in state {:?}; reset it first",
                cmd.as_raw(),
                buffer.state
            )));
        }
        buffer.state = CommandState::Recording;
        buffer.pipeline_bound = false;
        buffer.recorded_layouts.clear();
        state.calls.push(Call::BeginCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let buffer = state.recording(cmd)?;
        if buffer.active_pass.is_some() {
            return Err(VulkanError::invalid("ending a command buffer inside a render pass"));
        }
        buffer.state = CommandState::Executable;
        state.calls.push(Call::EndCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let buffer = state
            .command_buffers
            .get_mut(&cmd.as_raw())
            .ok_or_else(|| VulkanError::invalid("reset on unknown command buffer"))?;
        if buffer.pending_fence.is_some() || buffer.pending_idle {
            return Err(VulkanError::invalid(format!(
                "resetting command buffer {:#x} while the GPU may still execute it",
                cmd.as_raw()
            )));
        }
        buffer.state = CommandState::Initial;
        buffer.active_pass = None;
        buffer.recorded_layouts.clear();
        state.calls.push(Call::ResetCommandBuffer(cmd.as_raw()));
        Ok(())
    }

    fn cmd_transition_image_layout(&self, cmd: vk::CommandBuffer, transition: &ImageTransition) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.outside_render_pass(cmd, "layout transition")?;
        let image = transition.image.as_raw();
        let layers = transition.base_layer..transition.base_layer + transition.layer_count;
        for layer in layers.clone() {
            if transition.old_layout != vk::ImageLayout::UNDEFINED {
                state.expect_recorded_layout(cmd, image, layer, transition.old_layout)?;
            } else {
                state.layer_layout(image, layer)?;
            }
        }
        for layer in layers {
            state.record_layout(cmd, image, layer, transition.new_layout)?;
        }
        state.calls.push(Call::Transition {
            cmd: cmd.as_raw(),
            image,
            old: transition.old_layout,
            new: transition.new_layout,
            base_layer: transition.base_layer,
            layer_count: transition.layer_count,
        });
        Ok(())
    }

    fn cmd_copy_image(&self, cmd: vk::CommandBuffer, copy: &ImageCopy) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.outside_render_pass(cmd, "image copy")?;
        if copy.src_layout != vk::ImageLayout::TRANSFER_SRC_OPTIMAL && copy.src_layout != vk::ImageLayout::GENERAL {
            return Err(VulkanError::invalid(format!("copy source in {:?}", copy.src_layout)));
        }
        if copy.dst_layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL && copy.dst_layout != vk::ImageLayout::GENERAL {
            return Err(VulkanError::invalid(format!("copy destination in {:?}", copy.dst_layout)));
        }
        state.expect_recorded_layout(cmd, copy.src.as_raw(), 0, copy.src_layout)?;
        state.expect_recorded_layout(cmd, copy.dst.as_raw(), copy.dst_layer, copy.dst_layout)?;
        state.calls.push(Call::CopyImage {
            cmd: cmd.as_raw(),
            src: copy.src.as_raw(),
            dst: copy.dst.as_raw(),
            dst_layer: copy.dst_layer,
        });
        Ok(())
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, _size: vk::DeviceSize) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.outside_render_pass(cmd, "buffer copy")?;
        state.calls.push(Call::CopyBuffer {
            cmd: cmd.as_raw(),
            src: src.as_raw(),
            dst: dst.as_raw(),
        });
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        state.outside_render_pass(cmd, "render pass begin")?;

        let desc = *state
            .render_passes
            .get(&render_pass.as_raw())
            .ok_or_else(|| VulkanError::invalid("unknown render pass"))?;
        let attachments = state
            .framebuffers
            .get(&framebuffer.as_raw())
            .cloned()
            .ok_or_else(|| VulkanError::invalid("unknown framebuffer"))?;
        let image_of = |view: Option<&u64>| view.and_then(|view| state.views.get(view)).copied();
        let color_image = image_of(attachments.first())
            .ok_or_else(|| VulkanError::invalid("framebuffer without a color attachment"))?;
        let depth_image = image_of(attachments.get(1));

        if desc.color_initial_layout != vk::ImageLayout::UNDEFINED {
            state.expect_recorded_layout(cmd, color_image, 0, desc.color_initial_layout)?;
        }

        state.recording(cmd)?.active_pass = Some(ActivePass {
            color_image,
            color_final: desc.color_final_layout,
            depth_image,
        });
        state.calls.push(Call::BeginRenderPass {
            cmd: cmd.as_raw(),
            render_pass: render_pass.as_raw(),
            framebuffer: framebuffer.as_raw(),
        });
        Ok(())
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let pass = state
            .recording(cmd)?
            .active_pass
            .take()
            .ok_or_else(|| VulkanError::invalid("ending a render pass that was never begun"))?;
        state.record_layout(cmd, pass.color_image, 0, pass.color_final)?;
        if let Some(depth) = pass.depth_image {
            state.record_layout(cmd, depth, 0, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)?;
        }
        state.calls.push(Call::EndRenderPass { cmd: cmd.as_raw() });
        Ok(())
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.live.contains_key(&pipeline.as_raw()) {
            return Err(VulkanError::invalid("binding a destroyed pipeline"));
        }
        state.recording(cmd)?.pipeline_bound = true;
        state.calls.push(Call::BindPipeline {
            cmd: cmd.as_raw(),
            pipeline: pipeline.as_raw(),
        });
        Ok(())
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) -> VulkanResult<()> {
        self.record(cmd, Call::BindDescriptorSet { cmd: cmd.as_raw(), set: set.as_raw() })
    }

    fn cmd_bind_mesh_buffers(&self, cmd: vk::CommandBuffer, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer) -> VulkanResult<()> {
        self.record(
            cmd,
            Call::BindMeshBuffers {
                cmd: cmd.as_raw(),
                vertex: vertex_buffer.as_raw(),
                index: index_buffer.as_raw(),
            },
        )
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _stages: vk::ShaderStageFlags,
        bytes: &[u8],
    ) -> VulkanResult<()> {
        if bytes.len() > 128 {
            return Err(VulkanError::invalid(format!("{} bytes of push constants exceed the 128 byte minimum limit", bytes.len())));
        }
        self.record(cmd, Call::PushConstants { cmd: cmd.as_raw(), bytes: bytes.to_vec() })
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let buffer = state.recording(cmd)?;
        if buffer.active_pass.is_none() {
            return Err(VulkanError::invalid("draw outside a render pass"));
        }
        if !buffer.pipeline_bound {
            return Err(VulkanError::invalid("draw without a bound pipeline"));
        }
        state.calls.push(Call::DrawIndexed { cmd: cmd.as_raw(), index_count });
        Ok(())
    }

    fn destroy(&self, resource: DeviceResource) {
        let (kind, handle) = resource_parts(resource);
        let mut state = self.state.borrow_mut();
        if state.live.remove(&handle).is_none() {
            state.errors.push(format!("{kind} {handle:#x} destroyed twice or never created"));
            return;
        }
        match resource {
            DeviceResource::Image(_) => {
                state.layouts.remove(&handle);
            }
            DeviceResource::CommandBuffer(_) => {
                state.command_buffers.remove(&handle);
            }
            DeviceResource::Buffer(_) => {
                state.buffer_contents.remove(&handle);
            }
            _ => {}
        }
        state.calls.push(Call::Destroy { kind, handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(device: &RecordingDevice) -> AllocatedImage {
        device
            .create_image(&ImageDesc::cube(
                64,
                vk::Format::R32_SFLOAT,
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            ))
            .unwrap()
    }

    #[test]
    fn test_transition_from_wrong_layout_is_rejected() {
        let device = RecordingDevice::new();
        let image = cube(&device);
        device
            .transition_image_layout(&ImageTransition::color(
                image.image,
                6,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ))
            .unwrap();

        let err = device
            .transition_image_layout(&ImageTransition::color(
                image.image,
                6,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ))
            .unwrap_err();
        assert!(matches!(err, VulkanError::LayoutViolation { layer: 0, .. }));
    }

    #[test]
    fn test_copy_requires_transfer_layouts() {
        let device = RecordingDevice::new();
        let dst = cube(&device);
        let src = device
            .create_image(&ImageDesc::attachment(
                vk::Extent2D { width: 64, height: 64 },
                vk::Format::R32_SFLOAT,
                vk::ImageUsageFlags::TRANSFER_SRC,
            ))
            .unwrap();
        let copy = ImageCopy {
            src: src.image,
            src_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dst: dst.image,
            dst_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            dst_layer: 3,
            extent: vk::Extent2D { width: 64, height: 64 },
        };

        assert!(matches!(device.copy_image(&copy), Err(VulkanError::LayoutViolation { .. })));

        device
            .transition_image_layout(&ImageTransition::color(src.image, 1, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_SRC_OPTIMAL))
            .unwrap();
        device
            .transition_image_layout(&ImageTransition::color(dst.image, 6, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL))
            .unwrap();
        device.copy_image(&copy).unwrap();
    }

    #[test]
    fn test_recorded_transitions_apply_on_submit_only() {
        let device = RecordingDevice::new();
        let image = cube(&device);
        device
            .transition_image_layout(&ImageTransition::color(
                image.image,
                6,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ))
            .unwrap();
        let to_transfer = ImageTransition::color(
            image.image,
            6,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let cmd = device.allocate_command_buffer().unwrap();

        // A reset buffer leaves the image where submitted work put it
        device.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty()).unwrap();
        device.cmd_transition_image_layout(cmd, &to_transfer).unwrap();
        assert_eq!(device.layout_of(image.image, 0), Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));
        device.reset_command_buffer(cmd).unwrap();
        assert_eq!(device.layout_of(image.image, 5), Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));

        // Later commands in the same buffer see its earlier transitions
        device.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty()).unwrap();
        device.cmd_transition_image_layout(cmd, &to_transfer).unwrap();
        assert!(matches!(
            device.cmd_transition_image_layout(cmd, &to_transfer),
            Err(VulkanError::LayoutViolation { found: vk::ImageLayout::TRANSFER_DST_OPTIMAL, .. })
        ));
        device.end_command_buffer(cmd).unwrap();
        device
            .submit(&Submission {
                command_buffers: &[cmd],
                ..Submission::default()
            })
            .unwrap();
        for layer in 0..6 {
            assert_eq!(device.layout_of(image.image, layer), Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL));
        }
    }

    #[test]
    fn test_single_time_commands_free_their_buffer() {
        let device = RecordingDevice::new();
        let cmd = device.begin_single_time_commands().unwrap();
        device.end_single_time_commands(cmd).unwrap();
        assert_eq!(device.live_resource_count(), 0);
        assert!(device.errors().is_empty());
    }

    #[test]
    fn test_reset_of_pending_command_buffer_is_rejected() {
        let device = RecordingDevice::new();
        let fence = device.create_fence(false).unwrap();
        let cmd = device.allocate_command_buffer().unwrap();
        device.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty()).unwrap();
        device.end_command_buffer(cmd).unwrap();
        device
            .submit(&Submission {
                command_buffers: &[cmd],
                fence: Some(fence),
                ..Submission::default()
            })
            .unwrap();

        assert!(device.reset_command_buffer(cmd).is_err());
        device.wait_for_fence(fence).unwrap();
        device.reset_command_buffer(cmd).unwrap();
    }

    #[test]
    fn test_semaphore_wait_needs_prior_signal() {
        let device = RecordingDevice::new();
        let semaphore = device.create_semaphore().unwrap();
        let waits = [semaphore];
        let stages = [vk::PipelineStageFlags::FRAGMENT_SHADER];
        let wait_only = Submission {
            wait_semaphores: &waits,
            wait_stages: &stages,
            ..Submission::default()
        };
        assert!(device.submit(&wait_only).is_err());

        device
            .submit(&Submission {
                signal_semaphores: &waits,
                ..Submission::default()
            })
            .unwrap();
        device.submit(&wait_only).unwrap();
    }

    #[test]
    fn test_double_destroy_is_reported() {
        let device = RecordingDevice::new();
        let sampler = device
            .create_sampler(&SamplerDesc {
                filter: vk::Filter::LINEAR,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            })
            .unwrap();
        device.destroy(DeviceResource::Sampler(sampler));
        device.destroy(DeviceResource::Sampler(sampler));
        assert_eq!(device.errors().len(), 1);
    }

    #[test]
    fn test_injected_creation_failure() {
        let device = RecordingDevice::new();
        device.fail_creation_after(1);
        assert!(device.create_semaphore().is_ok());
        assert!(matches!(
            device.create_semaphore(),
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));
    }
}
