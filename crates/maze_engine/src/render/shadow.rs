//! Omnidirectional shadow maps
//!
//! Every point light owns a six-layer cube map holding, per texel, the distance
//! from the light to the closest shadow caster. The maps are produced by one
//! offscreen pass that is reused for every light and face:
//!
//! ```text
//! all cube maps:      SHADER_READ -> TRANSFER_DST
//! for light, for face:
//!     render casters into the offscreen color target (face view + light index)
//!     color target:   COLOR_ATTACHMENT -> TRANSFER_SRC
//!     copy color target into cube layer `face`
//!     color target:   TRANSFER_SRC -> COLOR_ATTACHMENT
//! all cube maps:      TRANSFER_DST -> SHADER_READ
//! ```
//!
//! The whole sequence is recorded into a single command buffer each frame and
//! submitted with a semaphore. [`ShadowRenderer::submit`] returns a
//! [`ShadowPassTicket`] that the main pass must consume, so the main pass can
//! only be submitted with a wait on that semaphore.
//!
//! ## Cube face orientation
//!
//! Face views use the fixed look-at table of the cube-map convention (+X, -X,
//! +Y, -Y, +Z, -Z, with -Y up for the side faces and ±Z up for the poles). The
//! shadow projection flips depth only, so view-space +Y lands on increasing
//! framebuffer rows and each rendered face matches the texel layout the sampler
//! expects for a world-space lookup direction.

use std::f32::consts::FRAC_PI_2;

use ash::vk;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::device::{
    build_pipeline, AllocatedImage, ImageCopy, ImageDesc, ImageTransition, ImageViewDesc, Owned,
    RenderDevice, RenderPassDesc, SamplerDesc, ShaderStages, SharedDevice, Submission,
};
use crate::render::lighting::MAX_LIGHTS;
use crate::render::renderable::Renderable;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Texel format of shadow cube maps and the offscreen color target
pub const SHADOW_MAP_FORMAT: vk::Format = vk::Format::R32_SFLOAT;

/// One face of a cube map, in array-layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X, layer 0
    PositiveX,
    /// -X, layer 1
    NegativeX,
    /// +Y, layer 2
    PositiveY,
    /// -Y, layer 3
    NegativeY,
    /// +Z, layer 4
    PositiveZ,
    /// -Z, layer 5
    NegativeZ,
}

impl CubeFace {
    /// All faces in layer order
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of the face
    pub fn layer(self) -> u32 {
        self as u32
    }

    /// Face stored at `layer`
    pub fn from_layer(layer: u32) -> Option<Self> {
        Self::ALL.get(layer as usize).copied()
    }

    /// World direction the face looks along
    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::new(1.0, 0.0, 0.0),
            CubeFace::NegativeX => Vec3::new(-1.0, 0.0, 0.0),
            CubeFace::PositiveY => Vec3::new(0.0, 1.0, 0.0),
            CubeFace::NegativeY => Vec3::new(0.0, -1.0, 0.0),
            CubeFace::PositiveZ => Vec3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeZ => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Up vector of the face's view
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeY => Vec3::new(0.0, 0.0, -1.0),
            _ => Vec3::new(0.0, -1.0, 0.0),
        }
    }

    /// View matrix looking from the origin along the face direction
    ///
    /// Light translation is applied separately through the light offset matrix.
    pub fn view(self) -> Mat4 {
        Mat4::look_at(Vec3::zeros(), self.direction(), self.up())
    }
}

/// 90° square projection shared by every face, with depth in [0, 1]
pub fn shadow_projection(near: f32, far: f32) -> Mat4 {
    Mat4::perspective(FRAC_PI_2, 1.0, near, far) * Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 1.0, -1.0))
}

/// Push constants of the shadow pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPushConstants {
    /// Face view matrix
    pub view: [[f32; 4]; 4],
    /// Index of the light being rendered
    pub light_index: i32,
    /// Pads the block to a multiple of 16 bytes
    pub _padding: [i32; 3],
}

// Safe to implement Pod and Zeroable since it only contains f32/i32 arrays without implicit padding
unsafe impl bytemuck::Pod for ShadowPushConstants {}
unsafe impl bytemuck::Zeroable for ShadowPushConstants {}

impl ShadowPushConstants {
    /// Constants for one face of one light
    pub fn new(face: CubeFace, light_index: usize) -> Self {
        Self {
            view: face.view().into(),
            light_index: light_index as i32,
            _padding: [0; 3],
        }
    }
}

/// Shadow map resolution and clip planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Width and height of every cube face
    pub map_size: u32,
    /// Near plane
    pub near: f32,
    /// Far plane, also the distance written where nothing is hit
    pub far: f32,
}

/// A light's distance cube map with its tracked layout
pub struct ShadowCubeMap {
    sampler: Owned<vk::Sampler>,
    view: Owned<vk::ImageView>,
    image: Owned<AllocatedImage>,
    layout: vk::ImageLayout,
}

impl ShadowCubeMap {
    /// Create the cube map and move it to `SHADER_READ_ONLY_OPTIMAL`
    pub fn new(device: &SharedDevice, size: u32) -> VulkanResult<Self> {
        let image = Owned::new(
            device,
            device.create_image(&ImageDesc::cube(
                size,
                SHADOW_MAP_FORMAT,
                vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            ))?,
        );
        let view = Owned::new(
            device,
            device.create_image_view(&ImageViewDesc {
                image: image.get().image,
                format: SHADOW_MAP_FORMAT,
                view_type: vk::ImageViewType::CUBE,
                aspect: vk::ImageAspectFlags::COLOR,
                layer_count: 6,
            })?,
        );
        let sampler = Owned::new(
            device,
            device.create_sampler(&SamplerDesc {
                filter: vk::Filter::NEAREST,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            })?,
        );

        device.transition_image_layout(&ImageTransition::color(
            image.get().image,
            6,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ))?;

        Ok(Self {
            sampler,
            view,
            image,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        })
    }

    /// Cube image
    pub fn image(&self) -> vk::Image {
        self.image.get().image
    }

    /// Cube view over all six layers
    pub fn view(&self) -> vk::ImageView {
        self.view.get()
    }

    /// Sampler used by the main pass
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.get()
    }

    /// Layout all six layers are in as of the last recorded command
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    fn record_transition(&mut self, device: &dyn RenderDevice, cmd: vk::CommandBuffer, expected: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<()> {
        self.expect_layout(expected)?;
        device.cmd_transition_image_layout(cmd, &ImageTransition::color(self.image(), 6, self.layout, new))?;
        self.layout = new;
        Ok(())
    }

    fn record_copy_into(&self, device: &dyn RenderDevice, cmd: vk::CommandBuffer, src: vk::Image, face: CubeFace, extent: vk::Extent2D) -> VulkanResult<()> {
        self.expect_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        device.cmd_copy_image(
            cmd,
            &ImageCopy {
                src,
                src_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst: self.image(),
                dst_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                dst_layer: face.layer(),
                extent,
            },
        )
    }

    fn expect_layout(&self, expected: vk::ImageLayout) -> VulkanResult<()> {
        if self.layout != expected {
            return Err(VulkanError::LayoutViolation {
                image: ash::vk::Handle::as_raw(self.image()),
                layer: 0,
                expected,
                found: self.layout,
            });
        }
        Ok(())
    }
}

/// Lifecycle of the offscreen pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenState {
    /// No resources allocated
    Uninitialized,
    /// Framebuffer, command buffer and sync objects exist; nothing recorded yet
    FramebufferReady,
    /// Commands are being recorded
    Recording,
    /// Command buffer is complete and may be submitted
    Recorded,
    /// Command buffer was submitted; its fence guards the next reset
    Submitted,
    /// Recording failed part-way; the next recording resets the buffer
    Aborted,
}

struct OffscreenResources {
    extent: vk::Extent2D,
    framebuffer: Owned<vk::Framebuffer>,
    render_pass: Owned<vk::RenderPass>,
    _color_view: Owned<vk::ImageView>,
    color: Owned<AllocatedImage>,
    _depth_view: Owned<vk::ImageView>,
    _depth: Owned<AllocatedImage>,
    command_buffer: Owned<vk::CommandBuffer>,
    semaphore: Owned<vk::Semaphore>,
    fence: Owned<vk::Fence>,
}

/// Offscreen framebuffer, command buffer and synchronization reused by every light and face
pub struct OffscreenPass {
    state: OffscreenState,
    resources: Option<OffscreenResources>,
}

impl Default for OffscreenPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OffscreenPass {
    /// Pass without resources
    pub fn new() -> Self {
        Self {
            state: OffscreenState::Uninitialized,
            resources: None,
        }
    }

    /// Current state
    pub fn state(&self) -> OffscreenState {
        self.state
    }

    /// Allocate the `size`² color + depth framebuffer, command buffer, semaphore and fence
    pub fn prepare(&mut self, device: &SharedDevice, size: u32) -> VulkanResult<()> {
        if self.state != OffscreenState::Uninitialized {
            return Err(VulkanError::invalid(format!("offscreen pass prepared twice (state {:?})", self.state)));
        }

        let extent = vk::Extent2D { width: size, height: size };
        let depth_format = device.find_depth_format()?;

        let color = Owned::new(
            device,
            device.create_image(&ImageDesc::attachment(
                extent,
                SHADOW_MAP_FORMAT,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            ))?,
        );
        let color_view = Owned::new(
            device,
            device.create_image_view(&ImageViewDesc {
                image: color.get().image,
                format: SHADOW_MAP_FORMAT,
                view_type: vk::ImageViewType::TYPE_2D,
                aspect: vk::ImageAspectFlags::COLOR,
                layer_count: 1,
            })?,
        );
        let depth = Owned::new(
            device,
            device.create_image(&ImageDesc::attachment(
                extent,
                depth_format,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ))?,
        );
        let depth_view = Owned::new(
            device,
            device.create_image_view(&ImageViewDesc {
                image: depth.get().image,
                format: depth_format,
                view_type: vk::ImageViewType::TYPE_2D,
                aspect: vk::ImageAspectFlags::DEPTH,
                layer_count: 1,
            })?,
        );

        device.transition_image_layout(&ImageTransition::color(
            color.get().image,
            1,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ))?;
        device.transition_image_layout(&ImageTransition {
            aspect: vk::ImageAspectFlags::DEPTH,
            ..ImageTransition::color(
                depth.get().image,
                1,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )
        })?;

        let render_pass = Owned::new(
            device,
            device.create_render_pass(&RenderPassDesc {
                color_format: SHADOW_MAP_FORMAT,
                color_initial_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                color_final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                depth_format,
            })?,
        );
        let framebuffer = Owned::new(
            device,
            device.create_framebuffer(render_pass.get(), &[color_view.get(), depth_view.get()], extent)?,
        );
        let command_buffer = Owned::new(device, device.allocate_command_buffer()?);
        let semaphore = Owned::new(device, device.create_semaphore()?);
        let fence = Owned::new(device, device.create_fence(true)?);

        self.resources = Some(OffscreenResources {
            extent,
            framebuffer,
            render_pass,
            _color_view: color_view,
            color,
            _depth_view: depth_view,
            _depth: depth,
            command_buffer,
            semaphore,
            fence,
        });
        self.state = OffscreenState::FramebufferReady;
        log::debug!("Offscreen shadow pass prepared at {size}x{size} with depth format {depth_format:?}");
        Ok(())
    }

    fn resources(&self) -> VulkanResult<&OffscreenResources> {
        self.resources
            .as_ref()
            .ok_or_else(|| VulkanError::invalid("offscreen pass used before prepare"))
    }

    /// Render pass the shadow pipeline is created against
    pub fn render_pass(&self) -> VulkanResult<vk::RenderPass> {
        Ok(self.resources()?.render_pass.get())
    }

    /// Offscreen target size
    pub fn extent(&self) -> VulkanResult<vk::Extent2D> {
        Ok(self.resources()?.extent)
    }

    /// Reset the command buffer and begin recording
    ///
    /// After a submission this blocks on the pass fence first, so the buffer is
    /// never reset while the GPU may still be executing it.
    pub fn begin_recording(&mut self, device: &dyn RenderDevice) -> VulkanResult<vk::CommandBuffer> {
        let resources = self.resources()?;
        let cmd = resources.command_buffer.get();

        match self.state {
            OffscreenState::FramebufferReady | OffscreenState::Submitted => {
                device.wait_for_fence(resources.fence.get())?;
                device.reset_fence(resources.fence.get())?;
                if self.state == OffscreenState::Submitted {
                    device.reset_command_buffer(cmd)?;
                }
            }
            OffscreenState::Recorded | OffscreenState::Aborted => device.reset_command_buffer(cmd)?,
            OffscreenState::Uninitialized | OffscreenState::Recording => {
                return Err(VulkanError::invalid(format!("cannot begin offscreen recording in state {:?}", self.state)));
            }
        }

        device.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty())?;
        self.state = OffscreenState::Recording;
        Ok(cmd)
    }

    /// Finish recording
    pub fn finish_recording(&mut self, device: &dyn RenderDevice) -> VulkanResult<()> {
        if self.state != OffscreenState::Recording {
            return Err(VulkanError::invalid(format!("cannot finish offscreen recording in state {:?}", self.state)));
        }
        device.end_command_buffer(self.resources()?.command_buffer.get())?;
        self.state = OffscreenState::Recorded;
        Ok(())
    }

    /// Drop a partial recording; the next [`OffscreenPass::begin_recording`] resets it
    pub fn abort_recording(&mut self) {
        if self.state == OffscreenState::Recording {
            self.state = OffscreenState::Aborted;
        }
    }

    /// Submit the recorded commands, signalling the pass semaphore and fence
    pub fn submit(&mut self, device: &dyn RenderDevice) -> VulkanResult<ShadowPassTicket> {
        if self.state != OffscreenState::Recorded {
            return Err(VulkanError::invalid(format!("cannot submit offscreen pass in state {:?}", self.state)));
        }
        let resources = self.resources()?;
        let semaphore = resources.semaphore.get();
        let command_buffers = [resources.command_buffer.get()];
        let signal = [semaphore];
        device.submit(&Submission {
            command_buffers: &command_buffers,
            signal_semaphores: &signal,
            fence: Some(resources.fence.get()),
            ..Submission::default()
        })?;
        self.state = OffscreenState::Submitted;
        Ok(ShadowPassTicket { semaphore })
    }
}

/// Proof that the shadow pass was submitted; redeemed by exactly one waiting submission
#[must_use = "the main pass must wait on the shadow pass semaphore"]
#[derive(Debug, PartialEq, Eq)]
pub struct ShadowPassTicket {
    semaphore: vk::Semaphore,
}

impl ShadowPassTicket {
    /// Stage at which consumers of the shadow maps wait
    pub const WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::FRAGMENT_SHADER;

    /// Semaphore and wait stage for the consuming submission
    pub fn into_wait(self) -> (vk::Semaphore, vk::PipelineStageFlags) {
        (self.semaphore, Self::WAIT_STAGE)
    }

    /// Consume the signal without any work, e.g. when a frame is skipped
    pub fn release(self, device: &dyn RenderDevice) -> VulkanResult<()> {
        let (semaphore, stage) = self.into_wait();
        device.submit(&Submission {
            wait_semaphores: &[semaphore],
            wait_stages: &[stage],
            ..Submission::default()
        })
    }
}

/// Shadow cube maps for every light slot plus the pass and pipeline that fill them
pub struct ShadowRenderer {
    settings: ShadowSettings,
    pipeline: Owned<vk::Pipeline>,
    pipeline_layout: Owned<vk::PipelineLayout>,
    cube_maps: Vec<ShadowCubeMap>,
    pass: OffscreenPass,
}

impl ShadowRenderer {
    /// Create the offscreen pass, [`MAX_LIGHTS`] cube maps and the shadow pipeline
    ///
    /// `set_layout` is the per-object descriptor layout; the shadow shaders read
    /// the object's model matrix and the lighting block from it.
    pub fn new(
        device: &SharedDevice,
        settings: ShadowSettings,
        set_layout: vk::DescriptorSetLayout,
        shaders: ShaderStages<'_>,
    ) -> VulkanResult<Self> {
        let mut pass = OffscreenPass::new();
        pass.prepare(device, settings.map_size)?;

        let cube_maps = (0..MAX_LIGHTS)
            .map(|_| ShadowCubeMap::new(device, settings.map_size))
            .collect::<VulkanResult<Vec<_>>>()?;

        let push_constants = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<ShadowPushConstants>() as u32)
            .build();
        let pipeline_layout = Owned::new(device, device.create_pipeline_layout(&[set_layout], &[push_constants])?);

        let pipeline = build_pipeline(
            device,
            shaders,
            pipeline_layout.get(),
            pass.render_pass()?,
            pass.extent()?,
            vk::CullModeFlags::NONE,
        )?;

        log::info!(
            "Shadow renderer ready: {} cube maps at {}x{}",
            cube_maps.len(),
            settings.map_size,
            settings.map_size
        );

        Ok(Self {
            settings,
            pipeline,
            pipeline_layout,
            cube_maps,
            pass,
        })
    }

    /// Shared shadow projection for the configured clip planes
    pub fn projection(&self) -> Mat4 {
        shadow_projection(self.settings.near, self.settings.far)
    }

    /// (view, sampler) of every cube map, in light-slot order
    pub fn shadow_map_bindings(&self) -> Vec<(vk::ImageView, vk::Sampler)> {
        self.cube_maps.iter().map(|cube| (cube.view(), cube.sampler())).collect()
    }

    /// Cube map of light `index`
    pub fn cube_map(&self, index: usize) -> Option<&ShadowCubeMap> {
        self.cube_maps.get(index)
    }

    /// State of the offscreen pass
    pub fn state(&self) -> OffscreenState {
        self.pass.state()
    }

    /// Record the shadow pass for the first `light_count` lights
    ///
    /// Objects whose [`Renderable::casts_shadows`] is false are skipped. On
    /// failure the partial recording is discarded and the pass can be recorded
    /// again.
    pub fn record(&mut self, device: &dyn RenderDevice, light_count: usize, renderables: &[&dyn Renderable]) -> VulkanResult<()> {
        if light_count > self.cube_maps.len() {
            return Err(VulkanError::invalid(format!(
                "{light_count} lights requested but only {} shadow maps exist",
                self.cube_maps.len()
            )));
        }

        let cmd = self.pass.begin_recording(device)?;
        let casters: Vec<&dyn Renderable> = renderables.iter().copied().filter(|r| r.casts_shadows()).collect();

        match self.record_lights(device, cmd, light_count, &casters) {
            Ok(()) => self.pass.finish_recording(device),
            Err(e) => {
                self.pass.abort_recording();
                for cube in &mut self.cube_maps {
                    cube.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
                }
                Err(e)
            }
        }
    }

    /// Submit the recorded shadow pass
    pub fn submit(&mut self, device: &dyn RenderDevice) -> VulkanResult<ShadowPassTicket> {
        self.pass.submit(device)
    }

    fn record_lights(&mut self, device: &dyn RenderDevice, cmd: vk::CommandBuffer, light_count: usize, casters: &[&dyn Renderable]) -> VulkanResult<()> {
        for cube in &mut self.cube_maps[..light_count] {
            cube.record_transition(
                device,
                cmd,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
        }

        for light in 0..light_count {
            for face in CubeFace::ALL {
                self.record_face(device, cmd, light, face, casters)?;
            }
        }

        for cube in &mut self.cube_maps[..light_count] {
            cube.record_transition(
                device,
                cmd,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;
        }
        Ok(())
    }

    fn record_face(&self, device: &dyn RenderDevice, cmd: vk::CommandBuffer, light: usize, face: CubeFace, casters: &[&dyn Renderable]) -> VulkanResult<()> {
        let resources = self.pass.resources()?;
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [self.settings.far, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        device.cmd_begin_render_pass(
            cmd,
            resources.render_pass.get(),
            resources.framebuffer.get(),
            resources.extent,
            &clear_values,
        )?;
        device.cmd_bind_pipeline(cmd, self.pipeline.get())?;
        device.cmd_push_constants(
            cmd,
            self.pipeline_layout.get(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            bytemuck::bytes_of(&ShadowPushConstants::new(face, light)),
        )?;
        for caster in casters {
            caster.render_object().record_draw(device, cmd, self.pipeline_layout.get())?;
        }
        device.cmd_end_render_pass(cmd)?;

        let color = resources.color.get().image;
        device.cmd_transition_image_layout(
            cmd,
            &ImageTransition::color(
                color,
                1,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
        )?;
        self.cube_maps[light].record_copy_into(device, cmd, color, face, resources.extent)?;
        device.cmd_transition_image_layout(
            cmd,
            &ImageTransition::color(
                color,
                1,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use ash::vk::Handle;
    use approx::assert_relative_eq;

    use super::*;
    use crate::foundation::math::Vec4;
    use crate::render::device::AllocatedBuffer;
    use crate::render::mesh::Mesh;
    use crate::render::renderable::{RenderObject, SharedBindings};
    use crate::render::testing::{Call, RecordingDevice};

    const SHADERS: ShaderStages<'static> = ShaderStages {
        vertex: &[0x03, 0x02, 0x23, 0x07],
        fragment: &[0x03, 0x02, 0x23, 0x07],
    };

    fn settings() -> ShadowSettings {
        ShadowSettings { map_size: 64, near: 0.1, far: 1024.0 }
    }

    struct Blob {
        object: RenderObject,
    }

    impl Renderable for Blob {
        fn render_object(&self) -> &RenderObject {
            &self.object
        }

        fn model_matrix(&self) -> Mat4 {
            Mat4::identity()
        }
    }

    struct Fixture {
        recorder: Arc<RecordingDevice>,
        device: SharedDevice,
        pool: Owned<vk::DescriptorPool>,
        layout: Owned<vk::DescriptorSetLayout>,
        scene_uniform: Owned<AllocatedBuffer>,
    }

    impl Fixture {
        fn new() -> Self {
            let recorder = Arc::new(RecordingDevice::new());
            let device: SharedDevice = recorder.clone();
            let pool = Owned::new(&device, device.create_descriptor_pool(&[], 8).unwrap());
            let layout = Owned::new(&device, device.create_descriptor_set_layout(&[]).unwrap());
            let scene_uniform = Owned::new(
                &device,
                device
                    .create_buffer(464, vk::BufferUsageFlags::UNIFORM_BUFFER, vk::MemoryPropertyFlags::HOST_VISIBLE)
                    .unwrap(),
            );
            Self { recorder, device, pool, layout, scene_uniform }
        }

        fn blob(&self, renderer: &ShadowRenderer, casts_shadows: bool) -> Blob {
            let bindings = SharedBindings {
                pool: self.pool.get(),
                layout: self.layout.get(),
                scene_uniform: self.scene_uniform.get(),
                shadow_maps: renderer.shadow_map_bindings(),
            };
            let mesh = Mesh::sphere(1.0, 4, 4, Vec4::new(1.0, 1.0, 1.0, 1.0));
            Blob {
                object: RenderObject::new(&self.device, &mesh, casts_shadows, &bindings).unwrap(),
            }
        }
    }

    #[test]
    fn test_face_views_look_along_face_direction() {
        for face in CubeFace::ALL {
            let view = face.view();
            assert_relative_eq!(view.transform_vector(&face.direction()), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
            assert_relative_eq!(view.transform_vector(&face.up()), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_face_layers_round_trip() {
        for (layer, face) in CubeFace::ALL.iter().enumerate() {
            assert_eq!(face.layer(), layer as u32);
            assert_eq!(CubeFace::from_layer(layer as u32), Some(*face));
        }
        assert_eq!(CubeFace::from_layer(6), None);
    }

    #[test]
    fn test_rendered_faces_follow_cube_map_texel_axes() {
        // (face, world axis along increasing s, world axis along increasing t)
        let expected = [
            (CubeFace::PositiveX, Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, -1.0, 0.0)),
            (CubeFace::NegativeX, Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, -1.0, 0.0)),
            (CubeFace::PositiveY, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
            (CubeFace::NegativeY, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0)),
            (CubeFace::PositiveZ, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
            (CubeFace::NegativeZ, Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
        ];
        let projection = shadow_projection(0.1, 1024.0);

        for (face, s_axis, t_axis) in expected {
            let ndc = |p: Vec3| {
                let clip = projection * face.view() * Vec4::new(p.x, p.y, p.z, 1.0);
                Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
            };
            let center = ndc(face.direction() * 10.0);
            assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
            assert_relative_eq!(center.y, 0.0, epsilon = 1e-5);
            assert!(center.z > 0.0 && center.z < 1.0, "{face:?} depth {}", center.z);

            let along_s = ndc(face.direction() * 10.0 + s_axis);
            let along_t = ndc(face.direction() * 10.0 + t_axis);
            assert!(along_s.x > 0.0 && along_s.y.abs() < 1e-5, "{face:?} s axis");
            assert!(along_t.y > 0.0 && along_t.x.abs() < 1e-5, "{face:?} t axis");
        }
    }

    #[test]
    fn test_push_constants_fit_minimum_limit() {
        assert_eq!(std::mem::size_of::<ShadowPushConstants>(), 80);
        let constants = ShadowPushConstants::new(CubeFace::NegativeY, 2);
        assert_eq!(constants.light_index, 2);
    }

    #[test]
    fn test_offscreen_pass_rejects_out_of_order_use() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let mut pass = OffscreenPass::new();

        assert!(matches!(pass.begin_recording(&*device), Err(VulkanError::InvalidOperation { .. })));
        assert!(matches!(pass.submit(&*device), Err(VulkanError::InvalidOperation { .. })));

        pass.prepare(&device, 32).unwrap();
        assert_eq!(pass.state(), OffscreenState::FramebufferReady);
        assert!(pass.prepare(&device, 32).is_err());
        assert!(pass.finish_recording(&*device).is_err());

        pass.begin_recording(&*device).unwrap();
        assert!(pass.begin_recording(&*device).is_err());
        assert!(pass.submit(&*device).is_err());
        pass.finish_recording(&*device).unwrap();
        assert_eq!(pass.state(), OffscreenState::Recorded);

        let ticket = pass.submit(&*device).unwrap();
        assert_eq!(pass.state(), OffscreenState::Submitted);
        ticket.release(&*device).unwrap();
    }

    #[test]
    fn test_rerecord_waits_on_fence_before_reset() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let mut pass = OffscreenPass::new();
        pass.prepare(&device, 32).unwrap();

        for _ in 0..3 {
            let cmd = pass.begin_recording(&*device).unwrap();
            assert_ne!(cmd, vk::CommandBuffer::null());
            pass.finish_recording(&*device).unwrap();
            pass.submit(&*device).unwrap().release(&*device).unwrap();
        }

        let calls = recorder.calls();
        let resets: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, Call::ResetCommandBuffer(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(resets.len(), 2);
        for reset in resets {
            assert!(matches!(calls[reset - 2], Call::WaitForFence(_)));
            assert!(matches!(calls[reset - 1], Call::ResetFence(_)));
        }
    }

    #[test]
    fn test_aborted_recording_can_be_rerecorded() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let mut pass = OffscreenPass::new();
        pass.prepare(&device, 32).unwrap();

        pass.begin_recording(&*device).unwrap();
        pass.abort_recording();
        assert_eq!(pass.state(), OffscreenState::Aborted);
        pass.begin_recording(&*device).unwrap();
        pass.finish_recording(&*device).unwrap();
        pass.submit(&*device).unwrap().release(&*device).unwrap();
    }

    #[test]
    fn test_transitions_bracket_every_face_copy() {
        let fixture = Fixture::new();
        let mut renderer = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS).unwrap();
        let caster = fixture.blob(&renderer, true);
        let light_count = 3;
        let cubes: Vec<u64> = (0..light_count)
            .map(|i| renderer.cube_map(i).unwrap().image().as_raw())
            .collect();

        fixture.recorder.clear_calls();
        for _frame in 0..2 {
            renderer.record(&*fixture.device, light_count, &[&caster]).unwrap();
            renderer.submit(&*fixture.device).unwrap().release(&*fixture.device).unwrap();
        }

        // Per frame and cube: SHADER_READ -> TRANSFER_DST, six copies into layers 0..6, TRANSFER_DST -> SHADER_READ
        let calls = fixture.recorder.calls();
        let mut events: HashMap<u64, Vec<String>> = HashMap::new();
        for call in &calls {
            match call {
                Call::Transition { image, old, new, base_layer: 0, layer_count: 6, .. } if cubes.contains(image) => {
                    events.entry(*image).or_default().push(format!("{old:?}->{new:?}"));
                }
                Call::CopyImage { dst, dst_layer, .. } if cubes.contains(dst) => {
                    events.entry(*dst).or_default().push(format!("copy{dst_layer}"));
                }
                _ => {}
            }
        }

        let mut frame = vec!["SHADER_READ_ONLY_OPTIMAL->TRANSFER_DST_OPTIMAL".to_string()];
        frame.extend((0..6).map(|layer| format!("copy{layer}")));
        frame.push("TRANSFER_DST_OPTIMAL->SHADER_READ_ONLY_OPTIMAL".to_string());
        let expected: Vec<String> = frame.iter().chain(frame.iter()).cloned().collect();

        for cube in &cubes {
            assert_eq!(events[cube], expected);
        }
        for i in 0..light_count {
            let cube = renderer.cube_map(i).unwrap();
            assert_eq!(cube.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            for layer in 0..6 {
                assert_eq!(
                    fixture.recorder.layout_of(cube.image(), layer),
                    Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                );
            }
        }
    }

    #[test]
    fn test_non_casters_are_skipped() {
        let fixture = Fixture::new();
        let mut renderer = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS).unwrap();
        let caster = fixture.blob(&renderer, true);
        let ghost = fixture.blob(&renderer, false);

        fixture.recorder.clear_calls();
        renderer.record(&*fixture.device, 2, &[&caster, &ghost]).unwrap();

        let calls = fixture.recorder.calls();
        let draws = calls.iter().filter(|c| matches!(c, Call::DrawIndexed { .. })).count();
        assert_eq!(draws, 2 * 6);
        let ghost_binds = calls
            .iter()
            .filter(|c| matches!(c, Call::BindDescriptorSet { set, .. } if *set == ghost.object.descriptor_set().as_raw()))
            .count();
        assert_eq!(ghost_binds, 0);

        let pushes: Vec<ShadowPushConstants> = calls
            .iter()
            .filter_map(|c| match c {
                Call::PushConstants { bytes, .. } => Some(bytemuck::pod_read_unaligned::<ShadowPushConstants>(bytes)),
                _ => None,
            })
            .collect();
        assert_eq!(pushes.len(), 12);
        assert_eq!(pushes[0], ShadowPushConstants::new(CubeFace::PositiveX, 0));
        assert_eq!(pushes[11], ShadowPushConstants::new(CubeFace::NegativeZ, 1));
    }

    #[test]
    fn test_failed_recording_leaves_cube_maps_readable() {
        let fixture = Fixture::new();
        let mut renderer = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS).unwrap();
        let caster = fixture.blob(&renderer, true);

        // The second cube rejects its transition after the first one was recorded
        renderer.cube_maps[1].layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        assert!(matches!(
            renderer.record(&*fixture.device, 2, &[&caster]),
            Err(VulkanError::LayoutViolation { .. })
        ));
        assert_eq!(renderer.state(), OffscreenState::Aborted);

        renderer.record(&*fixture.device, 2, &[&caster]).unwrap();
        renderer.submit(&*fixture.device).unwrap().release(&*fixture.device).unwrap();
        for i in 0..2 {
            let cube = renderer.cube_map(i).unwrap();
            assert_eq!(cube.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            for layer in 0..6 {
                assert_eq!(
                    fixture.recorder.layout_of(cube.image(), layer),
                    Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                );
            }
        }
    }

    #[test]
    fn test_too_many_lights_is_rejected() {
        let fixture = Fixture::new();
        let mut renderer = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS).unwrap();
        assert!(renderer.record(&*fixture.device, MAX_LIGHTS + 1, &[]).is_err());
        assert_eq!(renderer.state(), OffscreenState::FramebufferReady);
    }

    #[test]
    fn test_renderer_releases_everything_on_drop() {
        let fixture = Fixture::new();
        let baseline = fixture.recorder.live_resource_count();
        {
            let mut renderer = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS).unwrap();
            let caster = fixture.blob(&renderer, true);
            renderer.record(&*fixture.device, 1, &[&caster]).unwrap();
            renderer.submit(&*fixture.device).unwrap().release(&*fixture.device).unwrap();
            fixture.device.device_wait_idle().unwrap();
        }
        assert_eq!(fixture.recorder.live_resource_count(), baseline);
        assert!(fixture.recorder.errors().is_empty());
    }

    #[test]
    fn test_failed_creation_leaks_nothing() {
        for successes in 0..24 {
            let fixture = Fixture::new();
            let baseline = fixture.recorder.live_resource_count();
            fixture.recorder.fail_creation_after(successes);
            let result = ShadowRenderer::new(&fixture.device, settings(), fixture.layout.get(), SHADERS);
            if result.is_err() {
                assert_eq!(fixture.recorder.live_resource_count(), baseline, "after {successes} creations");
            }
        }
    }
}
