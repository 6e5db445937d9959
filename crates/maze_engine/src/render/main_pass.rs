//! Camera pass drawing the lit scene into presentable images
//!
//! The pass samples the shadow cube maps, so its submission must wait for the
//! shadow pass. [`MainPass::submit`] only accepts a [`ShadowPassTicket`], which
//! makes that wait impossible to forget.

use ash::vk;

use crate::render::device::{
    build_pipeline, AllocatedImage, ImageDesc, ImageTransition, ImageViewDesc, Owned,
    RenderDevice, RenderPassDesc, ShaderStages, SharedDevice, Submission,
};
use crate::render::renderable::Renderable;
use crate::render::shadow::ShadowPassTicket;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Images the main pass renders into, typically the swapchain
#[derive(Debug, Clone)]
pub struct MainPassTarget {
    /// Color format of every target image
    pub format: vk::Format,
    /// Size of every target image
    pub extent: vk::Extent2D,
    /// One view per target image
    pub views: Vec<vk::ImageView>,
    /// Layout the color image is left in, `PRESENT_SRC_KHR` for a swapchain
    pub final_layout: vk::ImageLayout,
}

/// Render pass, depth buffer, framebuffers and pipeline of the camera view
pub struct MainPass {
    extent: vk::Extent2D,
    recorded: bool,
    fence: Owned<vk::Fence>,
    command_buffer: Owned<vk::CommandBuffer>,
    pipeline: Owned<vk::Pipeline>,
    pipeline_layout: Owned<vk::PipelineLayout>,
    framebuffers: Vec<Owned<vk::Framebuffer>>,
    _depth_view: Owned<vk::ImageView>,
    _depth: Owned<AllocatedImage>,
    render_pass: Owned<vk::RenderPass>,
}

impl MainPass {
    /// Build the pass for `target`
    pub fn new(
        device: &SharedDevice,
        target: &MainPassTarget,
        set_layout: vk::DescriptorSetLayout,
        shaders: ShaderStages<'_>,
    ) -> VulkanResult<Self> {
        if target.views.is_empty() {
            return Err(VulkanError::invalid("main pass needs at least one target image"));
        }
        let depth_format = device.find_depth_format()?;

        let render_pass = Owned::new(
            device,
            device.create_render_pass(&RenderPassDesc {
                color_format: target.format,
                color_initial_layout: vk::ImageLayout::UNDEFINED,
                color_final_layout: target.final_layout,
                depth_format,
            })?,
        );

        let depth = Owned::new(
            device,
            device.create_image(&ImageDesc::attachment(
                target.extent,
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
        device.transition_image_layout(&ImageTransition {
            aspect: vk::ImageAspectFlags::DEPTH,
            ..ImageTransition::color(
                depth.get().image,
                1,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )
        })?;

        let framebuffers = target
            .views
            .iter()
            .map(|&view| {
                device
                    .create_framebuffer(render_pass.get(), &[view, depth_view.get()], target.extent)
                    .map(|framebuffer| Owned::new(device, framebuffer))
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let pipeline_layout = Owned::new(device, device.create_pipeline_layout(&[set_layout], &[])?);
        let pipeline = build_pipeline(
            device,
            shaders,
            pipeline_layout.get(),
            render_pass.get(),
            target.extent,
            vk::CullModeFlags::NONE,
        )?;

        let command_buffer = Owned::new(device, device.allocate_command_buffer()?);
        let fence = Owned::new(device, device.create_fence(true)?);

        log::debug!(
            "Main pass ready: {} targets at {}x{}",
            framebuffers.len(),
            target.extent.width,
            target.extent.height
        );

        Ok(Self {
            extent: target.extent,
            recorded: false,
            fence,
            command_buffer,
            pipeline,
            pipeline_layout,
            framebuffers,
            _depth_view: depth_view,
            _depth: depth,
            render_pass,
        })
    }

    /// Size of the target images
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Block until the previous frame's main submission has finished
    ///
    /// Call before writing uniforms the previous frame may still read.
    pub fn wait_for_previous_frame(&self, device: &dyn RenderDevice) -> VulkanResult<()> {
        device.wait_for_fence(self.fence.get())
    }

    /// Record the pass into target image `image_index`
    pub fn record(&mut self, device: &dyn RenderDevice, image_index: u32, renderables: &[&dyn Renderable]) -> VulkanResult<()> {
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::invalid(format!("no framebuffer for target image {image_index}")))?
            .get();
        let cmd = self.command_buffer.get();

        self.wait_for_previous_frame(device)?;
        device.reset_command_buffer(cmd)?;
        self.recorded = false;
        device.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty())?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        device.cmd_begin_render_pass(cmd, self.render_pass.get(), framebuffer, self.extent, &clear_values)?;
        device.cmd_bind_pipeline(cmd, self.pipeline.get())?;
        for renderable in renderables {
            renderable.render_object().record_draw(device, cmd, self.pipeline_layout.get())?;
        }
        device.cmd_end_render_pass(cmd)?;
        device.end_command_buffer(cmd)?;

        self.recorded = true;
        Ok(())
    }

    /// Submit the recorded pass after the shadow pass
    ///
    /// Waits on the shadow semaphore at the fragment stage and, when given, on
    /// `image_available` at color output. Signals `render_finished` if present.
    pub fn submit(
        &mut self,
        device: &dyn RenderDevice,
        shadows: ShadowPassTicket,
        image_available: Option<vk::Semaphore>,
        render_finished: Option<vk::Semaphore>,
    ) -> VulkanResult<()> {
        if !self.recorded {
            shadows.release(device)?;
            return Err(VulkanError::invalid("main pass submitted before it was recorded"));
        }

        let (shadow_semaphore, shadow_stage) = shadows.into_wait();
        let mut wait_semaphores = vec![shadow_semaphore];
        let mut wait_stages = vec![shadow_stage];
        if let Some(semaphore) = image_available {
            wait_semaphores.push(semaphore);
            wait_stages.push(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        }
        let signal_semaphores: Vec<vk::Semaphore> = render_finished.into_iter().collect();
        let command_buffers = [self.command_buffer.get()];

        device.reset_fence(self.fence.get())?;
        device.submit(&Submission {
            command_buffers: &command_buffers,
            wait_semaphores: &wait_semaphores,
            wait_stages: &wait_stages,
            signal_semaphores: &signal_semaphores,
            fence: Some(self.fence.get()),
        })?;
        self.recorded = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ash::vk::Handle;

    use super::*;
    use crate::render::testing::{Call, RecordingDevice};

    const SHADERS: ShaderStages<'static> = ShaderStages {
        vertex: &[0x03, 0x02, 0x23, 0x07],
        fragment: &[0x03, 0x02, 0x23, 0x07],
    };

    fn target(device: &SharedDevice, images: &mut Vec<Owned<AllocatedImage>>, views: &mut Vec<Owned<vk::ImageView>>) -> MainPassTarget {
        let extent = vk::Extent2D { width: 320, height: 200 };
        for _ in 0..2 {
            let image = Owned::new(
                device,
                device
                    .create_image(&ImageDesc::attachment(extent, vk::Format::B8G8R8A8_SRGB, vk::ImageUsageFlags::COLOR_ATTACHMENT))
                    .unwrap(),
            );
            let view = device
                .create_image_view(&ImageViewDesc {
                    image: image.get().image,
                    format: vk::Format::B8G8R8A8_SRGB,
                    view_type: vk::ImageViewType::TYPE_2D,
                    aspect: vk::ImageAspectFlags::COLOR,
                    layer_count: 1,
                })
                .unwrap();
            images.push(image);
            views.push(Owned::new(device, view));
        }
        MainPassTarget {
            format: vk::Format::B8G8R8A8_SRGB,
            extent,
            views: views.iter().map(Owned::get).collect(),
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    #[test]
    fn test_submission_waits_on_shadow_pass() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let (mut images, mut views) = (Vec::new(), Vec::new());
        let target = target(&device, &mut images, &mut views);
        let layout = Owned::new(&device, device.create_descriptor_set_layout(&[]).unwrap());
        let mut pass = MainPass::new(&device, &target, layout.get(), SHADERS).unwrap();

        let mut shadow = crate::render::shadow::OffscreenPass::new();
        shadow.prepare(&device, 16).unwrap();
        shadow.begin_recording(&*device).unwrap();
        shadow.finish_recording(&*device).unwrap();
        let ticket = shadow.submit(&*device).unwrap();
        let image_available = Owned::new(&device, device.create_semaphore().unwrap());
        device
            .submit(&Submission {
                signal_semaphores: &[image_available.get()],
                ..Submission::default()
            })
            .unwrap();

        pass.record(&*device, 1, &[]).unwrap();
        pass.submit(&*device, ticket, Some(image_available.get()), None).unwrap();

        let submit = recorder
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Submit { .. }))
            .last()
            .unwrap();
        match submit {
            Call::Submit { wait, fence, .. } => {
                assert_eq!(wait.len(), 2);
                assert_eq!(wait[1], image_available.get().as_raw());
                assert!(fence.is_some());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unrecorded_submit_releases_ticket() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let (mut images, mut views) = (Vec::new(), Vec::new());
        let target = target(&device, &mut images, &mut views);
        let layout = Owned::new(&device, device.create_descriptor_set_layout(&[]).unwrap());
        let mut pass = MainPass::new(&device, &target, layout.get(), SHADERS).unwrap();

        let mut shadow = crate::render::shadow::OffscreenPass::new();
        shadow.prepare(&device, 16).unwrap();
        for _ in 0..2 {
            shadow.begin_recording(&*device).unwrap();
            shadow.finish_recording(&*device).unwrap();
            let ticket = shadow.submit(&*device).unwrap();
            assert!(pass.submit(&*device, ticket, None, None).is_err());
        }
    }

    #[test]
    fn test_record_rejects_unknown_image() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let (mut images, mut views) = (Vec::new(), Vec::new());
        let target = target(&device, &mut images, &mut views);
        let layout = Owned::new(&device, device.create_descriptor_set_layout(&[]).unwrap());
        let mut pass = MainPass::new(&device, &target, layout.get(), SHADERS).unwrap();

        assert!(pass.record(&*device, 2, &[]).is_err());
        pass.record(&*device, 0, &[]).unwrap();
        pass.record(&*device, 1, &[]).unwrap();
    }

    #[test]
    fn test_pass_frees_everything() {
        let recorder = Arc::new(RecordingDevice::new());
        let device: SharedDevice = recorder.clone();
        let (mut images, mut views) = (Vec::new(), Vec::new());
        let target = target(&device, &mut images, &mut views);
        let layout = Owned::new(&device, device.create_descriptor_set_layout(&[]).unwrap());
        let baseline = recorder.live_resource_count();

        drop(MainPass::new(&device, &target, layout.get(), SHADERS).unwrap());
        assert_eq!(recorder.live_resource_count(), baseline);

        for successes in 0..12 {
            recorder.fail_creation_after(successes);
            if MainPass::new(&device, &target, layout.get(), SHADERS).is_err() {
                assert_eq!(recorder.live_resource_count(), baseline);
            }
        }
    }
}
