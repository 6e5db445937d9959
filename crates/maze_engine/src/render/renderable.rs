//! GPU-side state of a drawable object
//!
//! A [`RenderObject`] owns the device-local vertex and index buffers of one
//! mesh, a host-visible per-object uniform buffer and the descriptor set that
//! binds it together with the scene lighting block and the shadow cube maps.
//! Game entities embed one and expose it through [`Renderable`].

use ash::vk;

use crate::foundation::math::Mat4;
use crate::render::device::{
    AllocatedBuffer, DescriptorWrite, Owned, RenderDevice, SharedDevice,
};
use crate::render::mesh::Mesh;
use crate::render::vulkan::VulkanResult;

/// Per-object uniform block (std140 compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderableUniform {
    /// projection * view * model
    pub mvp: [[f32; 4]; 4],
    /// Camera projection
    pub projection: [[f32; 4]; 4],
    /// Camera view
    pub view: [[f32; 4]; 4],
    /// Model matrix
    pub model: [[f32; 4]; 4],
}

// Safe to implement Pod and Zeroable for RenderableUniform since it only contains f32 arrays
unsafe impl bytemuck::Pod for RenderableUniform {}
unsafe impl bytemuck::Zeroable for RenderableUniform {}

impl RenderableUniform {
    /// Build the block for one object
    pub fn new(projection: &Mat4, view: &Mat4, model: &Mat4) -> Self {
        Self {
            mvp: (projection * view * model).into(),
            projection: (*projection).into(),
            view: (*view).into(),
            model: (*model).into(),
        }
    }
}

/// Shared descriptor resources every render object binds
#[derive(Debug, Clone)]
pub struct SharedBindings {
    /// Pool the object's set is allocated from
    pub pool: vk::DescriptorPool,
    /// Layout of the object's set
    pub layout: vk::DescriptorSetLayout,
    /// Scene lighting uniform buffer (binding 1)
    pub scene_uniform: AllocatedBuffer,
    /// Shadow cube maps as (view, sampler), one per light slot (binding 2)
    pub shadow_maps: Vec<(vk::ImageView, vk::Sampler)>,
}

/// Descriptor binding of the per-object uniform
pub const OBJECT_UNIFORM_BINDING: u32 = 0;
/// Descriptor binding of the lighting uniform
pub const SCENE_UNIFORM_BINDING: u32 = 1;
/// Descriptor binding of the shadow cube-map array
pub const SHADOW_MAP_BINDING: u32 = 2;

/// Uploaded mesh plus per-object uniform and descriptor set
pub struct RenderObject {
    vertex_buffer: Owned<AllocatedBuffer>,
    index_buffer: Owned<AllocatedBuffer>,
    uniform_buffer: Owned<AllocatedBuffer>,
    descriptor_set: vk::DescriptorSet,
    index_count: u32,
    casts_shadows: bool,
    device: SharedDevice,
}

impl RenderObject {
    /// Upload `mesh` and allocate the object's descriptor set
    pub fn new(device: &SharedDevice, mesh: &Mesh, casts_shadows: bool, bindings: &SharedBindings) -> VulkanResult<Self> {
        let vertex_buffer = Owned::new(
            device,
            device.create_device_local_buffer(bytemuck::cast_slice(&mesh.vertices), vk::BufferUsageFlags::VERTEX_BUFFER)?,
        );
        let index_buffer = Owned::new(
            device,
            device.create_device_local_buffer(bytemuck::cast_slice(&mesh.indices), vk::BufferUsageFlags::INDEX_BUFFER)?,
        );
        let uniform_buffer = Owned::new(
            device,
            device.create_buffer(
                std::mem::size_of::<RenderableUniform>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?,
        );

        let descriptor_set = device.allocate_descriptor_set(bindings.pool, bindings.layout)?;
        device.update_descriptor_set(
            descriptor_set,
            &[
                DescriptorWrite::UniformBuffer {
                    binding: OBJECT_UNIFORM_BINDING,
                    buffer: uniform_buffer.get().buffer,
                    range: uniform_buffer.get().size,
                },
                DescriptorWrite::UniformBuffer {
                    binding: SCENE_UNIFORM_BINDING,
                    buffer: bindings.scene_uniform.buffer,
                    range: bindings.scene_uniform.size,
                },
                DescriptorWrite::CombinedImageSamplers {
                    binding: SHADOW_MAP_BINDING,
                    images: bindings.shadow_maps.clone(),
                },
            ],
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            descriptor_set,
            index_count: mesh.index_count(),
            casts_shadows,
            device: device.clone(),
        })
    }

    /// Device-local vertex buffer
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.get().buffer
    }

    /// Device-local `u32` index buffer
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.get().buffer
    }

    /// Number of indices to draw
    pub fn num_indices(&self) -> u32 {
        self.index_count
    }

    /// Descriptor set bound for both passes
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Whether the object is drawn into shadow cube maps
    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Write the per-object uniform for the current camera
    pub fn update_uniform_buffer(&self, model: &Mat4, projection: &Mat4, view: &Mat4) -> VulkanResult<()> {
        let uniform = RenderableUniform::new(projection, view, model);
        self.device.write_buffer(&self.uniform_buffer.get(), bytemuck::bytes_of(&uniform))
    }

    /// Record binding and drawing of this object
    pub fn record_draw(&self, device: &dyn RenderDevice, cmd: vk::CommandBuffer, layout: vk::PipelineLayout) -> VulkanResult<()> {
        device.cmd_bind_descriptor_set(cmd, layout, self.descriptor_set)?;
        device.cmd_bind_mesh_buffers(cmd, self.vertex_buffer(), self.index_buffer())?;
        device.cmd_draw_indexed(cmd, self.index_count)
    }
}

/// Anything the scene draws
pub trait Renderable {
    /// GPU state of the object
    fn render_object(&self) -> &RenderObject;

    /// Current model matrix
    fn model_matrix(&self) -> Mat4;

    /// Refresh the per-object uniform from the current transform
    fn update_uniform_buffer(&self, projection: &Mat4, view: &Mat4) -> VulkanResult<()> {
        self.render_object().update_uniform_buffer(&self.model_matrix(), projection, view)
    }

    /// Whether the object appears in the shadow pass
    fn casts_shadows(&self) -> bool {
        self.render_object().casts_shadows()
    }
}
