//! # Rendering
//!
//! Scene rendering on top of a narrow [`RenderDevice`] seam.
//!
//! ## Frame structure
//!
//! Each frame runs two passes over the same renderables and descriptor sets:
//!
//! 1. [`shadow::ShadowRenderer`] renders distance cube maps for every active
//!    light (shadow casters only) and hands out a [`shadow::ShadowPassTicket`].
//! 2. [`main_pass::MainPass`] draws everything from the camera, sampling the
//!    cube maps, and is only submittable with that ticket.
//!
//! Resource lifetimes follow [`device::Owned`]: every handle is released when
//! its owner drops, including on early returns during construction.

pub mod device;
pub mod lighting;
pub mod main_pass;
pub mod mesh;
pub mod renderable;
pub mod shadow;
pub mod vulkan;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use device::{Owned, RenderDevice, ShaderStages, SharedDevice};
pub use lighting::{LightSlot, LightTable, LightingError, PointLight, SceneUniform, MAX_LIGHTS};
pub use main_pass::{MainPass, MainPassTarget};
pub use mesh::{Mesh, PlanarExtents, Vertex};
pub use renderable::{RenderObject, Renderable, RenderableUniform, SharedBindings};
pub use shadow::{CubeFace, ShadowPassTicket, ShadowRenderer, ShadowSettings};
pub use vulkan::{VulkanError, VulkanResult};
