//! # Maze Engine
//!
//! Engine layer for small Vulkan maze games.
//!
//! ## Features
//!
//! - **Render device seam**: [`render::RenderDevice`] over raw `ash` handles, with
//!   an ash backend and a headless recording backend for tests
//! - **Omnidirectional shadows**: per-light distance cube maps rendered through
//!   one reusable offscreen pass
//! - **Lighting**: a fixed table of point lights with single-writer slots
//! - **Planar collision**: axis-aligned rectangles in the maze plane
//! - **Configuration**: TOML/RON config files with defaults
//!
//! Window, surface and swapchain bootstrap sit behind the `window` feature so
//! everything else builds and tests without a display or GPU.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod physics;
pub mod render;

/// Common imports for games built on the engine
pub mod prelude {
    pub use crate::config::{Config, ConfigError};
    pub use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
    pub use crate::foundation::time::Timer;
    pub use crate::physics::collision::{ColliderExtents, CollisionRect};
    pub use crate::render::{
        LightSlot, LightTable, Mesh, RenderDevice, RenderObject, Renderable, SharedDevice,
        VulkanError, VulkanResult,
    };
}
