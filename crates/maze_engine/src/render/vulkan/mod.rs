//! Vulkan backend
//!
//! [`VulkanDevice`] implements [`crate::render::device::RenderDevice`] on top of ash.
//! Instance, surface and swapchain bootstrap live behind the `window` feature.

pub mod device;
#[cfg(feature = "window")]
pub mod context;
#[cfg(feature = "window")]
pub mod swapchain;
#[cfg(feature = "window")]
pub mod window;

use ash::vk;
use thiserror::Error;

pub use device::VulkanDevice;
#[cfg(feature = "window")]
pub use context::VulkanContext;
#[cfg(feature = "window")]
pub use swapchain::Swapchain;
#[cfg(feature = "window")]
pub use window::{Window, WindowError};

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// None of the candidate formats supports the requested features
    #[error("No supported format among {0:?}")]
    NoSupportedFormat(Vec<vk::Format>),

    /// An image layer was used in a layout other than the one it is in
    #[error("Layout violation on image {image:#x} layer {layer}: expected {expected:?}, found {found:?}")]
    LayoutViolation {
        /// Raw image handle
        image: u64,
        /// Array layer
        layer: u32,
        /// Layout the command assumed
        expected: vk::ImageLayout,
        /// Layout the layer is actually in
        found: vk::ImageLayout,
    },
}

impl VulkanError {
    /// Shorthand for [`VulkanError::InvalidOperation`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into() }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
