//! Game error types

use std::path::PathBuf;

use maze_engine::config::ConfigError;
use maze_engine::render::{LightingError, VulkanError};
use thiserror::Error;

/// Level file errors
#[derive(Error, Debug)]
pub enum MazeError {
    /// The level file could not be read
    #[error("Failed to read level {}: {source}", .path.display())]
    Io {
        /// Level file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The level file is not well-formed XML
    #[error("Malformed level XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A required element is missing
    #[error("Level has no <{0}> element")]
    MissingElement(&'static str),

    /// A wall element lacks one of its geometry attributes
    #[error("Wall <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        /// Tag name of the wall element
        element: String,
        /// Missing attribute
        attribute: &'static str,
    },

    /// A geometry attribute is not a non-negative number where one is required
    #[error("Wall attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        /// Attribute name
        attribute: &'static str,
        /// Raw attribute value
        value: String,
    },

    /// The level describes no walls
    #[error("Level contains no walls")]
    Empty,
}

/// Top-level game errors
#[derive(Error, Debug)]
pub enum GameError {
    /// GPU setup or rendering failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// The level could not be loaded
    #[error("Maze error: {0}")]
    Maze(#[from] MazeError),

    /// The configuration file could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// More light-carrying entities than light slots
    #[error("Lighting error: {0}")]
    Lighting(#[from] LightingError),

    /// The configuration is readable but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A procedural mesh came out without vertices
    #[error("Mesh for {0} has no vertices")]
    EmptyMesh(&'static str),

    /// A compiled shader could not be read
    #[error("Failed to read shader {}: {source}", .path.display())]
    Shader {
        /// SPIR-V file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Window creation failed
    #[error("Window error: {0}")]
    Window(String),
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;
