//! # Pacman
//!
//! A 3D maze chase on [`maze_engine`]. The player steers a yellow sphere through
//! walls extruded from an SVG level while ghosts wander, flee when the player
//! comes close and respawn when caught. Each ghost carries a point light that
//! casts omnidirectional shadows from the maze and the player.
//!
//! The simulation ([`player`], [`ghost`], [`moveable`], [`maze`]) is plain data
//! and runs without a GPU. [`scene::Scene`] ties it to the engine's shadow and
//! main passes through the [`maze_engine::render::RenderDevice`] seam.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod config;
pub mod error;
pub mod ghost;
pub mod input;
pub mod maze;
pub mod moveable;
pub mod player;
pub mod scene;
pub mod shaders;

pub use config::GameConfig;
pub use error::{GameError, GameResult, MazeError};
pub use maze::Maze;
pub use scene::{Camera, Scene};
pub use shaders::ShaderLibrary;
