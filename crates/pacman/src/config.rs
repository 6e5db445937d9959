//! Game configuration
//!
//! Every section falls back to its defaults, so a `pacman.toml` only needs
//! the values it changes.

use maze_engine::config::Config;
use maze_engine::foundation::math::Vec3;
use serde::{Deserialize, Serialize};

/// Complete game configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Window settings
    pub window: WindowConfig,

    /// Gameplay settings
    pub gameplay: GameplayConfig,

    /// Graphics settings
    pub graphics: GraphicsConfig,

    /// Resource locations
    pub paths: PathsConfig,
}

impl Config for GameConfig {}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width
    pub width: u32,

    /// Window height
    pub height: u32,

    /// Window title
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Pacman".to_string(),
        }
    }
}

/// Gameplay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Speed of the player and ghosts (units per millisecond)
    pub movement_speed: f32,

    /// Seconds between ghost direction decisions
    pub ghost_decision_interval: f32,

    /// Planar distance to the player below which ghosts flee instead of wandering
    pub ghost_flee_threshold: f32,

    /// Height the ghosts bob above their spawn height
    pub ghost_bob_height: f32,

    /// Spawn positions; the player starts at the first, ghosts at the following ones.
    /// Caught ghosts respawn at any of them.
    pub spawn_points: Vec<[f32; 3]>,

    /// Fixed RNG seed for reproducible ghosts; seeded from entropy when absent
    pub rng_seed: Option<u64>,
}

impl GameplayConfig {
    /// Spawn points as vectors
    pub fn spawn_positions(&self) -> Vec<Vec3> {
        self.spawn_points.iter().map(|p| Vec3::new(p[0], p[1], p[2])).collect()
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            movement_speed: 0.25,
            ghost_decision_interval: 0.5,
            ghost_flee_threshold: 300.0,
            ghost_bob_height: 40.0,
            spawn_points: vec![
                [350.0, 30.0, 400.0],
                [100.0, 30.0, 100.0],
                [700.0, 30.0, 100.0],
                [700.0, 30.0, 700.0],
            ],
            rng_seed: None,
        }
    }
}

/// Graphics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Width and height of every shadow cube face
    pub shadow_map_size: u32,

    /// Near clip plane of the camera and the shadow faces
    pub z_near: f32,

    /// Far clip plane of the camera and the shadow faces
    pub z_far: f32,

    /// Vertical field of view of the camera
    pub fov_degrees: f32,

    /// Camera position
    pub camera_eye: [f32; 3],

    /// Point the camera looks at
    pub camera_target: [f32; 3],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 1024,
            z_near: 0.1,
            z_far: 1024.0,
            fov_degrees: 45.0,
            camera_eye: [400.0, 650.0, 1000.0],
            camera_target: [400.0, 0.0, 400.0],
        }
    }
}

/// Resource locations, relative to the working directory or the crate root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// SVG level file
    pub level: String,

    /// Directory holding the compiled `*.spv` shaders
    pub shaders: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            level: "resources/levels/level1.svg".to_string(),
            shaders: "target/shaders".to_string(),
        }
    }
}
