//! Compiled SPIR-V shaders
//!
//! `build.rs` compiles `resources/shaders/<name>.<stage>` to
//! `target/shaders/<name>.<stage>.spv`.

use std::path::{Path, PathBuf};

use maze_engine::render::ShaderStages;

use crate::error::{GameError, GameResult};

/// Vertex and fragment SPIR-V of one program
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
}

impl ShaderProgram {
    /// Read `<name>.vert.spv` and `<name>.frag.spv` from `dir`
    pub fn load(dir: &Path, name: &str) -> GameResult<Self> {
        Ok(Self {
            vertex: read_spirv(dir.join(format!("{name}.vert.spv")))?,
            fragment: read_spirv(dir.join(format!("{name}.frag.spv")))?,
        })
    }

    /// Borrow both stages
    pub fn stages(&self) -> ShaderStages<'_> {
        ShaderStages {
            vertex: &self.vertex,
            fragment: &self.fragment,
        }
    }
}

/// Every program the scene uses
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    /// Distance-to-light program of the shadow pass
    pub shadow: ShaderProgram,
    /// Lit program of the main pass
    pub scene: ShaderProgram,
}

impl ShaderLibrary {
    /// Load all programs from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> GameResult<Self> {
        let dir = dir.as_ref();
        let library = Self {
            shadow: ShaderProgram::load(dir, "shadow")?,
            scene: ShaderProgram::load(dir, "scene")?,
        };
        log::info!("Loaded shaders from {}", dir.display());
        Ok(library)
    }
}

fn read_spirv(path: PathBuf) -> GameResult<Vec<u8>> {
    std::fs::read(&path).map_err(|source| GameError::Shader { path, source })
}
