//! Point-light table shared by the scene and its light-carrying entities
//!
//! The table holds up to [`MAX_LIGHTS`] point lights, each with a position, a
//! color and a per-light offset matrix (translation by the negated light
//! position) used by the shadow pass to move geometry into light space.
//!
//! # Slot ownership
//!
//! Entities never index the table directly. [`LightTable::claim_slot`] hands out
//! a [`LightSlot`] token that cannot be cloned or forged, and the only mutable
//! access to a light goes through [`LightTable::light_mut`] with that token. Each
//! slot therefore has exactly one writer; the scene alone performs the bulk
//! offset refresh and uniform upload after all entities have updated.

use thiserror::Error;

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Maximum number of point lights (and shadow cube maps) in a scene
pub const MAX_LIGHTS: usize = 4;

/// Lighting errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LightingError {
    /// Every slot has already been claimed
    #[error("All {max} light slots are in use")]
    SlotsExhausted {
        /// Table capacity
        max: usize,
    },
}

/// Exclusive write access to one light of a [`LightTable`]
#[derive(Debug, PartialEq, Eq)]
pub struct LightSlot {
    index: usize,
}

impl LightSlot {
    /// Index of the light in the table and in the shadow cube-map array
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World position, w = 1
    pub position: Vec4,
    /// RGBA color
    pub color: Vec4,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            color: Vec4::zeros(),
        }
    }
}

/// GPU layout of the lighting uniform block (std140 compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneUniform {
    /// Shadow projection shared by every light and face
    pub projection: [[f32; 4]; 4],
    /// Translation by the negated light position, per light
    pub light_offsets: [[[f32; 4]; 4]; MAX_LIGHTS],
    /// Light positions
    pub light_positions: [[f32; 4]; MAX_LIGHTS],
    /// Light colors
    pub light_colors: [[f32; 4]; MAX_LIGHTS],
    /// Number of claimed lights
    pub light_count: u32,
    /// Pads the block to a multiple of 16 bytes
    pub _padding: [u32; 3],
}

// Safe to implement Pod and Zeroable since it only contains f32/u32 arrays without implicit padding
unsafe impl bytemuck::Pod for SceneUniform {}
unsafe impl bytemuck::Zeroable for SceneUniform {}

/// Table of point lights with single-writer slots
#[derive(Debug, Clone)]
pub struct LightTable {
    projection: Mat4,
    lights: [PointLight; MAX_LIGHTS],
    offsets: [Mat4; MAX_LIGHTS],
    claimed: usize,
}

impl LightTable {
    /// Empty table using `projection` for every shadow face
    pub fn new(projection: Mat4) -> Self {
        Self {
            projection,
            lights: [PointLight::default(); MAX_LIGHTS],
            offsets: [Mat4::identity(); MAX_LIGHTS],
            claimed: 0,
        }
    }

    /// Claim the next free slot
    pub fn claim_slot(&mut self) -> Result<LightSlot, LightingError> {
        if self.claimed == MAX_LIGHTS {
            return Err(LightingError::SlotsExhausted { max: MAX_LIGHTS });
        }
        let slot = LightSlot { index: self.claimed };
        self.claimed += 1;
        log::debug!("Claimed light slot {}", slot.index);
        Ok(slot)
    }

    /// Number of claimed slots
    pub fn active_count(&self) -> usize {
        self.claimed
    }

    /// Shared shadow projection
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Read a light by index
    pub fn light(&self, index: usize) -> Option<&PointLight> {
        self.lights[..self.claimed].get(index)
    }

    /// Write access to the light owned by `slot`
    pub fn light_mut(&mut self, slot: &LightSlot) -> &mut PointLight {
        &mut self.lights[slot.index]
    }

    /// Offset matrix of a light as of the last [`LightTable::refresh_offsets`]
    pub fn offset(&self, index: usize) -> Option<Mat4> {
        self.offsets[..self.claimed].get(index).copied()
    }

    /// Recompute every offset matrix from the current light positions
    pub fn refresh_offsets(&mut self) {
        for (offset, light) in self.offsets.iter_mut().zip(&self.lights) {
            *offset = Mat4::new_translation(&-Vec3::new(light.position.x, light.position.y, light.position.z));
        }
    }

    /// Snapshot of the table in uniform layout
    pub fn uniform(&self) -> SceneUniform {
        let mut uniform = SceneUniform {
            projection: self.projection.into(),
            light_offsets: [[[0.0; 4]; 4]; MAX_LIGHTS],
            light_positions: [[0.0; 4]; MAX_LIGHTS],
            light_colors: [[0.0; 4]; MAX_LIGHTS],
            light_count: self.claimed as u32,
            _padding: [0; 3],
        };
        for i in 0..MAX_LIGHTS {
            uniform.light_offsets[i] = self.offsets[i].into();
            uniform.light_positions[i] = self.lights[i].position.into();
            uniform.light_colors[i] = self.lights[i].color.into();
        }
        uniform
    }
}
