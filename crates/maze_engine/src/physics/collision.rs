//! Axis-aligned collision rectangles in the maze plane
//!
//! A rectangle's `x`/`width` run along world X and its `y`/`height` run along
//! world Z; the level files describe walls in that 2D space directly.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Axis-aligned rectangle used for wall and entity overlap tests
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CollisionRect {
    /// Lowest X coordinate
    pub x: f32,
    /// Lowest Z coordinate
    pub y: f32,
    /// Extent along X, never negative
    pub width: f32,
    /// Extent along Z, never negative
    pub height: f32,
}

impl CollisionRect {
    /// Creates a rectangle from its lowest corner and its size
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates the rectangle spanning two corners given in any order
    pub fn from_corners(a_x: f32, a_y: f32, b_x: f32, b_y: f32) -> Self {
        Self {
            x: a_x.min(b_x),
            y: a_y.min(b_y),
            width: (b_x - a_x).abs(),
            height: (b_y - a_y).abs(),
        }
    }

    /// Highest X coordinate
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    /// Highest Z coordinate
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Returns true iff the interiors of both rectangles intersect.
    ///
    /// Shared edges do not count as overlap, so an entity can sit flush
    /// against a wall without being stuck to it.
    pub fn overlaps(&self, other: &CollisionRect) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    /// Returns true if this rectangle overlaps any in `others`
    pub fn overlaps_any<'a, I>(&self, others: I) -> bool
    where
        I: IntoIterator<Item = &'a CollisionRect>,
    {
        others.into_iter().any(|other| self.overlaps(other))
    }

    /// Smallest rectangle containing every rectangle in `rects`, or `None` when empty
    pub fn bounding<'a, I>(rects: I) -> Option<CollisionRect>
    where
        I: IntoIterator<Item = &'a CollisionRect>,
    {
        rects.into_iter().fold(None, |acc: Option<CollisionRect>, rect| {
            Some(match acc {
                None => *rect,
                Some(bounds) => CollisionRect::from_corners(
                    bounds.x.min(rect.x),
                    bounds.y.min(rect.y),
                    bounds.max_x().max(rect.max_x()),
                    bounds.max_y().max(rect.max_y()),
                ),
            })
        })
    }
}

/// Planar footprint of a mesh, relative to the entity origin
///
/// Computed once from scaled mesh extents; [`ColliderExtents::at`] places it
/// at a world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderExtents {
    /// Lowest local X (may be negative)
    pub min_x: f32,
    /// Lowest local Z (may be negative)
    pub min_z: f32,
    /// Extent along X
    pub width: f32,
    /// Extent along Z
    pub depth: f32,
}

impl ColliderExtents {
    /// Builds extents from min/max local coordinates in either order
    pub fn from_min_max(min_x: f32, max_x: f32, min_z: f32, max_z: f32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_z: min_z.min(max_z),
            width: (max_x - min_x).abs(),
            depth: (max_z - min_z).abs(),
        }
    }

    /// Collider rectangle for an entity at `position`
    pub fn at(&self, position: &Vec3) -> CollisionRect {
        CollisionRect::new(
            position.x + self.min_x,
            position.z + self.min_z,
            self.width,
            self.depth,
        )
    }
}
