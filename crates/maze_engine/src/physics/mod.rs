//! Physics module for planar collision detection
//!
//! The maze game only needs axis-aligned rectangles in the maze plane (X, Z).

pub mod collision;

pub use collision::CollisionRect;
