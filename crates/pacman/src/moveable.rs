//! Kinematic bodies moving through the maze
//!
//! Velocity lives in the maze plane: its `x` runs along world X and its `y`
//! along world Z. "Up" on the keyboard moves towards -Z.

use maze_engine::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3};
use maze_engine::physics::collision::{ColliderExtents, CollisionRect};
use maze_engine::render::PlanarExtents;

/// The four movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards -Z
    Up,
    /// Towards +Z
    Down,
    /// Towards -X
    Left,
    /// Towards +X
    Right,
}

impl Direction {
    /// Every direction, in the order random choices index into
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit vector in the maze plane
    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }

    /// The direction pointing the other way
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Position, planar velocity and collider of a moving entity
#[derive(Debug, Clone, PartialEq)]
pub struct Moveable {
    position: Vec3,
    velocity: Vec2,
    movement_speed: f32,
    scale: Vec3,
    extents: ColliderExtents,
}

impl Moveable {
    /// Body at `position` whose collider is the mesh footprint scaled by `scale`
    ///
    /// The footprint is fixed from here on: entities never change mesh or scale.
    pub fn new(mesh_extents: PlanarExtents, position: Vec3, scale: Vec3, movement_speed: f32) -> Self {
        let extents = ColliderExtents::from_min_max(
            mesh_extents.min_x * scale.x,
            mesh_extents.max_x * scale.x,
            mesh_extents.min_z * scale.z,
            mesh_extents.max_z * scale.z,
        );
        Self {
            position,
            velocity: Vec2::zeros(),
            movement_speed,
            scale,
            extents,
        }
    }

    /// World position
    pub fn position(&self) -> &Vec3 {
        &self.position
    }

    /// Planar velocity in units per millisecond
    pub fn velocity(&self) -> &Vec2 {
        &self.velocity
    }

    /// Speed along the axis of movement
    pub fn movement_speed(&self) -> f32 {
        self.movement_speed
    }

    /// Collider at the current position
    pub fn collider(&self) -> CollisionRect {
        self.extents.at(&self.position)
    }

    /// Model matrix: translate(position) * scale
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::translate_scale(self.position, self.scale)
    }

    /// Advance by `dt` milliseconds unless the new collider would overlap a wall
    ///
    /// The move is all or nothing: there is no sliding along the free axis.
    /// Returns whether the body moved.
    pub fn integrate(&mut self, dt: f32, walls: &[CollisionRect]) -> bool {
        if self.velocity == Vec2::zeros() {
            return false;
        }

        let mut candidate = self.position;
        candidate.x += self.velocity.x * dt;
        candidate.z += self.velocity.y * dt;

        if self.extents.at(&candidate).overlaps_any(walls) {
            return false;
        }
        self.position = candidate;
        true
    }

    /// Move along `direction` at full speed, stopping the other axis
    pub fn set_direction(&mut self, direction: Direction) {
        self.velocity = direction.unit() * self.movement_speed;
    }

    /// Stop the axis of `direction` if the body is still moving that way
    pub fn release(&mut self, direction: Direction) {
        let unit = direction.unit();
        if self.velocity.x * unit.x > 0.0 {
            self.velocity.x = 0.0;
        }
        if self.velocity.y * unit.y > 0.0 {
            self.velocity.y = 0.0;
        }
    }

    /// Teleport to `point`; velocity is kept
    pub fn respawn(&mut self, point: Vec3) {
        self.position = point;
    }

    /// Set the height without touching the planar position
    pub fn set_height(&mut self, y: f32) {
        self.position.y = y;
    }
}

/// Something with a [`Moveable`] body
pub trait Embodied {
    /// The entity's body
    fn body(&self) -> &Moveable;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_extents() -> PlanarExtents {
        PlanarExtents { min_x: -1.0, max_x: 1.0, min_z: -1.0, max_z: 1.0 }
    }

    fn body_at(x: f32, z: f32) -> Moveable {
        Moveable::new(unit_extents(), Vec3::new(x, 30.0, z), Vec3::new(10.0, 10.0, 10.0), 0.25)
    }

    #[test]
    fn test_collider_scaled_and_offset() {
        let body = body_at(100.0, 50.0);
        assert_eq!(body.collider(), CollisionRect::new(90.0, 40.0, 20.0, 20.0));
    }

    #[test]
    fn test_collider_with_only_positive_extents() {
        let extents = PlanarExtents { min_x: 0.0, max_x: 2.0, min_z: 1.0, max_z: 3.0 };
        let body = Moveable::new(extents, Vec3::new(10.0, 0.0, 10.0), Vec3::new(2.0, 1.0, 2.0), 0.25);
        assert_eq!(body.collider(), CollisionRect::new(10.0, 12.0, 4.0, 4.0));
    }

    #[test]
    fn test_integrate_commits_free_move() {
        let mut body = body_at(100.0, 100.0);
        body.set_direction(Direction::Right);
        let walls = [CollisionRect::new(300.0, 0.0, 20.0, 400.0)];

        assert!(body.integrate(16.0, &walls));
        assert_relative_eq!(*body.position(), Vec3::new(104.0, 30.0, 100.0));
    }

    #[test]
    fn test_integrate_rejects_move_into_wall() {
        let mut body = body_at(100.0, 100.0);
        body.set_direction(Direction::Right);
        // Collider right edge at 110, 4 units short of the wall after one step
        let walls = [CollisionRect::new(112.0, 0.0, 20.0, 400.0)];

        assert!(!body.integrate(16.0, &walls));
        assert_eq!(*body.position(), Vec3::new(100.0, 30.0, 100.0));
        // Still pushing against the wall
        assert_eq!(*body.velocity(), Vec2::new(0.25, 0.0));
    }

    #[test]
    fn test_integrate_without_velocity_is_noop() {
        let mut body = body_at(100.0, 100.0);
        assert!(!body.integrate(1000.0, &[]));
        assert_eq!(*body.position(), Vec3::new(100.0, 30.0, 100.0));
    }

    #[test]
    fn test_flush_against_wall_can_move_away() {
        let mut body = body_at(100.0, 100.0);
        let walls = [CollisionRect::new(110.0, 0.0, 20.0, 400.0)];
        body.set_direction(Direction::Left);
        assert!(body.integrate(4.0, &walls));
        assert_relative_eq!(body.position().x, 99.0);
    }

    #[test]
    fn test_direction_exclusivity() {
        let mut body = body_at(0.0, 0.0);
        for direction in Direction::ALL {
            body.set_direction(direction);
            let velocity = *body.velocity();
            let nonzero = [velocity.x, velocity.y].iter().filter(|v| **v != 0.0).count();
            assert_eq!(nonzero, 1, "{direction:?}");
            assert_eq!(velocity, direction.unit() * 0.25);
        }
    }

    #[test]
    fn test_release_only_stops_matching_direction() {
        let mut body = body_at(0.0, 0.0);
        body.set_direction(Direction::Left);
        body.release(Direction::Right);
        assert_eq!(*body.velocity(), Vec2::new(-0.25, 0.0));
        body.release(Direction::Up);
        assert_eq!(*body.velocity(), Vec2::new(-0.25, 0.0));
        body.release(Direction::Left);
        assert_eq!(*body.velocity(), Vec2::zeros());
    }

    #[test]
    fn test_respawn_keeps_velocity() {
        let mut body = body_at(100.0, 100.0);
        body.set_direction(Direction::Down);
        body.respawn(Vec3::new(700.0, 30.0, 700.0));

        assert_eq!(*body.position(), Vec3::new(700.0, 30.0, 700.0));
        assert_eq!(*body.velocity(), Vec2::new(0.0, 0.25));
        assert_eq!(body.collider(), CollisionRect::new(690.0, 690.0, 20.0, 20.0));
    }

    #[test]
    fn test_opposites() {
        for direction in Direction::ALL {
            assert_eq!(direction.opposite().opposite(), direction);
            assert_eq!(direction.opposite().unit(), -direction.unit());
        }
    }
}
