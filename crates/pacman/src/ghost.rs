//! Ghosts: timer-driven flee/wander AI, bobbing, and a point light each
//!
//! A ghost re-evaluates its direction only every `decision_interval` seconds
//! and holds it in between. Close to the player it flees diagonally away,
//! otherwise it wanders in a random direction.

use maze_engine::foundation::math::{Vec3, Vec4};
use maze_engine::physics::collision::CollisionRect;
use maze_engine::render::{LightSlot, LightTable};
use rand::Rng;

use crate::config::GameplayConfig;
use crate::moveable::{Direction, Embodied, Moveable};

/// Bob phase advance per millisecond
pub const BOB_SPEED: f32 = 0.001;

/// Light colors of the ghosts, in spawn order
pub const GHOST_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
];

/// Ghost AI tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostSettings {
    /// Seconds between direction decisions
    pub decision_interval: f32,
    /// Planar distance under which the ghost flees
    pub flee_threshold: f32,
    /// Bob amplitude above the spawn height
    pub bob_height: f32,
}

impl From<&GameplayConfig> for GhostSettings {
    fn from(config: &GameplayConfig) -> Self {
        Self {
            decision_interval: config.ghost_decision_interval,
            flee_threshold: config.ghost_flee_threshold,
            bob_height: config.ghost_bob_height,
        }
    }
}

/// Where the player is relative to a ghost, strictly off both axes
///
/// "Top" is towards -Z, matching [`Direction::Up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    /// Player at smaller X and smaller Z
    TopLeft,
    /// Player at larger X and smaller Z
    TopRight,
    /// Player at smaller X and larger Z
    BottomLeft,
    /// Player at larger X and larger Z
    BottomRight,
}

impl Quadrant {
    /// Quadrant of `player` seen from `ghost`, `None` when they share an X or Z coordinate
    pub fn classify(ghost: &Vec3, player: &Vec3) -> Option<Self> {
        let left = player.x < ghost.x;
        let right = player.x > ghost.x;
        let top = player.z < ghost.z;
        let bottom = player.z > ghost.z;

        match (left, right, top, bottom) {
            (true, _, true, _) => Some(Quadrant::TopLeft),
            (_, true, true, _) => Some(Quadrant::TopRight),
            (true, _, _, true) => Some(Quadrant::BottomLeft),
            (_, true, _, true) => Some(Quadrant::BottomRight),
            _ => None,
        }
    }

    /// The two directions leading away from a player in this quadrant
    pub fn escape_directions(self) -> [Direction; 2] {
        match self {
            Quadrant::TopLeft => [Direction::Down, Direction::Right],
            Quadrant::TopRight => [Direction::Down, Direction::Left],
            Quadrant::BottomLeft => [Direction::Up, Direction::Right],
            Quadrant::BottomRight => [Direction::Up, Direction::Left],
        }
    }
}

/// Outcome of one direction decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Player far away: any of the four directions
    Wander,
    /// Player in a quadrant: one of two escape directions
    Flee([Direction; 2]),
    /// Player on the same row or column: straight away from it
    Escape(Direction),
    /// Player at the ghost's planar position: keep going
    Hold,
}

/// Decide how a ghost at `ghost` reacts to the player at `player`
///
/// Distance is measured in the maze plane, so bobbing does not matter.
pub fn decide(ghost: &Vec3, player: &Vec3, flee_threshold: f32) -> Decision {
    let dx = player.x - ghost.x;
    let dz = player.z - ghost.z;
    if dx.hypot(dz) > flee_threshold {
        return Decision::Wander;
    }

    if let Some(quadrant) = Quadrant::classify(ghost, player) {
        return Decision::Flee(quadrant.escape_directions());
    }

    if dz == 0.0 && dx < 0.0 {
        Decision::Escape(Direction::Right)
    } else if dz == 0.0 && dx > 0.0 {
        Decision::Escape(Direction::Left)
    } else if dx == 0.0 && dz < 0.0 {
        Decision::Escape(Direction::Down)
    } else if dx == 0.0 && dz > 0.0 {
        Decision::Escape(Direction::Up)
    } else {
        Decision::Hold
    }
}

impl Decision {
    /// Resolve the decision to a direction, drawing from `rng` where it is a choice
    pub fn choose<R: Rng + ?Sized>(self, rng: &mut R) -> Option<Direction> {
        match self {
            Decision::Wander => Some(Direction::ALL[rng.gen_range(0..Direction::ALL.len())]),
            Decision::Flee([first, second]) => Some(if rng.gen_bool(0.5) { first } else { second }),
            Decision::Escape(direction) => Some(direction),
            Decision::Hold => None,
        }
    }
}

/// A ghost
#[derive(Debug)]
pub struct Ghost {
    body: Moveable,
    light: LightSlot,
    settings: GhostSettings,
    base_y: f32,
    offset_y: f32,
    bob_phase: f32,
    decision_timer: f32,
}

impl Ghost {
    /// Ghost owning light `slot`, lit in `color`
    ///
    /// The bob oscillates between the spawn height and `bob_height` above it.
    pub fn new(body: Moveable, slot: LightSlot, color: Vec4, settings: GhostSettings, lights: &mut LightTable) -> Self {
        let base_y = body.position().y;
        let light = lights.light_mut(&slot);
        light.color = color;
        light.position = body.position().push(1.0);

        Self {
            body,
            light: slot,
            settings,
            base_y,
            offset_y: base_y + settings.bob_height,
            bob_phase: 0.0,
            decision_timer: 0.0,
        }
    }

    /// Index of the ghost's light and shadow cube map
    pub fn light_index(&self) -> usize {
        self.light.index()
    }

    /// Advance by `dt` milliseconds
    ///
    /// Moves, bobs, publishes the light position and, when the decision timer
    /// runs out, picks a new direction relative to `player`.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        walls: &[CollisionRect],
        player: &Vec3,
        lights: &mut LightTable,
        rng: &mut R,
    ) {
        self.body.integrate(dt, walls);

        self.bob_phase += BOB_SPEED * dt;
        self.decision_timer += dt / 1000.0;

        let (sin, cos) = self.bob_phase.sin_cos();
        self.body.set_height(self.base_y * cos * cos + self.offset_y * sin * sin);
        lights.light_mut(&self.light).position = self.body.position().push(1.0);

        if self.decision_timer >= self.settings.decision_interval {
            self.decision_timer = 0.0;
            let decision = decide(self.body.position(), player, self.settings.flee_threshold);
            if let Some(direction) = decision.choose(rng) {
                log::debug!("Ghost {} {:?} -> {:?}", self.light.index(), decision, direction);
                self.body.set_direction(direction);
            }
        }
    }

    /// Teleport to `point` after being caught; the direction is kept
    pub fn respawn(&mut self, point: Vec3) {
        self.body.respawn(point);
    }
}

impl Embodied for Ghost {
    fn body(&self) -> &Moveable {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use maze_engine::foundation::math::{Mat4, Vec2};
    use maze_engine::render::PlanarExtents;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    const SETTINGS: GhostSettings = GhostSettings {
        decision_interval: 0.5,
        flee_threshold: 300.0,
        bob_height: 40.0,
    };

    fn ghost_at(position: Vec3, lights: &mut LightTable) -> Ghost {
        let extents = PlanarExtents { min_x: -1.0, max_x: 1.0, min_z: -1.0, max_z: 1.0 };
        let body = Moveable::new(extents, position, Vec3::new(10.0, 10.0, 10.0), 0.25);
        let slot = lights.claim_slot().unwrap();
        Ghost::new(body, slot, Vec4::new(1.0, 0.0, 0.0, 1.0), SETTINGS, lights)
    }

    #[test]
    fn test_close_player_top_left_flees_down_or_right() {
        let ghost = Vec3::new(100.0, 30.0, 100.0);
        let player = Vec3::new(50.0, 30.0, 50.0);
        let decision = decide(&ghost, &player, 300.0);
        assert_eq!(decision, Decision::Flee([Direction::Down, Direction::Right]));

        let mut rng = StdRng::seed_from_u64(1);
        let chosen: HashSet<_> = (0..64).filter_map(|_| decision.choose(&mut rng)).collect();
        assert_eq!(chosen, HashSet::from([Direction::Down, Direction::Right]));
    }

    #[test]
    fn test_far_player_wanders() {
        let ghost = Vec3::new(100.0, 30.0, 100.0);
        let player = Vec3::new(700.0, 30.0, 700.0);
        assert_eq!(decide(&ghost, &player, 300.0), Decision::Wander);

        let mut rng = StdRng::seed_from_u64(2);
        let chosen: HashSet<_> = (0..128).filter_map(|_| Decision::Wander.choose(&mut rng)).collect();
        assert_eq!(chosen.len(), 4);
    }

    #[test]
    fn test_threshold_is_inclusive_and_planar() {
        let ghost = Vec3::new(0.0, 30.0, 0.0);
        // Exactly 300 away in the plane, far above in Y
        let player = Vec3::new(300.0, 500.0, 0.0);
        assert_eq!(decide(&ghost, &player, 300.0), Decision::Escape(Direction::Left));
    }

    #[test]
    fn test_decision_sweep_is_exhaustive() {
        let ghost = Vec3::new(0.0, 0.0, 0.0);
        let mut quadrants = 0;
        let mut escapes = 0;
        let mut holds = 0;

        for x in -5..=5 {
            for z in -5..=5 {
                let player = Vec3::new(x as f32 * 10.0, 0.0, z as f32 * 10.0);
                let quadrant = Quadrant::classify(&ghost, &player);
                match decide(&ghost, &player, 300.0) {
                    Decision::Flee(directions) => {
                        quadrants += 1;
                        assert_eq!(quadrant.map(Quadrant::escape_directions), Some(directions));
                        assert!(x != 0 && z != 0);
                    }
                    Decision::Escape(_) => {
                        escapes += 1;
                        assert!(quadrant.is_none());
                        assert!((x == 0) != (z == 0));
                    }
                    Decision::Hold => {
                        holds += 1;
                        assert_eq!((x, z), (0, 0));
                    }
                    Decision::Wander => panic!("everything is within the threshold"),
                }
            }
        }

        assert_eq!(quadrants, 100);
        assert_eq!(escapes, 20);
        assert_eq!(holds, 1);
    }

    #[test]
    fn test_quadrants_symmetric_under_reflection() {
        let ghost = Vec3::new(200.0, 30.0, 200.0);
        let mirror_x = |d: Direction| match d {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            other => other,
        };
        let mirror_z = |d: Direction| match d {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            other => other,
        };

        for (dx, dz) in [(-30.0, -70.0), (15.0, -5.0), (-1.0, 90.0), (60.0, 60.0)] {
            let player = Vec3::new(ghost.x + dx, 30.0, ghost.z + dz);
            let mirrored_x = Vec3::new(ghost.x - dx, 30.0, ghost.z + dz);
            let mirrored_z = Vec3::new(ghost.x + dx, 30.0, ghost.z - dz);

            let [a, b] = Quadrant::classify(&ghost, &player).unwrap().escape_directions();
            let [ax, bx] = Quadrant::classify(&ghost, &mirrored_x).unwrap().escape_directions();
            let [az, bz] = Quadrant::classify(&ghost, &mirrored_z).unwrap().escape_directions();
            assert_eq!([mirror_x(a), mirror_x(b)], [ax, bx]);
            assert_eq!([mirror_z(a), mirror_z(b)], [az, bz]);
        }
    }

    #[test]
    fn test_aligned_player_escapes_straight_away() {
        let ghost = Vec3::new(100.0, 30.0, 100.0);
        let cases = [
            (Vec3::new(50.0, 30.0, 100.0), Direction::Right),
            (Vec3::new(150.0, 30.0, 100.0), Direction::Left),
            (Vec3::new(100.0, 30.0, 50.0), Direction::Down),
            (Vec3::new(100.0, 30.0, 150.0), Direction::Up),
        ];
        for (player, expected) in cases {
            assert_eq!(decide(&ghost, &player, 300.0), Decision::Escape(expected));
        }
    }

    #[test]
    fn test_coincident_player_keeps_direction() {
        let mut lights = LightTable::new(Mat4::identity());
        let mut ghost = ghost_at(Vec3::new(100.0, 30.0, 100.0), &mut lights);
        ghost.body.set_direction(Direction::Left);
        let mut rng = StdRng::seed_from_u64(3);

        // Zero-length step through the decision: no movement, decision falls through
        ghost.decision_timer = SETTINGS.decision_interval;
        ghost.update(0.0, &[], &Vec3::new(100.0, 0.0, 100.0), &mut lights, &mut rng);
        assert_eq!(*ghost.body().velocity(), Vec2::new(-0.25, 0.0));
        assert_eq!(ghost.decision_timer, 0.0);
    }

    #[test]
    fn test_direction_is_held_between_decisions() {
        let mut lights = LightTable::new(Mat4::identity());
        let mut ghost = ghost_at(Vec3::new(100.0, 30.0, 100.0), &mut lights);
        let player = Vec3::new(50.0, 30.0, 50.0);
        let mut rng = StdRng::seed_from_u64(4);

        // 30 frames of 16 ms stay below the 500 ms interval
        for _ in 0..30 {
            ghost.update(16.0, &[], &player, &mut lights, &mut rng);
        }
        assert_eq!(*ghost.body().velocity(), Vec2::zeros());

        ghost.update(40.0, &[], &player, &mut lights, &mut rng);
        let velocity = *ghost.body().velocity();
        assert!(velocity == Vec2::new(0.0, 0.25) || velocity == Vec2::new(0.25, 0.0));
    }

    #[test]
    fn test_bob_stays_between_base_and_offset() {
        let mut lights = LightTable::new(Mat4::identity());
        let mut ghost = ghost_at(Vec3::new(100.0, 30.0, 100.0), &mut lights);
        let player = Vec3::new(1000.0, 30.0, 1000.0);
        let mut rng = StdRng::seed_from_u64(5);

        let mut highest: f32 = 0.0;
        for _ in 0..400 {
            ghost.update(10.0, &[], &player, &mut lights, &mut rng);
            let y = ghost.body().position().y;
            assert!((30.0 - 1e-3..=70.0 + 1e-3).contains(&y));
            highest = highest.max(y);
        }
        assert_relative_eq!(highest, 70.0, epsilon = 0.1);
    }

    #[test]
    fn test_light_follows_ghost() {
        let mut lights = LightTable::new(Mat4::identity());
        let _other = lights.claim_slot().unwrap();
        let mut ghost = ghost_at(Vec3::new(100.0, 30.0, 100.0), &mut lights);
        assert_eq!(ghost.light_index(), 1);
        assert_eq!(lights.light(1).unwrap().color, Vec4::new(1.0, 0.0, 0.0, 1.0));

        let mut rng = StdRng::seed_from_u64(6);
        ghost.body.set_direction(Direction::Right);
        ghost.update(100.0, &[], &Vec3::new(900.0, 0.0, 900.0), &mut lights, &mut rng);

        let position = *ghost.body().position();
        assert_eq!(lights.light(1).unwrap().position, position.push(1.0));
        assert_eq!(lights.light(0).unwrap().position, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_respawn_keeps_direction() {
        let mut lights = LightTable::new(Mat4::identity());
        let mut ghost = ghost_at(Vec3::new(100.0, 30.0, 100.0), &mut lights);
        ghost.body.set_direction(Direction::Up);
        ghost.respawn(Vec3::new(700.0, 30.0, 100.0));
        assert_eq!(*ghost.body().position(), Vec3::new(700.0, 30.0, 100.0));
        assert_eq!(*ghost.body().velocity(), Vec2::new(0.0, -0.25));
    }
}
