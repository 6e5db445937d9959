//! The keyboard-controlled player

use maze_engine::physics::collision::CollisionRect;

use crate::input::{KeyAction, KeyEvent};
use crate::moveable::{Embodied, Moveable};

/// The player: a body steered by the last directional key
#[derive(Debug, Clone)]
pub struct Player {
    body: Moveable,
}

impl Player {
    /// Player with the given body
    pub fn new(body: Moveable) -> Self {
        Self { body }
    }

    /// Apply a key event
    ///
    /// A press turns towards its direction. A release only stops the player if
    /// it is still moving that way, so releasing Left after pressing Right
    /// does not cancel the newer key.
    pub fn handle_input(&mut self, event: KeyEvent) {
        match event.action {
            KeyAction::Press => self.body.set_direction(event.direction),
            KeyAction::Release => self.body.release(event.direction),
        }
    }

    /// Advance by `dt` milliseconds against `walls`
    pub fn update(&mut self, dt: f32, walls: &[CollisionRect]) {
        self.body.integrate(dt, walls);
    }
}

impl Embodied for Player {
    fn body(&self) -> &Moveable {
        &self.body
    }
}
