//! Directional key events
//!
//! The game only reacts to four directional keys. Window events are reduced
//! to [`KeyEvent`]s here so the player logic never sees the windowing library.

use crate::moveable::Direction;

/// Whether a key went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Key pressed
    Press,
    /// Key released
    Release,
}

/// A press or release of a directional key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Direction the key stands for
    pub direction: Direction,
    /// Press or release
    pub action: KeyAction,
}

impl KeyEvent {
    /// Key-down event
    pub fn press(direction: Direction) -> Self {
        Self { direction, action: KeyAction::Press }
    }

    /// Key-up event
    pub fn release(direction: Direction) -> Self {
        Self { direction, action: KeyAction::Release }
    }
}

/// Direction bound to a GLFW key: WASD and the arrow keys
#[cfg(feature = "window")]
pub fn direction_for_key(key: glfw::Key) -> Option<Direction> {
    use glfw::Key;

    match key {
        Key::W | Key::Up => Some(Direction::Up),
        Key::S | Key::Down => Some(Direction::Down),
        Key::A | Key::Left => Some(Direction::Left),
        Key::D | Key::Right => Some(Direction::Right),
        _ => None,
    }
}

/// Translate a GLFW key event; repeats and unbound keys yield `None`
#[cfg(feature = "window")]
pub fn key_event(key: glfw::Key, action: glfw::Action) -> Option<KeyEvent> {
    let direction = direction_for_key(key)?;
    match action {
        glfw::Action::Press => Some(KeyEvent::press(direction)),
        glfw::Action::Release => Some(KeyEvent::release(direction)),
        glfw::Action::Repeat => None,
    }
}
