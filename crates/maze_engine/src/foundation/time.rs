//! Frame timing
//!
//! Entities integrate in milliseconds, so [`Timer::delta_millis`] is the value
//! the game loop feeds into simulation.

use std::time::{Duration, Instant};

/// Wall-clock frame timer, advanced once per frame
#[derive(Debug, Clone)]
pub struct Timer {
    started: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Timer starting now with a zero delta
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Mark the start of a new frame
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Length of the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Length of the last frame in milliseconds
    pub fn delta_millis(&self) -> f32 {
        self.delta.as_secs_f32() * 1000.0
    }

    /// Frames marked so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second averaged over the timer's lifetime
    pub fn average_fps(&self) -> f32 {
        let elapsed = self.last_frame.duration_since(self.started).as_secs_f32();
        if elapsed > 0.0 {
            self.frame_count as f32 / elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = Timer::new();
        timer.update();
        timer.update();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.delta_time() >= 0.0);
        assert!((timer.delta_millis() - timer.delta_time() * 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_new_timer_has_no_history() {
        let timer = Timer::new();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.delta_millis(), 0.0);
        assert_eq!(timer.average_fps(), 0.0);
    }
}
