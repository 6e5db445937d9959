//! Math aliases, frame timing and logging setup shared by the engine and games

pub mod logging;
pub mod math;
pub mod time;
