//! Platform abstraction layer
//!
//! Handles host differences for:
//! - Frame timing (`time`)
//! - Raw input events (`input`)

pub mod input;
pub mod time;

pub use input::{Key, RawInput};
pub use time::FrameClock;
