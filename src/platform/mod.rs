//! Platform layer
//!
//! Handles browser/native differences for:
//! - Frame timing (`requestAnimationFrame` on web, manual stepping natively)
//! - Pointer input (client coordinates → arena-local pixels)

pub mod clock;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use clock::{FrameClock, FrameScheduler, ManualScheduler, Ticker};
