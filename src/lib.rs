//! Germ Swat - a click-to-swat germ arena
//!
//! Core modules:
//! - `sim`: Simulation core (entity model, per-frame update, hit-testing)
//! - `platform`: Frame clock and browser host bindings
//! - `settings`: Rule presets and arena/kind configuration

pub mod platform;
pub mod settings;
pub mod sim;

pub use settings::{
    BoundaryPolicy, HitBoundary, HitPolicy, KindProfile, RulePreset, Settings, SpeedRange,
};
pub use sim::{SimError, Simulation};

use glam::Vec2;

/// Default configuration constants
pub mod consts {
    /// Arena dimensions (pixels)
    pub const ARENA_WIDTH: f32 = 1024.0;
    pub const ARENA_HEIGHT: f32 = 576.0;

    /// Germs spawned at simulation start
    pub const INITIAL_ENTITY_COUNT: usize = 10;
    /// Sprite extent used by the reflective boundary
    pub const ENTITY_DIAMETER: f32 = 40.0;

    /// Click interaction radius (pixels)
    pub const HIT_RADIUS: f32 = 20.0;
    /// Health removed by one click
    pub const HIT_DAMAGE: u32 = 1;

    /// Speed range for freshly spawned germs (pixels/s)
    pub const MIN_SPEED: f32 = 50.0;
    pub const MAX_SPEED: f32 = 250.0;

    /// Speed added to every surviving germ after a successful click (Outbreak)
    pub const SPEED_RAMP: f32 = 15.0;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}
