//! Simulation core
//!
//! All gameplay logic lives here. This module must stay free of rendering and
//! platform dependencies:
//! - Seeded RNG only
//! - Stable iteration order (spawn order, children after their parent)
//! - Every tick and every click runs to completion before the next one

pub mod error;
pub mod hit;
pub mod simulation;
pub mod spawn;
pub mod state;
pub mod tick;

pub use error::SimError;
pub use hit::{HitPartition, HitReport, apply_hit, hit_mask, hit_test, within_radius};
pub use simulation::Simulation;
pub use spawn::{choose_kind, spawn_batch};
pub use state::{Entity, EntitySnapshot, Kind, SimEvent, SimulationState, Snapshot, Velocity};
pub use tick::{TickReport, integrate, tick};
