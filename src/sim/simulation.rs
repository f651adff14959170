//! The simulation core: sole owner and writer of the germ collection

use std::collections::HashSet;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::error::SimError;
use super::hit::{HitReport, apply_hit};
use super::spawn::spawn_batch;
use super::state::{Entity, SimEvent, SimulationState, Snapshot};
use super::tick::{TickReport, tick};
use crate::settings::Settings;

/// A running arena
///
/// `advance` and `apply_hit` both take `&mut self`, so a click can never
/// observe a half-advanced frame.
#[derive(Debug, Clone)]
pub struct Simulation<R = Pcg32> {
    settings: Settings,
    state: SimulationState,
    rng: R,
}

impl Simulation<Pcg32> {
    /// Validate settings and spawn the initial batch from `settings.seed`
    pub fn new(settings: Settings) -> Result<Self, SimError> {
        let rng = Pcg32::seed_from_u64(settings.seed);
        Self::with_rng(settings, rng)
    }
}

impl<R: Rng> Simulation<R> {
    /// Same as `new` with a caller-supplied random source
    pub fn with_rng(settings: Settings, mut rng: R) -> Result<Self, SimError> {
        settings.validate()?;
        let state = spawn_batch(&settings, &mut rng)?;
        log::info!(
            "Simulation started: {} germs in a {}x{} arena",
            state.entities.len(),
            settings.width,
            settings.height
        );
        Ok(Self { settings, state, rng })
    }

    /// Start from a hand-built collection instead of a random batch
    pub fn from_entities(settings: Settings, entities: Vec<Entity>, rng: R) -> Result<Self, SimError> {
        settings.validate()?;
        if let Some(e) = entities.iter().find(|e| settings.profile(e.kind).is_none()) {
            return Err(SimError::InvalidConfig(format!(
                "germ {} has kind {} missing from the kind table",
                e.id,
                e.kind.as_str()
            )));
        }
        if let Some(e) = entities.iter().find(|e| {
            let v = e.velocity;
            !(v.speed.is_finite() && v.speed >= 0.0 && v.angle.is_finite())
        }) {
            return Err(SimError::InvalidConfig(format!(
                "germ {} has an invalid velocity",
                e.id
            )));
        }
        if let Some(e) = entities.iter().find(|e| !e.position.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "germ {} has a non-finite position",
                e.id
            )));
        }
        let mut ids = HashSet::with_capacity(entities.len());
        if let Some(e) = entities.iter().find(|e| !ids.insert(e.id)) {
            return Err(SimError::InvalidConfig(format!("germ id {} is used twice", e.id)));
        }
        Ok(Self {
            settings,
            state: SimulationState::with_entities(entities),
            rng,
        })
    }

    /// Advance by `dt` seconds; malformed ticks are logged and ignored
    pub fn advance(&mut self, dt: f32) -> Result<TickReport, SimError> {
        let report = tick(&mut self.state, &self.settings, &mut self.rng, dt)?;
        self.state.announce_if_cleared();
        Ok(report)
    }

    /// Apply a click at `point` (arena-local pixels)
    pub fn apply_hit(&mut self, point: Vec2) -> HitReport {
        apply_hit(&mut self.state, &self.settings, point)
    }

    /// Win predicate: no visible germ left
    pub fn is_cleared(&self) -> bool {
        self.state.is_cleared()
    }

    pub fn score(&self) -> u64 {
        self.state.score
    }

    /// Owned copy for the renderer
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from(&self.state)
    }

    /// Read-only view of the authoritative state
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Hand pending events to audio/effects
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.state.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{KindProfile, RulePreset};
    use crate::sim::{Kind, Velocity};

    fn germ(id: u32, x: f32, y: f32) -> Entity {
        Entity::new(
            id,
            &KindProfile::new(Kind::Flu).with_points(10),
            Vec2::new(x, y),
            Velocity::new(0.0, 60.0),
        )
    }

    #[test]
    fn test_new_spawns_configured_count() {
        let settings = Settings {
            entity_count: 7,
            seed: 1234,
            ..Settings::default()
        };
        let sim = Simulation::new(settings).unwrap();
        assert_eq!(sim.state().entities.len(), 7);
        assert!(!sim.is_cleared());
        assert_eq!(sim.score(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = Settings {
            width: -1.0,
            ..Settings::default()
        };
        assert!(matches!(Simulation::new(settings), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_entities_rejects_unknown_kind() {
        let mut settings = Settings::default();
        settings.kinds.retain(|k| k.kind == Kind::Covid);
        let result = Simulation::from_entities(settings, vec![germ(1, 0.0, 0.0)], Pcg32::seed_from_u64(0));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_entities_rejects_duplicate_ids() {
        let result = Simulation::from_entities(
            Settings::from_preset(RulePreset::Drift),
            vec![germ(5, 0.0, 0.0), germ(5, 50.0, 50.0)],
            Pcg32::seed_from_u64(0),
        );
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_entities_rejects_infinite_speed() {
        let mut fast = germ(1, 100.0, 100.0);
        fast.velocity = Velocity::new(std::f32::consts::FRAC_PI_2, f32::INFINITY);
        let result = Simulation::from_entities(
            Settings::from_preset(RulePreset::Drift),
            vec![fast],
            Pcg32::seed_from_u64(0),
        );
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_id_germ_cannot_split() {
        let mut settings = Settings::from_preset(RulePreset::Drift);
        settings.kinds[0] = KindProfile::new(Kind::Flu).with_doubling_time(0.5);
        let mut sim = Simulation::from_entities(
            settings,
            vec![germ(u32::MAX, 100.0, 100.0)],
            Pcg32::seed_from_u64(0),
        )
        .unwrap();

        let report = sim.advance(1.0).unwrap();

        assert_eq!(report.splits, 0);
        assert_eq!(sim.state().entities.len(), 1);
        assert_eq!(sim.state().entities[0].split_count, 0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let settings = Settings {
            seed: 99999,
            ..Settings::from_preset(RulePreset::Outbreak)
        };
        let mut a = Simulation::new(settings.clone()).unwrap();
        let mut b = Simulation::new(settings).unwrap();

        for _ in 0..600 {
            a.advance(1.0 / 60.0).unwrap();
            b.advance(1.0 / 60.0).unwrap();
        }
        a.apply_hit(Vec2::new(300.0, 300.0));
        b.apply_hit(Vec2::new(300.0, 300.0));

        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_malformed_advance_leaves_state() {
        let mut sim = Simulation::new(Settings::default()).unwrap();
        let before = sim.snapshot();
        assert!(sim.advance(0.0).is_err());
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn test_clear_is_permanent() {
        let settings = Settings::from_preset(RulePreset::Outbreak);
        let mut sim = Simulation::from_entities(
            settings,
            vec![germ(1, 100.0, 100.0), germ(2, 110.0, 100.0)],
            Pcg32::seed_from_u64(3),
        )
        .unwrap();

        let report = sim.apply_hit(Vec2::new(105.0, 100.0));
        assert_eq!(report.eliminated, 2);
        assert!(sim.is_cleared());
        assert_eq!(sim.state().entities.len(), 2);

        // Long enough for every doubling time to pass many times over
        for _ in 0..1200 {
            sim.advance(1.0 / 30.0).unwrap();
            assert!(sim.is_cleared());
        }
        assert_eq!(sim.state().entities.len(), 2);

        let cleared = sim
            .drain_events()
            .into_iter()
            .filter(|e| *e == SimEvent::Cleared)
            .count();
        assert_eq!(cleared, 1);
        assert!(sim.drain_events().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut sim = Simulation::from_entities(
            Settings::from_preset(RulePreset::Drift),
            vec![germ(1, 100.0, 100.0)],
            Pcg32::seed_from_u64(0),
        )
        .unwrap();
        let frame = sim.snapshot();
        sim.advance(0.5).unwrap();

        assert_eq!(frame.entities[0].position, Vec2::new(100.0, 100.0));
        assert!((sim.snapshot().entities[0].position.x - 130.0).abs() < 1e-3);
    }
}
