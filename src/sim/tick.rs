//! Variable timestep simulation tick
//!
//! Advances every visible germ by `dt` seconds: kinematic integration,
//! boundary policy, aging and splitting. Builds a new collection each tick.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::Vec2;
use rand::Rng;

use super::error::SimError;
use super::spawn::random_angle;
use super::state::{Entity, SimEvent, SimulationState, Velocity};
use crate::settings::{BoundaryPolicy, Settings};

/// What a tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Germs integrated this tick
    pub moved: usize,
    /// Children born this tick
    pub splits: usize,
}

/// True if a germ's top-left corner lies outside the reflective bounds
#[inline]
pub fn out_of_bounds(position: Vec2, settings: &Settings) -> bool {
    let (max_x, max_y) = settings.max_position();
    position.x < 0.0 || position.x > max_x || position.y < 0.0 || position.y > max_y
}

/// Move, bounce and age a single germ
pub fn integrate(entity: &Entity, dt: f32, settings: &Settings) -> Entity {
    let mut next = entity.clone();
    next.position = entity.position + entity.velocity.displacement(dt);

    // Simplified bounce: a quarter turn clockwise whichever edge was crossed
    if settings.boundary == BoundaryPolicy::Reflective && out_of_bounds(next.position, settings) {
        next.velocity.angle -= FRAC_PI_2;
    }

    next.age = entity.age + dt;
    next
}

/// Advance the simulation by `dt` seconds
///
/// Rejects (and leaves `state` untouched for) any `dt` that is not a finite
/// positive number.
pub fn tick<R: Rng + ?Sized>(
    state: &mut SimulationState,
    settings: &Settings,
    rng: &mut R,
    dt: f32,
) -> Result<TickReport, SimError> {
    if !(dt.is_finite() && dt > 0.0) {
        log::warn!("Dropping malformed tick (dt = {dt})");
        return Err(SimError::MalformedTick { dt });
    }

    let current = std::mem::take(&mut state.entities);
    let mut next = Vec::with_capacity(current.len());
    let mut report = TickReport::default();

    for entity in current {
        // Hidden germs are out of play: no movement, no aging, no splitting
        if !entity.visible {
            next.push(entity);
            continue;
        }

        let mut moved = integrate(&entity, dt, settings);
        report.moved += 1;

        let mut child = None;
        if let Some(profile) = settings.profile(entity.kind) {
            if let Some(doubling_time) = profile.doubling_time_secs {
                if moved.age >= doubling_time {
                    let Some(child_id) = state.next_entity_id() else {
                        log::warn!("Entity ids exhausted, germ {} cannot split", entity.id);
                        next.push(Arc::new(moved));
                        continue;
                    };
                    moved.age = 0.0;
                    moved.split_count += 1;

                    let velocity = Velocity::new(random_angle(rng), entity.velocity.speed);
                    let born = Entity::new(child_id, profile, entity.position, velocity);
                    log::debug!(
                        "{} germ {} split (#{}) -> {}",
                        entity.kind.as_str(),
                        entity.id,
                        moved.split_count,
                        born.id
                    );
                    state.events.push(SimEvent::Split {
                        parent: entity.id,
                        child: born.id,
                    });
                    report.splits += 1;
                    child = Some(born);
                }
            }
        }

        next.push(Arc::new(moved));
        if let Some(child) = child {
            next.push(Arc::new(child));
        }
    }

    state.entities = next;
    state.tick += 1;
    state.elapsed += dt;

    log::trace!(
        "tick {}: dt={dt:.4} moved={} splits={}",
        state.tick,
        report.moved,
        report.splits
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{KindProfile, RulePreset};
    use crate::sim::Kind;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::f32::consts::PI;

    fn germ(id: u32, x: f32, y: f32, angle: f32, speed: f32) -> Entity {
        Entity::new(
            id,
            &KindProfile::new(Kind::Flu),
            Vec2::new(x, y),
            Velocity::new(angle, speed),
        )
    }

    fn drift_settings() -> Settings {
        Settings::from_preset(RulePreset::Drift)
    }

    #[test]
    fn test_tick_moves_along_heading() {
        let settings = drift_settings();
        let mut state = SimulationState::with_entities(vec![germ(1, 100.0, 100.0, PI / 2.0, 200.0)]);
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 0.5).unwrap();

        let e = &state.entities[0];
        assert!((e.position.x - 100.0).abs() < 1e-3);
        // y is down-positive
        assert!((e.position.y - 200.0).abs() < 1e-3);
        assert!((e.age - 0.5).abs() < 1e-6);
        assert_eq!(state.tick, 1);
    }

    #[test]
    fn test_unbounded_leaves_arena() {
        let settings = drift_settings();
        let mut state =
            SimulationState::with_entities(vec![germ(1, settings.width - 1.0, 10.0, 0.0, 100.0)]);
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 1.0).unwrap();

        let e = &state.entities[0];
        assert!(e.position.x > settings.width);
        assert_eq!(e.velocity.angle, 0.0);
    }

    #[test]
    fn test_reflective_turns_quarter() {
        let settings = Settings::from_preset(RulePreset::Swat);
        let x = settings.width - settings.entity_diameter + 1.0;
        let before = germ(1, x, 100.0, 0.0, 100.0);
        let mut state = SimulationState::with_entities(vec![before.clone()]);
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 0.1).unwrap();

        let after = &state.entities[0];
        assert_eq!(after.velocity.angle, before.velocity.angle - FRAC_PI_2);
        assert_eq!(after.velocity.speed, before.velocity.speed);
        assert!((after.position.x - (x + 10.0)).abs() < 1e-3);

        // Nothing else changed
        let expected = Entity {
            position: after.position,
            velocity: Velocity::new(after.velocity.angle, before.velocity.speed),
            age: after.age,
            ..before
        };
        assert_eq!(after.as_ref(), &expected);
    }

    #[test]
    fn test_reflective_applies_on_any_axis() {
        let settings = Settings::from_preset(RulePreset::Swat);
        // Heading up through the top edge
        let mut state = SimulationState::with_entities(vec![germ(1, 100.0, 1.0, -PI / 2.0, 100.0)]);
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 0.1).unwrap();

        assert_eq!(state.entities[0].velocity.angle, -PI / 2.0 - FRAC_PI_2);
    }

    #[test]
    fn test_reflective_inside_keeps_heading() {
        let settings = Settings::from_preset(RulePreset::Swat);
        let mut state = SimulationState::with_entities(vec![germ(1, 100.0, 100.0, 0.3, 100.0)]);
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 0.1).unwrap();

        assert_eq!(state.entities[0].velocity.angle, 0.3);
    }

    #[test]
    fn test_malformed_dt_is_noop() {
        let settings = drift_settings();
        let mut state = SimulationState::with_entities(vec![germ(1, 100.0, 100.0, 0.0, 100.0)]);
        let mut rng = Pcg32::seed_from_u64(1);

        for dt in [0.0, -0.016, f32::NAN, f32::INFINITY] {
            let result = tick(&mut state, &settings, &mut rng, dt);
            assert!(matches!(result, Err(SimError::MalformedTick { .. })));
        }

        assert_eq!(state.tick, 0);
        assert_eq!(state.entities[0].position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn test_split_at_doubling_time() {
        let doubling = 2.0;
        let eps = 0.25;
        let mut settings = drift_settings();
        settings.kinds[0] = KindProfile::new(Kind::Flu).with_points(10).with_doubling_time(doubling);

        let mut parent = germ(1, 300.0, 200.0, 0.0, 80.0);
        parent.age = doubling - eps;
        let mut state = SimulationState::with_entities(vec![parent, germ(2, 50.0, 50.0, 0.0, 10.0)]);
        let mut rng = Pcg32::seed_from_u64(9);

        let report = tick(&mut state, &settings, &mut rng, 2.0 * eps).unwrap();

        assert_eq!(report.splits, 1);
        assert_eq!(state.entities.len(), 3);

        let parent = &state.entities[0];
        assert_eq!(parent.id, 1);
        assert_eq!(parent.age, 0.0);
        assert_eq!(parent.split_count, 1);

        // Child sits right after its parent, at the parent's pre-tick position
        let child = &state.entities[1];
        assert_eq!(child.id, 3);
        assert_eq!(child.position, Vec2::new(300.0, 200.0));
        assert_eq!(child.kind, Kind::Flu);
        assert_eq!(child.velocity.speed, 80.0);
        assert_eq!(child.age, 0.0);
        assert_eq!(child.split_count, 0);
        assert!(child.velocity.angle.is_finite());

        assert_eq!(state.entities[2].id, 2);
        assert_eq!(state.events, vec![SimEvent::Split { parent: 1, child: 3 }]);
    }

    #[test]
    fn test_no_split_without_doubling_time() {
        let settings = drift_settings();
        let mut parent = germ(1, 300.0, 200.0, 0.0, 80.0);
        parent.age = 1_000.0;
        let mut state = SimulationState::with_entities(vec![parent]);
        let mut rng = Pcg32::seed_from_u64(9);

        tick(&mut state, &settings, &mut rng, 1.0).unwrap();

        assert_eq!(state.entities.len(), 1);
        assert_eq!(state.entities[0].split_count, 0);
    }

    #[test]
    fn test_hidden_germs_are_shared_and_frozen() {
        let mut settings = drift_settings();
        settings.kinds[0] = KindProfile::new(Kind::Flu).with_doubling_time(0.1);

        let mut hidden = germ(1, 10.0, 10.0, 0.0, 100.0);
        hidden.visible = false;
        hidden.age = 50.0;
        let mut state = SimulationState::with_entities(vec![hidden, germ(2, 20.0, 20.0, 0.0, 100.0)]);
        let before: Vec<_> = state.entities.clone();
        let mut rng = Pcg32::seed_from_u64(1);

        tick(&mut state, &settings, &mut rng, 0.05).unwrap();

        assert!(Arc::ptr_eq(&before[0], &state.entities[0]));
        assert!(!Arc::ptr_eq(&before[1], &state.entities[1]));
        assert_eq!(state.entities.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_displacement_law(
            x in 0.0f32..1000.0,
            y in 0.0f32..600.0,
            angle in 0.0f32..std::f32::consts::TAU,
            speed in 0.0f32..500.0,
            dt in 0.0001f32..0.25,
        ) {
            let settings = drift_settings();
            let mut state = SimulationState::with_entities(vec![germ(1, x, y, angle, speed)]);
            let mut rng = Pcg32::seed_from_u64(0);

            tick(&mut state, &settings, &mut rng, dt).unwrap();

            let e = &state.entities[0];
            let expected_x = x + speed * angle.cos() * dt;
            let expected_y = y + speed * angle.sin() * dt;
            prop_assert!((e.position.x - expected_x).abs() < 1e-3);
            prop_assert!((e.position.y - expected_y).abs() < 1e-3);
            prop_assert_eq!(e.velocity.angle, angle);
            prop_assert_eq!(e.velocity.speed, speed);
        }
    }
}
