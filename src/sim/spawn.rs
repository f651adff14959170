//! Randomized germ creation
//!
//! Every function takes the random source as a parameter so callers can pin
//! it with a seeded generator.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::error::SimError;
use super::state::{Entity, SimulationState, Velocity};
use crate::settings::{KindProfile, Settings, SpeedRange};

/// Pick a kind profile according to the table's weights
pub fn choose_kind<'a, R: Rng + ?Sized>(
    kinds: &'a [KindProfile],
    rng: &mut R,
) -> Result<&'a KindProfile, SimError> {
    let weights = WeightedIndex::new(kinds.iter().map(|k| k.weight))
        .map_err(|e| SimError::InvalidConfig(format!("kind weights: {e}")))?;
    Ok(&kinds[weights.sample(rng)])
}

/// Heading in [0, 2π)
pub fn random_angle<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random_range(0.0..TAU)
}

pub fn random_speed<R: Rng + ?Sized>(range: SpeedRange, rng: &mut R) -> f32 {
    rng.random_range(range.min..=range.max)
}

/// Whole number in `[min, max]`, or any value there if the range holds no integer
pub fn random_whole<R: Rng + ?Sized>(min: f32, max: f32, rng: &mut R) -> f32 {
    let (lo, hi) = (min.ceil(), max.floor());
    if lo <= hi {
        rng.random_range(lo as i64..=hi as i64) as f32
    } else {
        rng.random_range(min.min(max)..=max)
    }
}

/// Uniform point inside the spawn area (top-left corner may not leave the arena)
pub fn random_position<R: Rng + ?Sized>(settings: &Settings, rng: &mut R) -> Vec2 {
    let (max_x, max_y) = settings.max_position();
    let (max_x, max_y) = (max_x.max(0.0), max_y.max(0.0));
    if settings.whole_pixel_spawn {
        return Vec2::new(random_whole(1.0, max_x, rng), random_whole(1.0, max_y, rng));
    }
    Vec2::new(rng.random_range(0.0..=max_x), rng.random_range(0.0..=max_y))
}

/// Spawn one germ with a fresh ID
pub fn spawn_entity<R: Rng + ?Sized>(
    state: &mut SimulationState,
    settings: &Settings,
    rng: &mut R,
) -> Result<Entity, SimError> {
    let profile = choose_kind(&settings.kinds, rng)?;
    let position = random_position(settings, rng);
    let angle = random_angle(rng);
    let range = profile.speed_range;
    let speed = if settings.whole_pixel_spawn {
        random_whole(range.min, range.max, rng)
    } else {
        random_speed(range, rng)
    };
    let velocity = Velocity::new(angle, speed);
    let id = state
        .next_entity_id()
        .ok_or_else(|| SimError::InvalidConfig("entity ids exhausted".into()))?;
    Ok(Entity::new(id, profile, position, velocity))
}

/// Initial batch: `settings.entity_count` germs
pub fn spawn_batch<R: Rng + ?Sized>(
    settings: &Settings,
    rng: &mut R,
) -> Result<SimulationState, SimError> {
    let mut state = SimulationState::default();
    let mut entities = Vec::with_capacity(settings.entity_count);
    for _ in 0..settings.entity_count {
        entities.push(spawn_entity(&mut state, settings, rng)?);
    }
    state.entities = entities.into_iter().map(Into::into).collect();
    log::debug!("Spawned {} germs", state.entities.len());
    Ok(state)
}
