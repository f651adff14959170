//! Click hit-testing and interaction effects
//!
//! A click matches every visible germ whose center lies within the hit radius
//! of the click point. What happens to matched germs depends on the hit
//! policy.

use std::sync::Arc;

use glam::Vec2;

use super::state::{Entity, SimEvent, SimulationState};
use crate::settings::{HitBoundary, HitPolicy, Settings};

/// Result of partitioning a collection around a click
#[derive(Debug, Clone, Default)]
pub struct HitPartition {
    /// Visible germs within the radius, in collection order
    pub matched: Vec<Arc<Entity>>,
    /// Everything else, hidden germs included
    pub rest: Vec<Arc<Entity>>,
}

/// Outcome of a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitReport {
    /// Germs within reach of the click
    pub matched: usize,
    /// Matched germs whose health ran out
    pub eliminated: usize,
    /// Score awarded by this click
    pub points: u64,
}

/// Whether `point` is close enough to `center`
#[inline]
pub fn within_radius(point: Vec2, center: Vec2, radius: f32, boundary: HitBoundary) -> bool {
    boundary.accepts(point.distance(center), radius)
}

/// Which germs a click at `point` reaches: one flag per entity, hidden germs never
pub fn hit_mask(
    point: Vec2,
    entities: &[Arc<Entity>],
    radius: f32,
    boundary: HitBoundary,
) -> Vec<bool> {
    entities
        .iter()
        .map(|e| e.visible && within_radius(point, e.position, radius, boundary))
        .collect()
}

/// Split `entities` into germs hit by a click at `point` and the rest
pub fn hit_test(
    point: Vec2,
    entities: &[Arc<Entity>],
    radius: f32,
    boundary: HitBoundary,
) -> HitPartition {
    let mask = hit_mask(point, entities, radius, boundary);
    let mut partition = HitPartition::default();
    for (entity, hit) in entities.iter().zip(mask) {
        if hit {
            partition.matched.push(Arc::clone(entity));
        } else {
            partition.rest.push(Arc::clone(entity));
        }
    }
    partition
}

/// Apply a click at `point` (arena-local pixels) to the simulation state
///
/// Matched germs take `hit_damage`. Germs that run out of health are removed
/// or hidden according to the hit policy and award their points. Under
/// `MarkHidden`, any match speeds up every visible germ the click missed.
pub fn apply_hit(state: &mut SimulationState, settings: &Settings, point: Vec2) -> HitReport {
    let mut report = HitReport::default();
    if !point.is_finite() {
        log::debug!("Ignoring non-finite click at {point}");
        return report;
    }

    let mask = hit_mask(point, &state.entities, settings.hit_radius, settings.hit_boundary);
    let current = std::mem::take(&mut state.entities);
    let mut next = Vec::with_capacity(current.len());
    let mut missed = Vec::new();

    // Hit pass
    for (entity, hit) in current.into_iter().zip(mask) {
        if !hit {
            missed.push(next.len());
            next.push(entity);
            continue;
        }

        report.matched += 1;
        let health = entity.health.saturating_sub(settings.hit_damage);

        if health > 0 {
            state.events.push(SimEvent::Damaged { id: entity.id, health });
            next.push(Arc::new(Entity {
                health,
                ..entity.as_ref().clone()
            }));
            continue;
        }

        report.eliminated += 1;
        report.points += entity.points;
        state.events.push(SimEvent::Eliminated {
            id: entity.id,
            kind: entity.kind,
            points: entity.points,
        });

        match settings.hit_policy {
            HitPolicy::RemoveOnHit => {}
            HitPolicy::MarkHidden { .. } => next.push(Arc::new(Entity {
                health,
                visible: false,
                ..entity.as_ref().clone()
            })),
        }
    }

    // Difficulty ramp: a single pass over the survivors the click missed
    if let HitPolicy::MarkHidden { speed_increment } = settings.hit_policy {
        if report.matched > 0 && speed_increment > 0.0 {
            for idx in missed {
                if next[idx].visible {
                    let mut faster = next[idx].as_ref().clone();
                    faster.velocity.speed += speed_increment;
                    next[idx] = Arc::new(faster);
                }
            }
        }
    }

    state.entities = next;
    state.score += report.points;

    if report.matched > 0 {
        log::debug!(
            "Click at ({:.1}, {:.1}): matched={} eliminated={} +{} (score {})",
            point.x,
            point.y,
            report.matched,
            report.eliminated,
            report.points,
            state.score
        );
    }
    state.announce_if_cleared();

    report
}
