//! Simulation state and core entity types
//!
//! Entities are immutable values once built: a tick produces a new collection
//! holding fresh entities for the ones that changed and shared `Arc`s for the
//! rest.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::polar_to_cartesian;
use crate::settings::KindProfile;

/// Germ species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Flu,
    Covid,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Flu => "flu",
            Kind::Covid => "covid",
        }
    }
}

/// Polar velocity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Radians, 0 = +x, y down-positive
    pub angle: f32,
    /// Pixels per second
    pub speed: f32,
}

impl Velocity {
    pub fn new(angle: f32, speed: f32) -> Self {
        Self { angle, speed }
    }

    /// Cartesian velocity (pixels/s)
    #[inline]
    pub fn vector(&self) -> Vec2 {
        polar_to_cartesian(self.speed, self.angle)
    }

    /// Displacement covered in `dt` seconds
    #[inline]
    pub fn displacement(&self, dt: f32) -> Vec2 {
        self.vector() * dt
    }
}

/// A single germ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub position: Vec2,
    pub velocity: Velocity,
    pub kind: Kind,
    pub health: u32,
    pub points: u64,
    /// Seconds since spawn or last split
    pub age: f32,
    pub split_count: u32,
    pub visible: bool,
}

impl Entity {
    /// Fresh germ with the kind's default health and points
    pub fn new(id: u32, profile: &KindProfile, position: Vec2, velocity: Velocity) -> Self {
        Self {
            id,
            position,
            velocity,
            kind: profile.kind,
            health: profile.health,
            points: profile.points,
            age: 0.0,
            split_count: 0,
            visible: true,
        }
    }
}

/// Fire-and-forget notifications for audio and effects
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A click hurt a germ that survived it
    Damaged { id: u32, health: u32 },
    /// A click finished a germ off
    Eliminated { id: u32, kind: Kind, points: u64 },
    /// A germ reached its doubling time
    Split { parent: u32, child: u32 },
    /// No visible germ remains
    Cleared,
}

/// Complete simulation state (serializable)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationState {
    /// Germs in stable render order
    pub entities: Vec<Arc<Entity>>,
    pub score: u64,
    /// Ticks advanced so far
    pub tick: u64,
    /// Simulated seconds so far
    pub elapsed: f32,
    /// Pending notifications (not part of saved state)
    #[serde(skip)]
    pub events: Vec<SimEvent>,
    /// Set once `Cleared` has been emitted
    #[serde(default)]
    pub cleared_announced: bool,
    /// Next entity ID
    next_id: u32,
    /// Every `u32` ID has been handed out
    #[serde(default)]
    ids_exhausted: bool,
}

impl SimulationState {
    /// Wrap an existing collection; IDs continue after the largest one present
    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let next_id = match entities.iter().map(|e| e.id).max() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        };
        Self {
            entities: entities.into_iter().map(Arc::new).collect(),
            next_id: next_id.unwrap_or(0),
            ids_exhausted: next_id.is_none(),
            ..Default::default()
        }
    }

    /// Allocate a new entity ID; `None` once the ID space is used up
    pub fn next_entity_id(&mut self) -> Option<u32> {
        if self.ids_exhausted {
            return None;
        }
        let id = self.next_id.max(1);
        match id.checked_add(1) {
            Some(next) => self.next_id = next,
            None => self.ids_exhausted = true,
        }
        Some(id)
    }

    /// Number of germs still in play
    pub fn visible_count(&self) -> usize {
        self.entities.iter().filter(|e| e.visible).count()
    }

    /// Win predicate: nothing left to click
    pub fn is_cleared(&self) -> bool {
        self.visible_count() == 0
    }

    pub fn find(&self, id: u32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id).map(Arc::as_ref)
    }

    /// Emit `Cleared` the first time the arena empties
    pub(crate) fn announce_if_cleared(&mut self) {
        if !self.cleared_announced && self.is_cleared() {
            self.cleared_announced = true;
            self.events.push(SimEvent::Cleared);
            log::info!("Arena cleared at tick {} with score {}", self.tick, self.score);
        }
    }
}

/// What the renderer sees of one germ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: u32,
    pub position: Vec2,
    pub angle: f32,
    pub kind: Kind,
    pub visible: bool,
}

impl From<&Entity> for EntitySnapshot {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id,
            position: e.position,
            angle: e.velocity.angle,
            kind: e.kind,
            visible: e.visible,
        }
    }
}

/// Read-only frame handed to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub score: u64,
    pub cleared: bool,
    pub entities: Vec<EntitySnapshot>,
}

impl From<&SimulationState> for Snapshot {
    fn from(state: &SimulationState) -> Self {
        Self {
            tick: state.tick,
            score: state.score,
            cleared: state.is_cleared(),
            entities: state
                .entities
                .iter()
                .map(|e| EntitySnapshot::from(e.as_ref()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn germ(id: u32, visible: bool) -> Entity {
        let mut e = Entity::new(
            id,
            &KindProfile::new(Kind::Flu),
            Vec2::new(10.0, 10.0),
            Velocity::new(0.0, 100.0),
        );
        e.visible = visible;
        e
    }

    #[test]
    fn test_ids_continue_after_existing() {
        let mut state = SimulationState::with_entities(vec![germ(4, true), germ(9, true)]);
        assert_eq!(state.next_entity_id(), Some(10));
        assert_eq!(state.next_entity_id(), Some(11));

        let mut empty = SimulationState::default();
        assert_eq!(empty.next_entity_id(), Some(1));
    }

    #[test]
    fn test_id_space_runs_out_without_overflow() {
        let mut state = SimulationState::with_entities(vec![germ(u32::MAX, true)]);
        assert_eq!(state.next_entity_id(), None);

        let mut state = SimulationState::with_entities(vec![germ(u32::MAX - 1, true)]);
        assert_eq!(state.next_entity_id(), Some(u32::MAX));
        assert_eq!(state.next_entity_id(), None);
    }

    #[test]
    fn test_cleared_predicate() {
        assert!(SimulationState::default().is_cleared());

        let state = SimulationState::with_entities(vec![germ(1, false), germ(2, true)]);
        assert!(!state.is_cleared());
        assert_eq!(state.visible_count(), 1);

        let state = SimulationState::with_entities(vec![germ(1, false), germ(2, false)]);
        assert!(state.is_cleared());
    }

    #[test]
    fn test_cleared_announced_once() {
        let mut state = SimulationState::with_entities(vec![germ(1, false)]);
        state.announce_if_cleared();
        state.announce_if_cleared();
        assert_eq!(state.events, vec![SimEvent::Cleared]);
    }

    #[test]
    fn test_snapshot_keeps_order() {
        let state = SimulationState::with_entities(vec![germ(3, true), germ(1, false)]);
        let snap = Snapshot::from(&state);
        let ids: Vec<u32> = snap.entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(!snap.entities[1].visible);
        assert!(!snap.cleared);
    }

    #[test]
    fn test_state_serializes() {
        let state = SimulationState::with_entities(vec![germ(1, true)]);
        let json = serde_json::to_string(&state).unwrap();
        let back: SimulationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entities.len(), 1);
        assert_eq!(back.entities[0].id, 1);
    }
}
