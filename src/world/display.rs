//! Render-only projection of the world

use std::collections::BTreeMap;

use glam::{DQuat, DVec3};

use super::Entity;

/// Translation and rotation of one entity as shown to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerDisplay {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl PlayerDisplay {
    /// Linear translation, shortest-arc rotation.
    pub fn interpolate(&self, next: &Self, t: f64) -> Self {
        Self {
            translation: self.translation.lerp(next.translation, t),
            rotation: self.rotation.slerp(next.rotation, t),
        }
    }
}

/// Display values for every entity, copied out of the world each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    players: BTreeMap<Entity, PlayerDisplay>,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity, display: PlayerDisplay) {
        self.players.insert(entity, display);
    }

    pub fn get(&self, entity: Entity) -> Option<&PlayerDisplay> {
        self.players.get(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &PlayerDisplay)> {
        self.players.iter().map(|(entity, display)| (*entity, display))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Blend two states. `t` is clamped to `[0, 1]`; entities that only
    /// exist in `next` are taken as-is, entities missing from `next` are
    /// dropped.
    pub fn interpolate(prev: &Self, next: &Self, t: f64) -> Self {
        let t = if t.is_nan() { 1.0 } else { t.clamp(0.0, 1.0) };
        let players = next
            .players
            .iter()
            .map(|(entity, to)| {
                let display = match prev.players.get(entity) {
                    Some(from) => from.interpolate(to, t),
                    None => *to,
                };
                (*entity, display)
            })
            .collect();
        Self { players }
    }
}
