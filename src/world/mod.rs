//! World model: player entities and the kinematic step
//!
//! Player components live in dense columns indexed by the entity slot. The
//! step visits slots in ascending order and never reorders floating point
//! work, so two worlds holding the same state step to the same state.

pub mod arena;
pub mod display;
pub mod entity;
pub mod player;

pub use display::{DisplayState, PlayerDisplay};
pub use entity::{Entity, EntityArena};
pub use player::{Intent, PlayerState};

use std::collections::BTreeSet;

use glam::DVec3;
use tracing::{debug, warn};

use crate::error::{NetError, NetResult};
use crate::physics::{BodyHandle, CollisionGroups, CollisionWorld, Physics};
use crate::protocol::{Command, Snapshot, Timestamp};

use self::player::{
    GRAVITY_PER_TICK, GROUND_DAMPING, GROUND_PROBE, JUMP_IMPULSE, PLAYER_HEIGHT, PLAYER_RADIUS,
    PLAYER_SHAPE, WALK_ACCELERATION, WALL_NORMAL_THRESHOLD, WALL_PROBE,
};

pub const DEFAULT_TIMESTEP: f64 = 1.0 / 60.0;

/// Per-slot component columns. A slot holds a body iff it is live.
#[derive(Debug, Clone, Default)]
struct Columns {
    body: Vec<Option<BodyHandle>>,
    input: Vec<u8>,
    force: Vec<DVec3>,
    grounded: Vec<bool>,
}

impl Columns {
    fn ensure(&mut self, slot: usize) {
        if slot >= self.body.len() {
            let len = slot + 1;
            self.body.resize(len, None);
            self.input.resize(len, 0);
            self.force.resize(len, DVec3::ZERO);
            self.grounded.resize(len, false);
        }
    }

    fn reset(&mut self, slot: usize, body: Option<BodyHandle>) {
        self.ensure(slot);
        self.body[slot] = body;
        self.input[slot] = 0;
        self.force[slot] = DVec3::ZERO;
        self.grounded[slot] = false;
    }
}

pub struct World<P: Physics = CollisionWorld> {
    physics: P,
    arena: EntityArena,
    columns: Columns,
    timestep: f64,
}

impl World<CollisionWorld> {
    /// Empty world on the default level.
    pub fn with_default_level() -> Self {
        Self::new(arena::default_level())
    }
}

impl<P: Physics> World<P> {
    pub fn new(physics: P) -> Self {
        Self {
            physics,
            arena: EntityArena::new(),
            columns: Columns::default(),
            timestep: DEFAULT_TIMESTEP,
        }
    }

    #[must_use]
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.arena.contains(entity)
    }

    /// Live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.arena.iter()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Spawn a player body at `translation`. `None` when every slot is taken.
    pub fn spawn_player(&mut self, translation: DVec3) -> Option<Entity> {
        let entity = self.arena.allocate()?;
        self.attach_body(entity, translation);
        debug!(entity = ?entity, x = translation.x, y = translation.y, z = translation.z, "Spawned player");
        Some(entity)
    }

    /// Spawn a player under a handle chosen by a remote authority.
    pub fn spawn_at(&mut self, entity: Entity, translation: DVec3) -> bool {
        if !self.arena.claim(entity) {
            return false;
        }
        self.attach_body(entity, translation);
        true
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.arena.release(entity) {
            return false;
        }
        let slot = entity.index();
        if let Some(body) = self.columns.body[slot].take() {
            self.physics.remove_body(body);
        }
        self.columns.reset(slot, None);
        debug!(entity = ?entity, "Despawned player");
        true
    }

    fn attach_body(&mut self, entity: Entity, translation: DVec3) {
        let body = self
            .physics
            .create_kinematic_body(translation, PLAYER_SHAPE, CollisionGroups::ACTOR);
        self.columns.reset(entity.index(), Some(body));
    }

    fn body(&self, entity: Entity) -> Option<BodyHandle> {
        if !self.arena.contains(entity) {
            return None;
        }
        self.columns.body.get(entity.index()).copied().flatten()
    }

    pub fn player(&self, entity: Entity) -> Option<PlayerState> {
        let body = self.body(entity)?;
        let slot = entity.index();
        Some(PlayerState {
            translation: self.physics.translation(body),
            rotation: self.physics.rotation(body),
            input: self.columns.input[slot],
            force: self.columns.force[slot],
            grounded: self.columns.grounded[slot],
        })
    }

    /// Overwrite one player's state.
    pub fn set_player(&mut self, entity: Entity, state: PlayerState) -> NetResult<()> {
        let body = self.body(entity).ok_or(NetError::UnknownEntity(entity))?;
        let slot = entity.index();
        self.physics.set_translation(body, state.translation);
        self.physics.set_rotation(body, state.rotation);
        self.columns.input[slot] = state.input & Intent::MASK;
        self.columns.force[slot] = state.force;
        self.columns.grounded[slot] = state.grounded;
        Ok(())
    }

    /// Apply an input edge: `input = (input | on) & !off`.
    pub fn apply_command(&mut self, command: &Command) -> NetResult<()> {
        if !self.arena.contains(command.entity) {
            return Err(NetError::UnknownEntity(command.entity));
        }
        let slot = command.entity.index();
        self.columns.input[slot] = command.apply_to(self.columns.input[slot]) & Intent::MASK;
        Ok(())
    }

    /// Advance every player by one fixed timestep, then step physics.
    pub fn step(&mut self) {
        for slot in 0..self.arena.capacity() {
            if self.arena.live_at(slot).is_none() {
                continue;
            }
            if let Some(body) = self.columns.body[slot] {
                self.step_player(slot, body);
            }
        }
        self.physics.step(self.timestep);
    }

    fn step_player(&mut self, slot: usize, body: BodyHandle) {
        let input = self.columns.input[slot];
        let force = self.columns.force[slot];
        let origin = self.physics.translation(body);
        let rotation = self.physics.rotation(body);

        let up = Intent::axis(input, Intent::UP);
        let down = Intent::axis(input, Intent::DOWN);
        let left = Intent::axis(input, Intent::LEFT);
        let right = Intent::axis(input, Intent::RIGHT);

        let mut target = DVec3::new(force.x, force.y - GRAVITY_PER_TICK, force.z);

        let ground = self.physics.cast_shape(
            origin,
            rotation,
            DVec3::new(0.0, target.y, 0.0),
            &GROUND_PROBE,
            PLAYER_HEIGHT / 2.0,
            CollisionGroups::ACTOR,
            Some(body),
        );
        let grounded = ground.is_some_and(|hit| hit.normal.y.abs() > 0.0);

        if grounded {
            target.y = if Intent::has(input, Intent::JUMP) {
                JUMP_IMPULSE
            } else {
                0.0
            };
            target.x = (force.x + (right - left) * WALK_ACCELERATION) * (1.0 - GROUND_DAMPING);
            target.z = (force.z + (down - up) * WALK_ACCELERATION) * (1.0 - GROUND_DAMPING);
        }

        let wall = self.physics.cast_shape(
            origin,
            rotation,
            DVec3::new(target.x, 0.0, target.z),
            &WALL_PROBE,
            PLAYER_RADIUS,
            CollisionGroups::ACTOR,
            Some(body),
        );
        if let Some(hit) = wall {
            if hit.normal.x.abs() > WALL_NORMAL_THRESHOLD {
                target.x = 0.0;
            }
            if hit.normal.z.abs() > WALL_NORMAL_THRESHOLD {
                target.z = 0.0;
            }
        }

        self.columns.force[slot] = target;
        self.columns.grounded[slot] = grounded;
        self.columns.input[slot] = input & !Intent::JUMP;
        self.physics.set_next_kinematic_translation(body, origin + target);
    }

    /// Authoritative copy of every player, in slot order.
    pub fn snapshot(&self, timestamp: Timestamp) -> Snapshot {
        let players = self
            .arena
            .iter()
            .filter_map(|entity| Some(self.player(entity)?.to_snapshot(entity)))
            .collect();
        Snapshot { timestamp, players }
    }

    /// Hard-reset to `snapshot`. Players missing locally are spawned under
    /// the snapshot's handles and players absent from it are despawned.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        // Prune first: a slot reused by the authority must be free before
        // its new handle is claimed.
        let present: BTreeSet<Entity> = snapshot.players.iter().map(|p| p.entity).collect();
        let stale: Vec<Entity> = self
            .arena
            .iter()
            .filter(|entity| !present.contains(entity))
            .collect();
        for entity in stale {
            self.despawn(entity);
        }

        for entry in &snapshot.players {
            if !self.arena.contains(entry.entity) && !self.spawn_at(entry.entity, entry.translation)
            {
                warn!(
                    entity = ?entry.entity,
                    error = %NetError::UnknownEntity(entry.entity),
                    "Snapshot entry conflicts with a live entity, skipping"
                );
                continue;
            }
            if let Err(e) = self.set_player(entry.entity, PlayerState::from(entry)) {
                warn!(entity = ?entry.entity, error = %e, "Failed to apply snapshot entry");
            }
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let mut display = DisplayState::new();
        for entity in self.arena.iter() {
            if let Some(body) = self.body(entity) {
                display.insert(
                    entity,
                    PlayerDisplay {
                        translation: self.physics.translation(body),
                        rotation: self.physics.rotation(body),
                    },
                );
            }
        }
        display
    }
}

impl<P: Physics + Clone> Clone for World<P> {
    fn clone(&self) -> Self {
        Self {
            physics: self.physics.clone(),
            arena: self.arena.clone(),
            columns: self.columns.clone(),
            timestep: self.timestep,
        }
    }
}

impl<P: Physics> std::fmt::Debug for World<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.arena.len())
            .field("timestep", &self.timestep)
            .finish()
    }
}
