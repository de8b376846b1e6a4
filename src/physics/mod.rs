//! Physics collaborator interface
//!
//! The world model drives movement itself (kinematic controller) and only
//! asks the physics layer for shape casts and body transform storage. Any
//! engine that can answer these queries deterministically can sit behind
//! [`Physics`]; [`CollisionWorld`] is the built-in one.

mod collision;
mod shape;

pub use collision::CollisionWorld;
pub use shape::{Aabb, Capsule, CollisionGroups};

use glam::{DQuat, DVec3};

/// Opaque handle to a body owned by a [`Physics`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u32);

/// First contact reported by a shape cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeHit {
    /// Time of impact in multiples of the cast direction.
    pub toi: f64,
    /// Surface normal of the obstacle, pointing toward the cast shape.
    pub normal: DVec3,
}

pub trait Physics {
    fn create_kinematic_body(
        &mut self,
        translation: DVec3,
        shape: Capsule,
        groups: CollisionGroups,
    ) -> BodyHandle;

    fn remove_body(&mut self, body: BodyHandle);

    fn translation(&self, body: BodyHandle) -> DVec3;

    fn rotation(&self, body: BodyHandle) -> DQuat;

    /// Teleport, bypassing the kinematic interpolation of the next step.
    fn set_translation(&mut self, body: BodyHandle, translation: DVec3);

    fn set_rotation(&mut self, body: BodyHandle, rotation: DQuat);

    /// Queue a kinematic move applied by the next [`Physics::step`].
    fn set_next_kinematic_translation(&mut self, body: BodyHandle, translation: DVec3);

    /// Sweep `shape` from `origin` along `direction` for at most `max_toi`
    /// direction lengths. `exclude` skips the caster's own body.
    #[allow(clippy::too_many_arguments)]
    fn cast_shape(
        &self,
        origin: DVec3,
        rotation: DQuat,
        direction: DVec3,
        shape: &Capsule,
        max_toi: f64,
        groups: CollisionGroups,
        exclude: Option<BodyHandle>,
    ) -> Option<ShapeHit>;

    /// Advance by one fixed timestep, committing queued kinematic moves.
    fn step(&mut self, dt: f64);
}
