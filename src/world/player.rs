//! Player movement constants, intent bits and the per-entity state view

use glam::{DQuat, DVec3};

use crate::physics::Capsule;
use crate::protocol::PlayerSnapshot;

use super::Entity;

pub const PLAYER_HEIGHT: f64 = 3.0;
pub const PLAYER_RADIUS: f64 = 1.0;

/// Downward displacement added to the vertical force every tick.
pub const GRAVITY_PER_TICK: f64 = 9.81 * 0.002;
pub const JUMP_IMPULSE: f64 = 0.3;
pub const WALK_ACCELERATION: f64 = 0.05;
/// Fraction of horizontal force lost per grounded tick.
pub const GROUND_DAMPING: f64 = 0.15;
/// Minimum normal component along an axis for a wall hit to block it.
pub const WALL_NORMAL_THRESHOLD: f64 = 0.1;

/// Collider attached to every player body.
pub const PLAYER_SHAPE: Capsule = Capsule::new(PLAYER_HEIGHT * 0.5, PLAYER_RADIUS);
/// Probe used for the ground test.
pub const GROUND_PROBE: Capsule = Capsule::new(PLAYER_HEIGHT * 0.5, PLAYER_RADIUS);
/// Slightly shorter probe so resting on the ground never reads as a wall.
pub const WALL_PROBE: Capsule = Capsule::new(PLAYER_HEIGHT * 0.49, PLAYER_RADIUS);

/// Input intent bits.
pub struct Intent;

impl Intent {
    pub const UP: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const DOWN: u8 = 1 << 2;
    pub const LEFT: u8 = 1 << 3;
    pub const JUMP: u8 = 1 << 4;

    /// The only meaningful bits of an input mask.
    pub const MASK: u8 = Self::UP | Self::RIGHT | Self::DOWN | Self::LEFT | Self::JUMP;

    pub const fn has(mask: u8, intent: u8) -> bool {
        mask & intent == intent
    }

    /// `1.0` when the intent is held, `0.0` otherwise.
    pub fn axis(mask: u8, intent: u8) -> f64 {
        if Self::has(mask, intent) {
            1.0
        } else {
            0.0
        }
    }
}

/// Full simulation state of one player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub input: u8,
    /// Per-tick displacement, not an acceleration.
    pub force: DVec3,
    pub grounded: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            input: 0,
            force: DVec3::ZERO,
            grounded: false,
        }
    }
}

impl PlayerState {
    pub fn to_snapshot(self, entity: Entity) -> PlayerSnapshot {
        PlayerSnapshot {
            entity,
            translation: self.translation,
            rotation: self.rotation,
            force: self.force,
            grounded: self.grounded,
            input: self.input,
        }
    }
}

impl From<&PlayerSnapshot> for PlayerState {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            translation: snapshot.translation,
            rotation: snapshot.rotation,
            input: snapshot.input,
            force: snapshot.force,
            grounded: snapshot.grounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_bits_fit_the_mask() {
        assert_eq!(Intent::MASK, 0b1_1111);
        assert!(Intent::has(Intent::UP | Intent::JUMP, Intent::JUMP));
        assert!(!Intent::has(Intent::UP, Intent::DOWN));
        assert_eq!(Intent::axis(Intent::LEFT, Intent::LEFT), 1.0);
    }
}
