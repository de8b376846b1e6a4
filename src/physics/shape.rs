//! Collision shapes and group filtering

use glam::DVec3;

/// Upright capsule: a segment of `2 * half_height` capped by hemispheres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub half_height: f64,
    pub radius: f64,
}

impl Capsule {
    pub const fn new(half_height: f64, radius: f64) -> Self {
        Self {
            half_height,
            radius,
        }
    }

    /// Half extents of the bounding box (casts treat the capsule as upright).
    pub fn half_extents(&self) -> DVec3 {
        DVec3::new(self.radius, self.half_height + self.radius, self.radius)
    }
}

/// Axis-aligned box given by center and half extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: DVec3,
    pub half_extents: DVec3,
}

impl Aabb {
    pub const fn new(center: DVec3, half_extents: DVec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Minkowski sum with another box of `half_extents` centered at origin.
    pub fn expanded(&self, half_extents: DVec3) -> Self {
        Self::new(self.center, self.half_extents + half_extents)
    }

    pub fn contains(&self, point: DVec3) -> bool {
        let d = (point - self.center).abs();
        d.x < self.half_extents.x && d.y < self.half_extents.y && d.z < self.half_extents.z
    }
}

/// Membership and filter bitmasks. Two colliders interact only when each
/// one's memberships intersect the other's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionGroups {
    pub memberships: u16,
    pub filter: u16,
}

impl CollisionGroups {
    const STATIC_BIT: u16 = 1 << 0;
    const DOOR_BIT: u16 = 1 << 1;
    const ACTOR_BIT: u16 = 1 << 2;
    const VISIBLE_BIT: u16 = 1 << 4;

    /// Level geometry: touched by actors.
    pub const TERRAIN: Self = Self::new(Self::STATIC_BIT | Self::VISIBLE_BIT, Self::ACTOR_BIT);
    /// Player capsules: touch terrain and doors, pass through each other.
    pub const ACTOR: Self = Self::new(Self::ACTOR_BIT, Self::STATIC_BIT | Self::DOOR_BIT);

    pub const fn new(memberships: u16, filter: u16) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    pub const fn interacts_with(self, other: Self) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }
}
