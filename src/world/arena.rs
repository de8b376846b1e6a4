//! The default level: a ground slab and two raised platforms

use glam::DVec3;

use crate::physics::{CollisionGroups, CollisionWorld};

pub const GROUND_HALF_EXTENTS: DVec3 = DVec3::new(100.0, 0.5, 100.0);
pub const OBSTACLE_HALF_EXTENTS: DVec3 = DVec3::new(10.0, 1.0, 10.0);
pub const OBSTACLE_CENTERS: [DVec3; 2] = [DVec3::new(10.0, 1.0, 10.0), DVec3::new(25.0, 1.0, 25.0)];

/// Where new players drop in when no spawn generator is supplied.
pub const SPAWN_POINT: DVec3 = DVec3::new(0.0, 20.0, 0.0);

/// Build the collision world for the default level.
pub fn default_level() -> CollisionWorld {
    let mut physics = CollisionWorld::new();
    physics.add_cuboid(DVec3::ZERO, GROUND_HALF_EXTENTS, CollisionGroups::TERRAIN);
    for center in OBSTACLE_CENTERS {
        physics.add_cuboid(center, OBSTACLE_HALF_EXTENTS, CollisionGroups::TERRAIN);
    }
    physics
}

/// Height of a player's center when resting on the ground slab.
pub fn resting_height() -> f64 {
    GROUND_HALF_EXTENTS.y + super::player::PLAYER_SHAPE.half_extents().y
}
