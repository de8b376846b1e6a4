//! Built-in deterministic collision world
//!
//! Static cuboids plus kinematic capsule bodies. Casts sweep the caster's
//! bounding box against every interacting collider (slab test on the
//! Minkowski-expanded box) in insertion order, so identical worlds always
//! answer identically.

use glam::{DQuat, DVec3};
use tracing::warn;

use super::shape::{Aabb, Capsule, CollisionGroups};
use super::{BodyHandle, Physics, ShapeHit};

const PARALLEL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
struct StaticCollider {
    bounds: Aabb,
    groups: CollisionGroups,
}

#[derive(Debug, Clone)]
struct KinematicBody {
    translation: DVec3,
    rotation: DQuat,
    next_translation: Option<DVec3>,
    shape: Capsule,
    groups: CollisionGroups,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    statics: Vec<StaticCollider>,
    bodies: Vec<Option<KinematicBody>>,
    elapsed: f64,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an immovable cuboid.
    pub fn add_cuboid(&mut self, center: DVec3, half_extents: DVec3, groups: CollisionGroups) {
        self.statics.push(StaticCollider {
            bounds: Aabb::new(center, half_extents),
            groups,
        });
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    /// Simulated seconds advanced by [`Physics::step`].
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    fn body(&self, handle: BodyHandle) -> Option<&KinematicBody> {
        self.bodies.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut KinematicBody> {
        let body = self.bodies.get_mut(handle.0 as usize).and_then(Option::as_mut);
        if body.is_none() {
            warn!(body = handle.0, "Physics body does not exist");
        }
        body
    }

    fn obstacles<'a>(
        &'a self,
        groups: CollisionGroups,
        exclude: Option<BodyHandle>,
    ) -> impl Iterator<Item = Aabb> + 'a {
        let statics = self
            .statics
            .iter()
            .filter(move |c| groups.interacts_with(c.groups))
            .map(|c| c.bounds);
        let bodies = self
            .bodies
            .iter()
            .enumerate()
            .filter(move |(index, _)| exclude.map_or(true, |h| h.0 as usize != *index))
            .filter_map(|(_, body)| body.as_ref())
            .filter(move |b| groups.interacts_with(b.groups))
            .map(|b| Aabb::new(b.translation, b.shape.half_extents()));
        statics.chain(bodies)
    }
}

impl Physics for CollisionWorld {
    fn create_kinematic_body(
        &mut self,
        translation: DVec3,
        shape: Capsule,
        groups: CollisionGroups,
    ) -> BodyHandle {
        let body = KinematicBody {
            translation,
            rotation: DQuat::IDENTITY,
            next_translation: None,
            shape,
            groups,
        };
        match self.bodies.iter().position(Option::is_none) {
            Some(index) => {
                self.bodies[index] = Some(body);
                BodyHandle(index as u32)
            }
            None => {
                self.bodies.push(Some(body));
                BodyHandle((self.bodies.len() - 1) as u32)
            }
        }
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if let Some(slot) = self.bodies.get_mut(body.0 as usize) {
            *slot = None;
        }
    }

    fn translation(&self, body: BodyHandle) -> DVec3 {
        self.body(body).map_or(DVec3::ZERO, |b| b.translation)
    }

    fn rotation(&self, body: BodyHandle) -> DQuat {
        self.body(body).map_or(DQuat::IDENTITY, |b| b.rotation)
    }

    fn set_translation(&mut self, body: BodyHandle, translation: DVec3) {
        if let Some(b) = self.body_mut(body) {
            b.translation = translation;
            b.next_translation = None;
        }
    }

    fn set_rotation(&mut self, body: BodyHandle, rotation: DQuat) {
        if let Some(b) = self.body_mut(body) {
            b.rotation = rotation;
        }
    }

    fn set_next_kinematic_translation(&mut self, body: BodyHandle, translation: DVec3) {
        if let Some(b) = self.body_mut(body) {
            b.next_translation = Some(translation);
        }
    }

    fn cast_shape(
        &self,
        origin: DVec3,
        _rotation: DQuat,
        direction: DVec3,
        shape: &Capsule,
        max_toi: f64,
        groups: CollisionGroups,
        exclude: Option<BodyHandle>,
    ) -> Option<ShapeHit> {
        let caster = shape.half_extents();
        let mut best: Option<ShapeHit> = None;
        for obstacle in self.obstacles(groups, exclude) {
            let Some(hit) = sweep(origin, direction, max_toi, obstacle.expanded(caster)) else {
                continue;
            };
            if best.map_or(true, |b| hit.toi < b.toi) {
                best = Some(hit);
            }
        }
        best
    }

    fn step(&mut self, dt: f64) {
        for body in self.bodies.iter_mut().flatten() {
            if let Some(next) = body.next_translation.take() {
                body.translation = next;
            }
        }
        self.elapsed += dt;
    }
}

/// Ray `origin + direction * t` against an expanded box, `t` in `[0, max_toi]`.
fn sweep(origin: DVec3, direction: DVec3, max_toi: f64, target: Aabb) -> Option<ShapeHit> {
    let min = target.center - target.half_extents;
    let max = target.center + target.half_extents;

    let mut entry = f64::NEG_INFINITY;
    let mut exit = f64::INFINITY;
    let mut entry_axis = 0;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < PARALLEL_EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let t1 = (min[axis] - o) / d;
        let t2 = (max[axis] - o) / d;
        let (near, far) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        if near > entry {
            entry = near;
            entry_axis = axis;
        }
        exit = exit.min(far);
    }

    if entry > exit || exit < 0.0 || entry > max_toi {
        return None;
    }

    if entry <= 0.0 {
        // Touching or already overlapping: resolve along least penetration.
        return Some(ShapeHit {
            toi: 0.0,
            normal: penetration_normal(origin, target),
        });
    }

    let mut normal = DVec3::ZERO;
    normal[entry_axis] = -direction[entry_axis].signum();
    Some(ShapeHit { toi: entry, normal })
}

fn penetration_normal(origin: DVec3, target: Aabb) -> DVec3 {
    let offset = origin - target.center;
    let depth = target.half_extents - offset.abs();
    let axis = if depth.x <= depth.y && depth.x <= depth.z {
        0
    } else if depth.y <= depth.z {
        1
    } else {
        2
    };
    let mut normal = DVec3::ZERO;
    normal[axis] = if offset[axis] < 0.0 { -1.0 } else { 1.0 };
    normal
}
