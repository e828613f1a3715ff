//! Massless points welded to a rigid body.
//!
//! A point is placed on its parent every sub-step and is never integrated
//! on its own. Forces on a point reach the parent as force plus torque. A
//! [`PointConstraint`] additionally keeps the point above the ground and a
//! set of half-space planes.

use glam::Vec3;

use super::{CollisionType, MassArena, MassKey, MassKind};
use crate::config::TIME_QUANT;

#[derive(Debug, Clone)]
pub struct PointState {
    pub(crate) parent: MassKey,
    pub(crate) local_position: Vec3,
    pub constraint: Option<PointConstraint>,
}

impl PointState {
    pub fn new(parent: MassKey, local_position: Vec3) -> Self {
        Self { parent, local_position, constraint: None }
    }

    pub fn parent(&self) -> MassKey {
        self.parent
    }

    pub fn local_position(&self) -> Vec3 {
        self.local_position
    }
}

/// Contact response of a welded point against the ground and planes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointConstraint {
    pub bounce: f32,
    pub friction: f32,
    /// `(point, normal)` pairs; the solid side is opposite the normal
    pub collision_planes: Vec<(Vec3, Vec3)>,
}

impl PointConstraint {
    pub fn new(bounce: f32, friction: f32) -> Self {
        Self { bounce, friction, collision_planes: Vec::new() }
    }

    pub fn with_plane(mut self, point: Vec3, normal: Vec3) -> Self {
        self.collision_planes.push((point, normal));
        self
    }
}

/// Parent values read by a point
struct ParentView {
    position: Vec3,
    mass: f32,
    inv_mass: f32,
    world_inertia: Vec3,
    ground_point: Vec3,
    ground_normal: Vec3,
}

/// Follow the parent, then push it back out of any violated constraint.
pub(crate) fn simulate(arena: &mut MassArena, key: MassKey) {
    let Some(point) = arena.get(key) else {
        return;
    };
    let MassKind::PointOfRigidBody(state) = &point.kind else {
        return;
    };
    let parent_key = state.parent;
    let local = state.local_position;
    let constraint = state.constraint.clone();

    let Some(parent) = arena.get(parent_key) else {
        return;
    };
    let view = ParentView {
        position: parent.position,
        mass: parent.mass,
        inv_mass: parent.inv_mass,
        world_inertia: parent.rigid_body().map_or(Vec3::ONE, |b| b.world_inertia),
        ground_point: parent.ground_point,
        ground_normal: parent.ground_normal,
    };
    let position = parent.local_to_world(local);
    let velocity = parent.point_velocity(local);

    let point = &mut arena[key];
    point.position = position;
    point.velocity = velocity;
    point.ground_point = view.ground_point;
    point.ground_normal = view.ground_normal;
    let collision = point.collision;
    let ground_height = point.ground_height();

    let Some(constraint) = constraint else {
        return;
    };
    let Some(parent) = arena.get_mut(parent_key) else {
        return;
    };
    let r = position - view.position;
    let inertia_term = |n: Vec3| n.dot((r.cross(n) / view.world_inertia).cross(r));

    if collision == CollisionType::ExternalPlane {
        let up = Vec3::Y;
        let vn = velocity.dot(up);
        let friction = (velocity - up * vn) * constraint.friction;
        if position.y < ground_height {
            parent.apply_force_at(up * view.mass, local, false);
        }
        if position.y + velocity.y * TIME_QUANT <= ground_height && vn < 0.0 {
            let denom = view.inv_mass + inertia_term(up);
            if denom != 0.0 {
                let f = -(1.0 + constraint.bounce) * vn / denom;
                parent.apply_impulse_at(up * f - friction, local);
            }
        }
    }

    for &(plane_point, normal) in &constraint.collision_planes {
        let vn = velocity.dot(normal);
        let friction = (velocity - normal * vn) * constraint.friction;
        let ahead = position + velocity * TIME_QUANT - plane_point;
        if ahead.dot(normal) > 0.0 || vn > 0.001 {
            continue;
        }
        let penetration = (position - plane_point).dot(normal).min(0.0);
        let denom = view.inv_mass + inertia_term(normal);
        if denom != 0.0 {
            let f = -(1.0 + constraint.bounce) * (vn + penetration * TIME_QUANT) / denom;
            parent.apply_impulse_at(normal * f - friction, local);
        }
    }
}
