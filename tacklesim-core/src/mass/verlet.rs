//! Position based masses.
//!
//! Velocity is implicit in `position - prev`. Positions accumulate through
//! a Kahan sum so long runs of tiny steps do not drift.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{CollisionType, Mass, MassKind, MassType};
use crate::collider::Collider;
use crate::config::TIME_QUANT;
use crate::math::{approximately, kahan_add, lerp_vec3};
use crate::simulation::StepContext;

/// Per-mass switches read by Verlet constraints touching a fish body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FishData {
    pub open_spring: bool,
    pub open_verlet_spring: bool,
    pub open_verlet_satisfy: bool,
    /// Rest length override for Verlet springs, zero for none
    pub verlet_spring_length: f32,
    /// Friction override for Verlet springs, zero for none
    pub verlet_spring_friction: f32,
}

impl Default for FishData {
    fn default() -> Self {
        Self {
            open_spring: true,
            open_verlet_spring: true,
            open_verlet_satisfy: true,
            verlet_spring_length: 0.0,
            verlet_spring_friction: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerletState {
    pub(crate) prev: Vec3,
    pub(crate) kahan: Vec3,
    pub(crate) kahan2: Vec3,
    pub(crate) is_static: bool,
    pub(crate) kin_prev: Vec3,
    pub(crate) kin_next: Vec3,
    pub(crate) delta_pos: Vec3,
    pub(crate) path_delta: Vec3,
    pub fish_data: Option<FishData>,
}

impl VerletState {
    pub fn new() -> Self {
        Self { is_static: true, ..Self::default() }
    }

    pub fn prev_position(&self) -> Vec3 {
        self.prev
    }

    /// Displacement over the last sub-step
    pub fn path_delta(&self) -> Vec3 {
        self.path_delta
    }

    pub fn delta_position(&self) -> Vec3 {
        self.delta_pos
    }
}

impl Mass {
    pub fn verlet(&self) -> Option<&VerletState> {
        match &self.kind {
            MassKind::Verlet(state) => Some(state),
            _ => None,
        }
    }

    pub fn verlet_mut(&mut self) -> Option<&mut VerletState> {
        match &mut self.kind {
            MassKind::Verlet(state) => Some(state),
            _ => None,
        }
    }

    pub fn fish_data(&self) -> Option<&FishData> {
        self.verlet().and_then(|s| s.fish_data.as_ref())
    }

    /// `position - prev` for Verlet masses, zero otherwise
    pub fn position_delta(&self) -> Vec3 {
        match &self.kind {
            MassKind::Verlet(state) => self.position - state.prev,
            _ => Vec3::ZERO,
        }
    }

    pub fn path_delta(&self) -> Vec3 {
        self.verlet().map_or(Vec3::ZERO, |s| s.path_delta)
    }

    /// Shift the previous position by `-step`, changing the implied velocity.
    ///
    /// The compensation term is kept even when a fish body has springs closed.
    pub fn apply_verlet_impulse(&mut self, step: Vec3) {
        let MassKind::Verlet(state) = &mut self.kind else {
            return;
        };
        let y = -step - state.kahan2;
        let t = state.prev + y;
        state.kahan2 = (t - state.prev) - y;
        if state.fish_data.is_some_and(|fish| !fish.open_spring) {
            return;
        }
        state.prev = t;
    }

    /// Move both physical and previous position, leaving velocity untouched
    pub(crate) fn translate_verlet(&mut self, offset: Vec3) {
        self.position += offset;
        if let MassKind::Verlet(state) = &mut self.kind {
            state.prev += offset;
        }
    }
}

/// Respond to a contact by rewriting the implied velocity
fn respond(mass: &mut Mass, push: Vec3, normal: Vec3, frame_delta_time: f32) {
    let dot = normal.dot(mass.velocity);
    let v_normal = normal * dot;
    let bounced = if dot >= 0.0 { v_normal } else { -v_normal * super::SURFACE_BOUNCE };
    mass.velocity = mass.friction_velocity(mass.velocity, v_normal, frame_delta_time) + bounced;

    let MassKind::Verlet(state) = &mut mass.kind else {
        return;
    };
    kahan_add(&mut mass.position, &mut state.kahan, push);
    state.path_delta = mass.velocity * TIME_QUANT;
    state.prev = mass.position - state.path_delta;
    mass.is_collision = true;
}

/// One Verlet sub-step.
pub(crate) fn simulate(mass: &mut Mass, ctx: &StepContext) {
    let is_fish = mass.mass_type == MassType::Fish;
    let position = mass.position;
    let MassKind::Verlet(state) = &mut mass.kind else {
        return;
    };

    if mass.is_kinematic {
        state.prev = position;
        if !state.is_static {
            mass.position = lerp_vec3(state.kin_prev, state.kin_next, ctx.progress);
            if approximately(ctx.progress, 1.0) {
                state.is_static = true;
            }
        }
        state.path_delta = mass.position - state.prev;
        return;
    }

    let mut delta = position - state.prev;
    if is_fish && !mass.is_stopped && state.delta_pos != Vec3::ZERO {
        delta.y = state.delta_pos.y + (delta.y - state.delta_pos.y) * 0.01;
    }

    let limit = mass.delta_limit;
    if mass.velocity_limit > 0.0 && (delta.x.abs() > limit || delta.y.abs() > limit || delta.z.abs() > limit) {
        delta *= limit / delta.length();
        mass.limit_breached = true;
    }

    delta += mass.force * mass.inv_mass_delta * TIME_QUANT;
    mass.velocity = delta / TIME_QUANT;

    let old = mass.position;
    kahan_add(&mut mass.position, &mut state.kahan, delta);
    state.prev = old;
    state.path_delta = delta;
    mass.is_collision = false;

    let frame_dt = ctx.frame_delta_time;
    match mass.collision {
        CollisionType::FullBody => {
            let mut prior = old + mass.visual_offset;
            let colliders = mass.colliders.clone();
            for collider in colliders.iter() {
                let point = mass.position();
                if let Some(contact) = collider.test_point(point, prior) {
                    respond(mass, contact.push, contact.normal, frame_dt);
                    prior = point;
                }
            }
            if !mass.is_stopped {
                let visible = mass.position();
                let hit = mass.height_chunk.as_ref().and_then(|c| c.test_point(visible, old + mass.visual_offset));
                if let Some(contact) = hit {
                    respond(mass, contact.push, contact.normal, frame_dt);
                }
            }
        }
        CollisionType::ExternalPlane => {
            let depth = (mass.ext_ground_point_interpolated(ctx.progress).y - mass.position().y).max(0.0);
            if depth > 0.0 {
                let normal = mass.ext_ground_normal_interpolated(ctx.progress);
                respond(mass, Vec3::new(0.0, depth, 0.0), normal, frame_dt);
            }
        }
        CollisionType::None | CollisionType::RigidbodyContacts => {}
    }

    let position = mass.position;
    if let MassKind::Verlet(state) = &mut mass.kind {
        state.delta_pos = position - state.prev;
        state.kin_prev = position;
        state.kin_next = position;
    }
}
