use glam::{Quat, Vec3};

use crate::config::TIME_QUANT;
use crate::mass::{Mass, MassArena, MassKey};
use crate::math::{slerp, BezierSpline};
use crate::simulation::StepContext;

/// Drives a single kinematic mass between commanded poses.
///
/// Each frame the host sets the next pose; the mass then follows a
/// three point Bezier segment from where it was and slerps its rotation.
/// A passive follower computes the pose but leaves applying it to
/// [`KinematicConnection::postponed_solve`].
#[derive(Debug, Clone)]
pub struct KinematicConnection {
    pub inertia_factor: f32,
    pub is_passive: bool,
    next_position: Vec3,
    next_rotation: Quat,
    prior_rotation: Quat,
    path: BezierSpline,
    new_position: Vec3,
    prior_period_position: Vec3,
    prior_period_rotation: Quat,
    start_velocity: Vec3,
    final_velocity: Vec3,
    current_position_delta: Vec3,
    current_rotation_delta: Quat,
    accumulated_position_delta: Vec3,
    accumulated_rotation_delta: Quat,
    current_rotation: Quat,
}

impl KinematicConnection {
    pub fn new(mass: &Mass, is_passive: bool) -> Self {
        let position = mass.position();
        let rotation = mass.rotation();
        Self {
            inertia_factor: 0.1,
            is_passive,
            next_position: position,
            next_rotation: rotation,
            prior_rotation: rotation,
            path: BezierSpline::quadratic(position, position, position),
            new_position: position,
            prior_period_position: position,
            prior_period_rotation: rotation,
            start_velocity: Vec3::ZERO,
            final_velocity: Vec3::ZERO,
            current_position_delta: Vec3::ZERO,
            current_rotation_delta: Quat::IDENTITY,
            accumulated_position_delta: Vec3::ZERO,
            accumulated_rotation_delta: Quat::IDENTITY,
            current_rotation: rotation,
        }
    }

    pub fn next_position(&self) -> Vec3 {
        self.next_position
    }

    pub fn current_position_delta(&self) -> Vec3 {
        self.current_position_delta
    }

    pub fn current_rotation_delta(&self) -> Quat {
        self.current_rotation_delta
    }

    pub fn accumulated_position_delta(&self) -> Vec3 {
        self.accumulated_position_delta
    }

    pub fn accumulated_rotation_delta(&self) -> Quat {
        self.accumulated_rotation_delta
    }

    pub fn current_rotation(&self) -> Quat {
        self.current_rotation
    }

    /// Velocity at the start of the segment and the one that lands on the target
    pub fn segment_velocities(&self) -> (Vec3, Vec3) {
        (self.start_velocity, self.final_velocity)
    }

    /// Commands the pose to reach by the end of the frame.
    pub fn set_next_position_and_rotation(&mut self, mass: &Mass, position: Vec3, rotation: Quat, frame_delta_time: f32) {
        let from = mass.position();
        self.next_position = position;
        self.path = BezierSpline::quadratic(from, (from + position) * 0.5, position);
        self.prior_rotation = self.next_rotation;
        self.next_rotation = rotation;
        self.start_velocity = mass.velocity();
        self.final_velocity = if frame_delta_time > 0.0 {
            2.0 * (position - from) / frame_delta_time - self.start_velocity
        } else {
            Vec3::ZERO
        };
    }

    /// Hold the current target
    pub fn stop(&mut self) {
        let at = self.next_position;
        self.path = BezierSpline::quadratic(at, at, at);
        self.prior_rotation = self.next_rotation;
        self.start_velocity = Vec3::ZERO;
        self.final_velocity = Vec3::ZERO;
        self.prior_period_position = at;
        self.prior_period_rotation = self.next_rotation;
        self.current_position_delta = Vec3::ZERO;
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass: MassKey, ctx: &StepContext) {
        let m = &mut arena[mass];
        if !m.is_kinematic {
            return;
        }
        let old_position = m.position();
        let old_rotation = self.current_rotation;
        self.new_position = self.path.point(ctx.progress);
        self.current_rotation = slerp(self.prior_rotation, self.next_rotation, ctx.progress);
        if !self.is_passive {
            m.set_position(self.new_position);
            m.set_rotation(self.current_rotation);
            m.velocity = (m.position() - old_position) / TIME_QUANT;
        }
        self.current_position_delta = self.new_position - old_position;
        self.current_rotation_delta = self.current_rotation * old_rotation.inverse();
        if ctx.index % 3 == 0 {
            self.accumulated_position_delta = self.new_position - self.prior_period_position;
            self.accumulated_rotation_delta = self.current_rotation * self.prior_period_rotation.inverse();
            self.prior_period_position = self.new_position;
            self.prior_period_rotation = self.current_rotation;
        }
    }

    /// Apply the pose computed by a passive follower.
    pub fn postponed_solve(&self, mass: &mut Mass) {
        if !self.is_passive {
            return;
        }
        mass.velocity = (self.new_position - mass.position()) / TIME_QUANT;
        mass.set_position(self.new_position);
        mass.set_rotation(self.current_rotation);
    }
}
