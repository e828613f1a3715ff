//! Impulse spring between two masses.
//!
//! The spring works on velocities: each sub-step it predicts the next
//! separation and applies the impulse that brings it back to the rest
//! length in one step.

use glam::Vec3;

use crate::config::TIME_QUANT;
use crate::error::{PhysicsError, Result};
use crate::mass::{MassArena, MassKey, MassKind};
use crate::math::{approximately, lerp};
use crate::simulation::StepContext;

const SQR_MIN_DISTANCE: f32 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    pub(crate) spring_constant: f32,
    pub(crate) spring_length: f32,
    pub(crate) target_length: f32,
    pub(crate) old_length: f32,
    pub(crate) immediate_length: f32,
    pub friction: f32,
    pub is_repulsive: bool,
    pub affect_mass1: f32,
    pub affect_mass2: f32,
    pub impulse_threshold2: f32,
    pub impulse_verlet_max2: f32,
    pub(crate) tension: f32,
    pub(crate) delta_length: f32,
}

impl Spring {
    pub fn new(spring_constant: f32, spring_length: f32, friction: f32) -> Result<Self> {
        if spring_length < 0.0 {
            return Err(PhysicsError::NegativeSpringLength(spring_length));
        }
        Ok(Self {
            spring_constant,
            spring_length,
            target_length: spring_length,
            old_length: spring_length,
            immediate_length: -1.0,
            friction,
            is_repulsive: false,
            affect_mass1: 1.0,
            affect_mass2: 1.0,
            impulse_threshold2: 0.0,
            impulse_verlet_max2: 100.0,
            tension: 0.0,
            delta_length: 0.0,
        })
    }

    pub fn spring_constant(&self) -> f32 {
        self.spring_constant
    }

    pub fn set_spring_constant(&mut self, value: f32) {
        self.spring_constant = value;
    }

    /// Rest length the spring is heading for
    pub fn spring_length(&self) -> f32 {
        self.target_length
    }

    /// New rest length, reached gradually over the next frame
    pub fn set_spring_length(&mut self, value: f32) -> Result<()> {
        if value < 0.0 {
            return Err(PhysicsError::NegativeSpringLength(value));
        }
        self.target_length = value;
        Ok(())
    }

    /// Rest length in effect this sub-step
    pub fn current_spring_length(&self) -> f32 {
        self.spring_length
    }

    /// New rest length applied without blending on the next sync
    pub fn set_spring_length_immediate(&mut self, value: f32) -> Result<()> {
        if value < 0.0 {
            return Err(PhysicsError::NegativeSpringLength(value));
        }
        self.immediate_length = value;
        Ok(())
    }

    /// Apply a pending immediate length. Returns true if one was pending.
    pub(crate) fn apply_immediate_length(&mut self) -> bool {
        if self.immediate_length < 0.0 {
            return false;
        }
        self.spring_length = self.immediate_length;
        self.old_length = self.immediate_length;
        self.target_length = self.immediate_length;
        self.immediate_length = -1.0;
        true
    }

    /// Copy tuning from the authoritative spring, consuming its pending immediate length.
    pub(crate) fn sync_from(&mut self, source: &mut Spring) {
        self.target_length = source.target_length;
        self.spring_constant = source.spring_constant;
        self.affect_mass1 = source.affect_mass1;
        self.affect_mass2 = source.affect_mass2;
        self.impulse_threshold2 = source.impulse_threshold2;
        self.impulse_verlet_max2 = source.impulse_verlet_max2;
        self.friction = source.friction;
        if source.immediate_length >= 0.0 {
            self.immediate_length = source.immediate_length;
            self.apply_immediate_length();
            source.immediate_length = -1.0;
        }
    }

    pub fn tension(&self) -> f32 {
        self.tension
    }

    pub fn delta_length(&self) -> f32 {
        self.delta_length
    }

    /// Length at which the spring balances `load_force`
    pub fn equilibrant_length(&self, load_force: f32) -> f32 {
        if self.spring_constant == 0.0 {
            return self.spring_length;
        }
        self.spring_length + load_force / self.spring_constant
    }

    pub fn potential_energy(&self, arena: &MassArena, mass1: MassKey, mass2: MassKey) -> f32 {
        let (Some(a), Some(b)) = (arena.get(mass1), arena.get(mass2)) else {
            return 0.0;
        };
        let extension = (a.position - b.position).length() - self.spring_length;
        if extension > 0.0 || self.is_repulsive {
            self.spring_constant * extension * extension
        } else {
            0.0
        }
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey, ctx: &StepContext) {
        if ctx.index == 0 {
            self.old_length = self.spring_length;
        }
        if !approximately(self.target_length, self.spring_length) {
            self.spring_length = lerp(self.old_length, self.target_length, ctx.progress);
        }
        let both_kinematic = arena[mass1].is_kinematic && arena[mass2].is_kinematic;
        if !both_kinematic {
            self.tension = self.satisfy_impulse_constraint_mass(arena, mass1, mass2);
        }
    }

    /// One impulse iteration. Returns the tension impulse.
    pub fn satisfy_impulse_constraint_mass(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) -> f32 {
        let friction = Vec3::splat(self.friction);
        self.impulse_step(arena, mass1, mass2, friction, self.impulse_threshold2)
    }

    /// Legacy entry point with an explicit per-axis friction and threshold.
    ///
    /// Skips the step when both masses are kinematic and stores the tension
    /// on the spring instead of returning it.
    pub fn satisfy_impulse_constraint_mass0(
        &mut self,
        arena: &mut MassArena,
        mass1: MassKey,
        mass2: MassKey,
        friction: Vec3,
        impulse_threshold2: f32,
    ) {
        let (Some(a), Some(b)) = (arena.get(mass1), arena.get(mass2)) else {
            return;
        };
        if a.is_kinematic && b.is_kinematic {
            return;
        }
        self.tension = self.impulse_step(arena, mass1, mass2, friction, impulse_threshold2);
    }

    fn impulse_step(
        &mut self,
        arena: &mut MassArena,
        mass1: MassKey,
        mass2: MassKey,
        friction: Vec3,
        threshold: f32,
    ) -> f32 {
        self.delta_length = 0.0;
        let (p1, v1, inv1) = {
            let m = &arena[mass1];
            (m.position, m.velocity, m.inv_mass())
        };
        let (p2, v2, inv2, verlet2) = {
            let m = &arena[mass2];
            (m.position, m.velocity, m.inv_mass(), matches!(m.kind, MassKind::Verlet(_)))
        };
        let inv_sum = inv1 + inv2;
        let denom = if approximately(inv_sum, 0.0) { 0.0 } else { 1.0 / inv_sum };

        let relative = v1 - v2;
        let offset = p2 - p1 - relative * TIME_QUANT;
        let d2 = offset.length_squared();
        if d2 <= SQR_MIN_DISTANCE {
            return 0.0;
        }

        let length = self.spring_length;
        let mut t = 0.0;
        let mut n = Vec3::ZERO;
        let mut dv1 = Vec3::ZERO;
        let mut dv2 = Vec3::ZERO;
        if self.is_repulsive || d2 > length * length {
            let d = d2.sqrt();
            n = offset / d;
            t = (d - length) * denom / TIME_QUANT;
            dv1 = n * t;
            if t > threshold {
                dv2 = -dv1 + n * threshold;
            }
            self.delta_length = d - length;
        }
        if t >= threshold {
            let friction = (relative + dv1 - dv2) * denom * friction;
            dv1 -= friction;
            dv2 += friction;
        }

        arena[mass1].velocity += dv1 * inv1 * self.affect_mass1;
        let m2 = &mut arena[mass2];
        if verlet2 {
            if t > self.impulse_verlet_max2 {
                dv2 += n * (t - self.impulse_verlet_max2);
            }
            m2.apply_verlet_impulse(dv2 * TIME_QUANT * inv2 * self.affect_mass2);
        } else {
            m2.velocity += dv2 * inv2 * self.affect_mass2;
        }
        t
    }

    /// Nudge `mass2` towards `length` from `mass1` with stiffness `k`.
    ///
    /// Only `mass2` moves.
    pub fn satisfy_virtual_spring(arena: &mut MassArena, length: f32, mass1: MassKey, mass2: MassKey, k: f32) {
        let (Some(a), Some(b)) = (arena.get(mass1), arena.get(mass2)) else {
            return;
        };
        let offset = b.position - a.position;
        let d2 = offset.length_squared();
        if d2 <= SQR_MIN_DISTANCE || d2 == length * length {
            return;
        }
        let d = d2.sqrt();
        let n = offset / d;
        let inv2 = b.inv_mass();
        if let Some(b) = arena.get_mut(mass2) {
            b.velocity += -n * (d - length).abs() * k * inv2 * TIME_QUANT;
        }
    }
}
