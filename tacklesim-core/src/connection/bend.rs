use glam::Vec3;

use crate::config::TIME_QUANT;
use crate::mass::{MassArena, MassKey};
use crate::math::{approximately, from_to_rotation};

/// Curvature constraint pulling mass2 towards an unbent pose in mass1's frame,
/// combined with a plain spring along the pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Bend {
    pub bend_constant: f32,
    pub spring_constant: f32,
    pub friction: f32,
    pub spring_length: f32,
    /// Rest position of mass2 in mass1's frame
    pub unbent_local_position: Vec3,
    pub mass1_factor: f32,
    pub mass2_factor: f32,
}

impl Bend {
    pub fn new(
        bend_constant: f32,
        spring_constant: f32,
        friction: f32,
        unbent_local_position: Vec3,
        spring_length: f32,
    ) -> Self {
        Self {
            bend_constant,
            spring_constant,
            friction,
            spring_length,
            unbent_local_position,
            mass1_factor: 1.0,
            mass2_factor: 1.0,
        }
    }

    /// World position mass2 would have without bending
    pub fn unbent_position(&self, arena: &MassArena, mass1: MassKey) -> Vec3 {
        arena.get(mass1).map_or(Vec3::ZERO, |m| m.rotation * self.unbent_local_position + m.position)
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let (r1, p1, v1, inv1) = {
            let m = &arena[mass1];
            (m.rotation, m.position, m.velocity, m.inv_mass())
        };
        let (p2, v2, inv2) = {
            let m = &arena[mass2];
            (m.position, m.velocity, m.inv_mass())
        };

        let local = r1.inverse() * (p2 - p1);
        arena[mass2].set_rotation(r1 * from_to_rotation(self.unbent_local_position, local));

        let to_unbent = (r1 * self.unbent_local_position + p1) - p2;
        let to_mass1 = p1 - p2;
        let d_unbent = to_unbent.length();
        let d = to_mass1.length();
        if approximately(d_unbent, 0.0) || approximately(d, 0.0) {
            return;
        }

        let force = to_unbent * self.bend_constant
            + to_mass1 / d * ((d - self.spring_length) * self.spring_constant)
            + (v1 - v2) * self.friction;
        let dv = force * TIME_QUANT;

        let m2 = &mut arena[mass2];
        m2.velocity += dv * inv2 * self.mass2_factor;
        m2.update_avg_force(force);
        let m1 = &mut arena[mass1];
        m1.velocity -= dv * inv1 * self.mass1_factor;
        m1.update_avg_force(-force);
    }
}
