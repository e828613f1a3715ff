use glam::{Quat, Vec3};

use crate::connection::{nudge, position_delta};
use crate::mass::{MassArena, MassKey};
use crate::math::{clamp01, from_to_rotation, slerp};

/// Holds mass2 at its rest offset in mass1's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VerletBend {
    pub friction: f32,
    pub rotational_stiffness: f32,
    pub displacement_stiffness: f32,
    pub normal_stiffness: f32,
    rest_offset: Vec3,
    rest_distance_sqr: f32,
    rest_rotation: Quat,
}

impl VerletBend {
    /// Captures the current relative pose as the rest pose.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arena: &MassArena,
        mass1: MassKey,
        mass2: MassKey,
        friction: f32,
        rotational_stiffness: f32,
        displacement_stiffness: f32,
        normal_stiffness: f32,
    ) -> Self {
        let (r1, p1) = arena.get(mass1).map_or((Quat::IDENTITY, Vec3::ZERO), |m| (m.rotation, m.position));
        let (r2, p2) = arena.get(mass2).map_or((Quat::IDENTITY, Vec3::ZERO), |m| (m.rotation, m.position));
        let rest_offset = r1.inverse() * (p2 - p1);
        Self {
            friction,
            rotational_stiffness,
            displacement_stiffness,
            normal_stiffness,
            rest_offset,
            rest_distance_sqr: rest_offset.length_squared(),
            rest_rotation: r2 * r1.inverse(),
        }
    }

    pub fn rest_offset(&self) -> Vec3 {
        self.rest_offset
    }

    pub(crate) fn satisfy(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let (r1, p1) = {
            let m = &arena[mass1];
            (m.rotation, m.position)
        };
        let target_offset = r1 * self.rest_offset;
        {
            let m2 = &mut arena[mass2];
            if !m2.is_kinematic {
                let half = slerp(Quat::IDENTITY, from_to_rotation(target_offset, m2.position - p1), 0.5);
                let target = half * (self.rest_rotation * r1);
                let rotation = m2.rotation.lerp(target, clamp01(self.rotational_stiffness)).normalize();
                m2.set_rotation(rotation);
                m2.position = m2.position.lerp(p1 + target_offset, self.displacement_stiffness);
            }
        }

        let vec = arena[mass2].position - arena[mass1].position;
        let d2 = vec.dot(vec);
        if d2 + self.rest_distance_sqr == 0.0 {
            return;
        }
        let f = (self.rest_distance_sqr / (d2 + self.rest_distance_sqr) - 0.5) * self.normal_stiffness;
        nudge(arena, mass1, -vec * f);
        nudge(arena, mass2, vec * f);
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let correction = (position_delta(arena, mass1) - position_delta(arena, mass2)) * self.friction;
        nudge(arena, mass1, -correction);
        nudge(arena, mass2, correction);
    }
}
