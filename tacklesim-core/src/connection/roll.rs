use glam::Vec3;

use crate::connection::{nudge, position};
use crate::mass::{MassArena, MassKey};
use crate::math::{approximately, normalize_or_zero};

/// Largest roll correction applied in one pass, in radians
const MAX_ROLL_STEP: f32 = 0.05;

/// Turns a tetrahedron base about its own normal towards a target direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TetrahedronRollStabilizer {
    pub tetrahedron: [MassKey; 4],
    pub base_stiffness: f32,
    pub stiffness_multiplier: f32,
    pub target_direction: Vec3,
}

impl TetrahedronRollStabilizer {
    pub fn new(tetrahedron: [MassKey; 4], base_stiffness: f32, target_direction: Vec3) -> Self {
        Self { tetrahedron, base_stiffness, stiffness_multiplier: 1.0, target_direction }
    }

    pub(crate) fn satisfy(&mut self, arena: &mut MassArena) {
        if approximately(self.stiffness_multiplier, 0.0) {
            return;
        }
        let t = self.tetrahedron;
        let (p1, p2, p3) = (position(arena, t[1]), position(arena, t[2]), position(arena, t[3]));
        let center = (p1 + p2 + p3) / 3.0;
        let (r1, r2, r3) = (p1 - center, p2 - center, p3 - center);
        let (l1, l2, l3) = (r1.length(), r2.length(), r3.length());
        if approximately(l3, 0.0) {
            return;
        }

        let normal = normalize_or_zero((p1 - p3).cross(p2 - p3));
        let e5 = r3 / l3;
        let e6 = normalize_or_zero(normal.cross(e5));
        let target = self.target_direction;
        let error = e6.dot(target).atan2(e5.dot(target)).clamp(-MAX_ROLL_STEP, MAX_ROLL_STEP);
        let delta = error * self.base_stiffness * self.stiffness_multiplier;

        let angles = [e6.dot(r1).atan2(e5.dot(r1)) + delta, e6.dot(r2).atan2(e5.dot(r2)) + delta, delta];
        let lengths = [l1, l2, l3];
        let before = p1 + p2 + p3;
        let placed: Vec<Vec3> = angles
            .iter()
            .zip(lengths)
            .map(|(angle, length)| center + e5 * (angle.cos() * length) + e6 * (angle.sin() * length))
            .collect();
        let shift = (placed.iter().copied().sum::<Vec3>() - before) / 3.0;
        for ((&key, old), new) in t[1..].iter().zip([p1, p2, p3]).zip(placed) {
            nudge(arena, key, new - shift - old);
        }
    }
}
