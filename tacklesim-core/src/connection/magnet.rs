use glam::Vec3;

use crate::mass::{apply_force, MassArena, MassKey};
use crate::math::normalize_or_zero;

/// Range limited attraction or repulsion between two masses.
///
/// Applied as a pair of opposite forces, never as a hard constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Magnet {
    pub repulsion_constant: f32,
    pub repulsion_distance: f32,
    pub attraction_constant: f32,
    pub attraction_distance: f32,
    pub is_attracting: bool,
}

impl Magnet {
    pub fn new(
        repulsion_constant: f32,
        repulsion_distance: f32,
        attraction_constant: f32,
        attraction_distance: f32,
    ) -> Self {
        Self {
            repulsion_constant,
            repulsion_distance,
            attraction_constant,
            attraction_distance,
            is_attracting: false,
        }
    }

    /// Force on mass2; mass1 receives the opposite
    pub fn force(&self, position1: Vec3, position2: Vec3) -> Vec3 {
        if self.is_attracting {
            let vec = position1 - position2;
            let distance = vec.length();
            if distance > self.attraction_distance || self.attraction_distance <= 0.0 {
                return Vec3::ZERO;
            }
            let closeness = (self.attraction_distance - distance) / self.attraction_distance;
            // Stop pulling once the pair has nearly closed
            if closeness < 0.9 {
                normalize_or_zero(vec) * self.attraction_constant * closeness
            } else {
                Vec3::ZERO
            }
        } else {
            let vec = position2 - position1;
            let distance = vec.length();
            if distance > self.repulsion_distance {
                return Vec3::ZERO;
            }
            normalize_or_zero(vec) * self.repulsion_constant * (self.repulsion_distance - distance)
        }
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let force = self.force(arena[mass1].position(), arena[mass2].position());
        if force == Vec3::ZERO {
            return;
        }
        apply_force(arena, mass2, force, false);
        apply_force(arena, mass1, -force, false);
    }
}
