use crate::connection::{nudge, position, position_delta};
use crate::mass::{FishData, MassArena, MassKey};
use crate::math::approximately;

/// Distance constraint between two Verlet masses.
///
/// `satisfy` projects positions back towards the rest length, split by
/// inverse mass. `solve` damps relative motion along the spring axis.
#[derive(Debug, Clone, PartialEq)]
pub struct VerletSpring {
    pub length: f32,
    pub friction: f32,
    /// A compressible spring only resists stretching
    pub compressible: bool,
}

impl VerletSpring {
    pub fn new(length: f32, friction: f32, compressible: bool) -> Self {
        Self { length, friction, compressible }
    }

    pub fn is_repulsive(&self) -> bool {
        !self.compressible
    }

    pub(crate) fn satisfy(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let (a, b) = (&arena[mass1], &arena[mass2]);
        let fish1 = a.fish_data().copied();
        let fish2 = b.fish_data().copied();
        if [fish1, fish2].iter().flatten().any(|fish| !fish.open_verlet_satisfy) {
            return;
        }
        if a.is_trapped() || b.is_trapped() {
            return;
        }
        let (inv1, inv2) = (a.inv_mass(), b.inv_mass());
        let inv_sum = inv1 + inv2;
        if approximately(inv_sum, 0.0) {
            return;
        }
        let inv_mass_sum = 1.0 / inv_sum;

        let vec = b.position - a.position;
        let d2 = vec.dot(vec);
        let length = match fish1.or(fish2) {
            Some(FishData { verlet_spring_length, .. }) if verlet_spring_length != 0.0 => verlet_spring_length,
            _ => self.length,
        };
        let length2 = length * length;
        if !self.compressible || d2 > length2 {
            let s = (length2 / (d2 + length2) - 0.5) * inv_mass_sum;
            nudge(arena, mass1, -vec * s * inv1);
            nudge(arena, mass2, vec * s * inv2);
        }
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey) {
        let fish1 = arena[mass1].fish_data().copied();
        let fish2 = arena[mass2].fish_data().copied();
        if [fish1, fish2].iter().flatten().any(|fish| !fish.open_verlet_spring) {
            return;
        }
        let friction = [fish1, fish2]
            .iter()
            .flatten()
            .map(|fish| fish.verlet_spring_friction)
            .find(|f| *f > 0.0)
            .unwrap_or(self.friction);

        let vec = position(arena, mass1) - position(arena, mass2);
        let distance = vec.length();
        if approximately(distance, 0.0) {
            return;
        }
        let n = vec / distance;
        let f = position_delta(arena, mass1).dot(n) - position_delta(arena, mass2).dot(n);
        let correction = n * f * friction;
        nudge(arena, mass1, -correction);
        nudge(arena, mass2, correction);
    }
}
