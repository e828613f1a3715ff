//! Torsion spring between a mass and a tetrahedron hanging from it.
//!
//! Twist is measured as the accumulated angle of the tetrahedron base
//! around its axis minus the turn of mass1's own forward vector, and is
//! pushed back with tangential forces on the base masses.

use std::f32::consts::PI;

use glam::{Quat, Vec3};

use crate::connection::{nudge, position, position_delta};
use crate::mass::{apply_force, MassArena, MassKey};
use crate::math::{approximately, clamp01, euler_angles, from_euler_angles, kahan_add_f32, look_rotation, normalize_or_zero, slerp};

const MAX_TORSION: f32 = 3.0 * PI;

#[derive(Debug, Clone, PartialEq)]
pub struct TetrahedronTorsionSpring {
    pub tetrahedron: [MassKey; 4],
    pub torsion_stiffness: f32,
    pub torsion_friction: f32,
    pub bend_stiffness: f32,
    pub spring_friction: f32,
    pub bend_friction: f32,
    spring_length: f32,
    length_sqr: f32,
    inv_mass_sum: f32,
    torsion: f32,
    torsion_kahan: f32,
    init_forward: Vec3,
    prev_forward: Vec3,
}

impl TetrahedronTorsionSpring {
    /// Reference directions are taken from the current pose.
    pub fn new(arena: &MassArena, mass1: MassKey, tetrahedron: [MassKey; 4], spring_length: f32) -> Self {
        let rotation = arena.get(mass1).map_or(Quat::IDENTITY, |m| m.rotation);
        let center = base_centroid(arena, &tetrahedron);
        let forward = normalize_or_zero(position(arena, tetrahedron[1]) - center);
        let inv_sum = arena.get(mass1).map_or(0.0, |m| m.raw_inv_mass())
            + arena.get(tetrahedron[0]).map_or(0.0, |m| m.raw_inv_mass());
        Self {
            tetrahedron,
            torsion_stiffness: 0.0,
            torsion_friction: 0.0,
            bend_stiffness: 0.0,
            spring_friction: 0.0,
            bend_friction: 0.0,
            spring_length,
            length_sqr: spring_length * spring_length,
            inv_mass_sum: if inv_sum > 0.0 { 1.0 / inv_sum } else { 0.0 },
            torsion: 0.0,
            torsion_kahan: 0.0,
            init_forward: rotation.inverse() * forward,
            prev_forward: rotation * Vec3::Z,
        }
    }

    pub fn torsion(&self) -> f32 {
        self.torsion
    }

    pub fn set_torsion(&mut self, value: f32) {
        self.torsion = value;
    }

    pub fn spring_length(&self) -> f32 {
        self.spring_length
    }

    pub fn set_spring_length(&mut self, value: f32) {
        self.spring_length = value;
        self.length_sqr = value * value;
    }

    /// Forward direction of the base relative to mass1 when the spring was built
    pub fn initial_forward(&self) -> Vec3 {
        self.init_forward
    }

    pub(crate) fn satisfy(&mut self, arena: &mut MassArena, mass1: MassKey) {
        let apex = self.tetrahedron[0];
        let vec = position(arena, apex) - position(arena, mass1);
        let d2 = vec.dot(vec);
        if d2 > self.length_sqr {
            let s = (self.length_sqr / (d2 + self.length_sqr) - 0.5) * self.inv_mass_sum;
            let inv1 = arena[mass1].raw_inv_mass();
            let inv0 = arena[apex].raw_inv_mass();
            nudge(arena, mass1, -vec * s * inv1);
            nudge(arena, apex, vec * s * inv0);
        }
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey) {
        let t = self.tetrahedron;
        let center = base_centroid(arena, &t);
        let axis = normalize_or_zero(position(arena, t[0]) - center);
        let prev_dir = normalize_or_zero(arena[t[1]].verlet().map_or(Vec3::ZERO, |s| s.prev_position()) - center);
        let dir = normalize_or_zero(position(arena, t[1]) - center);
        let rotation = arena[mass1].rotation;
        let forward = rotation * Vec3::Z;
        let up = rotation * Vec3::Y;

        let base_turn = axis.dot(dir.cross(prev_dir)).clamp(-1.0, 1.0).asin();
        let own_turn = Vec3::Y.dot(forward.cross(self.prev_forward)).clamp(-1.0, 1.0).asin();
        kahan_add_f32(&mut self.torsion, &mut self.torsion_kahan, base_turn - own_turn);
        self.torsion = self.torsion.clamp(-MAX_TORSION, MAX_TORSION);
        self.prev_forward = forward;

        for &key in &t[1..] {
            let tangent = (position(arena, key) - center).cross(axis);
            let velocity = arena[key].velocity;
            let force = tangent * (-self.torsion * self.torsion_stiffness)
                + tangent * (-self.torsion_friction * tangent.dot(velocity));
            apply_force(arena, key, force, false);
        }

        let spring = (position_delta(arena, mass1) - position_delta(arena, t[0])) * self.spring_friction;
        nudge(arena, mass1, -spring);
        nudge(arena, t[0], spring);

        if !approximately(self.bend_stiffness, 0.0) {
            let current = look_rotation(dir, axis);
            let current_euler = euler_angles(current);
            let own_euler = euler_angles(rotation);
            let weight = clamp01(up.dot(axis));
            let target = from_euler_angles(Vec3::new(current_euler.x, own_euler.y, current_euler.z));
            let turned = slerp(current, target, self.bend_stiffness * weight);
            let delta = turned * current.inverse();
            for &key in &t[1..] {
                let p = position(arena, key);
                nudge(arena, key, center + delta * (p - center) - p);
            }
        }

        if approximately(self.bend_friction, 0.0) {
            return;
        }
        for &key in &t[1..] {
            let correction = (position_delta(arena, key) - position_delta(arena, mass1)) * self.bend_friction;
            nudge(arena, key, -correction);
            nudge(arena, mass1, correction);
        }
    }
}

fn base_centroid(arena: &MassArena, t: &[MassKey; 4]) -> Vec3 {
    (position(arena, t[1]) + position(arena, t[2]) + position(arena, t[3])) / 3.0
}
