//! Ball joint between two mass tetrahedra.
//!
//! Apex 0 of the second tetrahedron is held at the base centroid of the
//! first, and both bases are turned towards each other's orientation.
//! The sum of all eight positions is preserved.

use std::f32::consts::PI;

use glam::{Quat, Vec3};

use crate::connection::{nudge, position, position_delta};
use crate::mass::{MassArena, MassKey};
use crate::math::{look_rotation, normalize_or_zero, slerp};

pub const DEFAULT_FRICTION: f32 = 0.003;
pub const BASE_STIFFNESS: f32 = 0.099999994;

const ONE_THIRD: f32 = 0.333;

/// Sinusoidal bend layered on the joint's rest orientation
#[derive(Debug, Clone, PartialEq)]
pub struct WaveDeviation {
    pub frequency: f32,
    pub phase: f32,
    pub amplitude: f32,
    pub multiplier: f32,
    pub axis: Vec3,
    /// Masses whose travel along their chord advances the wave
    pub chord: Option<(MassKey, MassKey)>,
    path_accum: f32,
}

impl Default for WaveDeviation {
    fn default() -> Self {
        Self { frequency: 0.0, phase: 0.0, amplitude: 0.0, multiplier: 1.0, axis: Vec3::Y, chord: None, path_accum: 0.0 }
    }
}

impl WaveDeviation {
    pub fn path_accum(&self) -> f32 {
        self.path_accum
    }

    fn rotation(&mut self, arena: &MassArena, bend_angle: f32) -> Quat {
        if let Some((first, second)) = self.chord {
            let chord = normalize_or_zero(position(arena, first) - position(arena, second));
            let travel = arena.get(first).map_or(0.0, |m| m.path_delta().dot(chord));
            self.path_accum += travel.abs().min(0.002) * self.frequency * 2.0;
            self.path_accum %= 1.0;
        }
        let offset = self.multiplier * self.amplitude * (-self.path_accum * PI * 2.0 + self.phase).sin();
        let axis = normalize_or_zero(self.axis);
        if axis == Vec3::ZERO {
            return Quat::IDENTITY;
        }
        Quat::from_axis_angle(axis, bend_angle + offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TetrahedronWithBall {
    pub tetrahedron1: [MassKey; 4],
    pub tetrahedron2: [MassKey; 4],
    pub stiffness: f32,
    pub friction: f32,
    pub stiffness_multiplier: f32,
    pub bend_angle: f32,
    pub wave: WaveDeviation,
}

impl TetrahedronWithBall {
    pub fn new(tetrahedron1: [MassKey; 4], tetrahedron2: [MassKey; 4], stiffness: f32, friction: f32) -> Self {
        Self {
            tetrahedron1,
            tetrahedron2,
            stiffness,
            friction,
            stiffness_multiplier: 1.0,
            bend_angle: 0.0,
            wave: WaveDeviation::default(),
        }
    }

    fn all(&self) -> [MassKey; 8] {
        let (a, b) = (self.tetrahedron1, self.tetrahedron2);
        [a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]]
    }

    fn sum(&self, arena: &MassArena) -> Vec3 {
        self.all().iter().map(|k| position(arena, *k)).sum()
    }

    fn base_centroid(arena: &MassArena, t: &[MassKey; 4]) -> Vec3 {
        (position(arena, t[1]) + position(arena, t[2]) + position(arena, t[3])) * ONE_THIRD
    }

    /// Rotate the base of `t` about `center` by `rotation`
    fn turn_base(arena: &mut MassArena, t: &[MassKey; 4], center: Vec3, rotation: Quat) {
        for &key in &t[1..] {
            let p = position(arena, key);
            let moved = center + rotation * (p - center);
            nudge(arena, key, moved - p);
        }
    }

    pub(crate) fn satisfy(&mut self, arena: &mut MassArena) {
        let (t1, t2) = (self.tetrahedron1, self.tetrahedron2);
        let sum_before = self.sum(arena);
        let wave = self.wave.rotation(arena, self.bend_angle);

        let c1 = Self::base_centroid(arena, &t1);
        let mut pull = (position(arena, t2[0]) - c1) * 0.5;
        nudge(arena, t2[0], -pull);
        pull *= ONE_THIRD;
        for &key in &t1[1..] {
            nudge(arena, key, pull);
        }

        let c2 = Self::base_centroid(arena, &t2);
        let up1 = -normalize_or_zero(position(arena, t1[0]) - c1);
        let up2 = -normalize_or_zero(position(arena, t2[0]) - c2);
        let q1 = look_rotation(normalize_or_zero(c1 - position(arena, t1[3])), up1);
        let q2 = look_rotation(normalize_or_zero(c2 - position(arena, t2[3])), up2);

        let t = self.stiffness * self.stiffness_multiplier * BASE_STIFFNESS;
        let target1 = slerp(q1, q2 * wave.inverse(), t);
        let target2 = slerp(q2, q1 * wave, t);
        Self::turn_base(arena, &t1, c1, target1 * q1.inverse());
        Self::turn_base(arena, &t2, c2, target2 * q2.inverse());

        let shift = (self.sum(arena) - sum_before) * 0.125;
        for key in self.all() {
            nudge(arena, key, -shift);
        }
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena) {
        for i in 0..4 {
            let (a, b) = (self.tetrahedron1[i], self.tetrahedron2[i]);
            let correction = (position_delta(arena, a) - position_delta(arena, b)) * self.friction;
            nudge(arena, a, -correction);
            nudge(arena, b, correction);
        }
    }
}
