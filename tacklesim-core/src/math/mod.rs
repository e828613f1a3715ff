//! Vector helpers shared by the solver.
//!
//! Positions and velocities are `glam::Vec3`. The batched force pass
//! packs four lanes into `glam::Vec4` through [`Vector4Ext`].

pub mod bezier;
pub mod geometry;
pub mod parabola;
pub mod splines;
pub mod terrain;
pub mod vector4;

use glam::{EulerRot, Mat3, Quat, Vec3};

pub use bezier::BezierSpline;
pub use parabola::VerticalParabola;
pub use terrain::{ground_height, Terrain};
pub use vector4::Vector4Ext;

/// Double precision vector for long accumulations
pub type Vector3d = glam::DVec3;

/// Smallest positive subnormal `f32`
pub const FLOAT_EPSILON: f32 = 1.4e-45;

/// Squared length under which a vector is treated as zero when normalized
pub const NORMALIZE_EPSILON_SQR: f32 = 1e-10;

/// Relative float comparison that tolerates rounding noise.
///
/// Against zero this only accepts values that are exactly zero or subnormal.
pub fn approximately(a: f32, b: f32) -> bool {
    (b - a).abs() < (1e-6 * a.abs().max(b.abs())).max(FLOAT_EPSILON * 8.0)
}

/// Normalize `v`, returning zero for near-zero input
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let sqr = v.length_squared();
    if sqr > NORMALIZE_EPSILON_SQR {
        v / sqr.sqrt()
    } else {
        Vec3::ZERO
    }
}

pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * clamp01(t)
}

pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * clamp01(t)
}

/// Shortest-arc spherical interpolation with `t` clamped to `[0, 1]`
pub fn slerp(a: Quat, b: Quat, t: f32) -> Quat {
    a.slerp(b, clamp01(t)).normalize()
}

/// Compensated addition: `sum += input` while carrying the lost low bits in `comp`.
pub fn kahan_add(sum: &mut Vec3, comp: &mut Vec3, input: Vec3) {
    let y = input - *comp;
    let t = *sum + y;
    *comp = (t - *sum) - y;
    *sum = t;
}

/// Scalar form of [`kahan_add`]
pub fn kahan_add_f32(sum: &mut f32, comp: &mut f32, input: f32) {
    let y = input - *comp;
    let t = *sum + y;
    *comp = (t - *sum) - y;
    *sum = t;
}

/// Rotation whose local +Z points along `forward` and local +Y leans toward `up`.
///
/// Falls back to identity when either direction is degenerate or they are parallel.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let f = normalize_or_zero(forward);
    if f == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let r = normalize_or_zero(up.cross(f));
    if r == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let u = f.cross(r);
    Quat::from_mat3(&Mat3::from_cols(r, u, f)).normalize()
}

/// Rotation taking direction `from` onto direction `to`
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let a = normalize_or_zero(from);
    let b = normalize_or_zero(to);
    if a == Vec3::ZERO || b == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(a, b)
}

/// Euler angles in radians as `(x, y, z)`, applied in Z, X, Y order.
pub fn euler_angles(q: Quat) -> Vec3 {
    let (y, x, z) = q.to_euler(EulerRot::YXZ);
    Vec3::new(x, y, z)
}

/// Inverse of [`euler_angles`]
pub fn from_euler_angles(angles: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, angles.y, angles.x, angles.z)
}

/// Same as Unity's `Vector3.Angle`, in radians
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.length_squared() * b.length_squared()).sqrt();
    if denom < 1e-15 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_approximately_against_zero_is_strict() {
        assert!(approximately(0.0, 0.0));
        assert!(!approximately(1e-20, 0.0));
        assert!(approximately(1.0, 1.0 + 1e-7));
    }

    #[test]
    fn test_kahan_keeps_small_increments() {
        let mut sum = Vec3::splat(1.0e4);
        let mut comp = Vec3::ZERO;
        for _ in 0..10_000 {
            kahan_add(&mut sum, &mut comp, Vec3::splat(1.0e-4));
        }
        assert_relative_eq!(sum.x, 1.0e4 + 1.0, epsilon = 2e-3);
    }

    #[test]
    fn test_look_rotation_maps_z_to_forward() {
        let q = look_rotation(Vec3::X, Vec3::Y);
        let f = q * Vec3::Z;
        assert_relative_eq!(f.x, 1.0, epsilon = 1e-5);
        let u = q * Vec3::Y;
        assert_relative_eq!(u.y, 1.0, epsilon = 1e-5);
        assert_eq!(look_rotation(Vec3::Y, Vec3::Y), Quat::IDENTITY);
    }

    #[test]
    fn test_euler_round_trip() {
        let q = from_euler_angles(Vec3::new(0.3, -0.7, 0.2));
        let e = euler_angles(q);
        assert_relative_eq!(e.x, 0.3, epsilon = 1e-4);
        assert_relative_eq!(e.y, -0.7, epsilon = 1e-4);
        assert_relative_eq!(e.z, 0.2, epsilon = 1e-4);
    }
}
