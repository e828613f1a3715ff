use glam::{Vec3, Vec4};

use super::{approximately, NORMALIZE_EPSILON_SQR};

/// Lane rotation applied by [`Vector4Ext::shuffle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shuffle {
    /// `(x, y, z, w)` becomes `(w, x, y, z)`
    RotateRight,
    /// `(x, y, z, w)` becomes `(y, z, w, x)`
    RotateLeft,
}

/// SIMD-style operations on four-lane vectors.
///
/// Three-dimensional helpers ignore the `w` lane.
pub trait Vector4Ext {
    /// Pairwise sums: `(x + y, z + w, o.x + o.y, o.z + o.w)`
    fn horizontal_add(self, other: Vec4) -> Vec4;
    fn shuffle(self, sel: Shuffle) -> Vec4;
    /// `(x, x, y, y)`
    fn duplicate_low(self) -> Vec4;
    fn dot3(self, other: Vec4) -> f32;
    fn cross3(self, other: Vec4) -> Vec4;
    fn magnitude3(self) -> f32;
    fn normalized3(self) -> Vec4;
    /// Lane-wise `1 / sqrt(x)`, zero where the lane is not positive
    fn rsqrt(self) -> Vec4;
    fn approx_eq(self, other: Vec4) -> bool;
    /// Lane-wise `1.0` where `self <= other`, else `0.0`
    fn le_mask(self, other: Vec4) -> Vec4;
    fn from_vec3(v: Vec3) -> Vec4;
}

impl Vector4Ext for Vec4 {
    fn horizontal_add(self, other: Vec4) -> Vec4 {
        Vec4::new(self.x + self.y, self.z + self.w, other.x + other.y, other.z + other.w)
    }

    fn shuffle(self, sel: Shuffle) -> Vec4 {
        match sel {
            Shuffle::RotateRight => Vec4::new(self.w, self.x, self.y, self.z),
            Shuffle::RotateLeft => Vec4::new(self.y, self.z, self.w, self.x),
        }
    }

    fn duplicate_low(self) -> Vec4 {
        Vec4::new(self.x, self.x, self.y, self.y)
    }

    fn dot3(self, other: Vec4) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross3(self, other: Vec4) -> Vec4 {
        self.truncate().cross(other.truncate()).extend(0.0)
    }

    fn magnitude3(self) -> f32 {
        self.dot3(self).sqrt()
    }

    fn normalized3(self) -> Vec4 {
        let sqr = self.dot3(self);
        if sqr > NORMALIZE_EPSILON_SQR {
            (self.truncate() / sqr.sqrt()).extend(0.0)
        } else {
            Vec4::ZERO
        }
    }

    fn rsqrt(self) -> Vec4 {
        let lane = |x: f32| if x > 0.0 { 1.0 / x.sqrt() } else { 0.0 };
        Vec4::new(lane(self.x), lane(self.y), lane(self.z), lane(self.w))
    }

    fn approx_eq(self, other: Vec4) -> bool {
        approximately(self.x, other.x)
            && approximately(self.y, other.y)
            && approximately(self.z, other.z)
            && approximately(self.w, other.w)
    }

    fn le_mask(self, other: Vec4) -> Vec4 {
        Vec4::select(self.cmple(other), Vec4::ONE, Vec4::ZERO)
    }

    fn from_vec3(v: Vec3) -> Vec4 {
        v.extend(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_length_of_xz() {
        // The force pass measures horizontal speed this way
        let v = Vec4::new(3.0, 100.0, 4.0, 0.0);
        let low = v.duplicate_low();
        assert_eq!(low, Vec4::new(3.0, 3.0, 100.0, 100.0));
        let xz = Vec4::new(v.x, v.z, 0.0, 0.0);
        let sq = xz * xz;
        assert_eq!(sq.horizontal_add(sq).x.sqrt(), 5.0);
    }

    #[test]
    fn test_shuffle_rotations_are_inverse() {
        let v = Vec4::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(v.shuffle(Shuffle::RotateRight), Vec4::new(4.0, 1.0, 2.0, 3.0));
        assert_eq!(v.shuffle(Shuffle::RotateRight).shuffle(Shuffle::RotateLeft), v);
    }

    #[test]
    fn test_normalized3_guards_zero() {
        assert_eq!(Vec4::ZERO.normalized3(), Vec4::ZERO);
        assert_eq!(Vec4::new(0.0, 2.0, 0.0, 9.0).normalized3(), Vec4::new(0.0, 1.0, 0.0, 0.0));
        assert_eq!(Vec4::new(4.0, -1.0, 0.0, 1.0).le_mask(Vec4::ZERO), Vec4::new(0.0, 1.0, 1.0, 0.0));
    }
}
