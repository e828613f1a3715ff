use glam::Vec3;

use super::{Collider, ColliderMaterial, Contact, DensityType};
use crate::math::approximately;

/// Cylinder of `radius` around segment `start..end`, closed by hemispheres
#[derive(Debug, Clone, PartialEq)]
pub struct CapsuleCollider {
    start: Vec3,
    end: Vec3,
    axis: Vec3,
    length: f32,
    radius: f32,
    pub material: ColliderMaterial,
}

impl CapsuleCollider {
    pub fn new(start: Vec3, end: Vec3, radius: f32) -> Self {
        let length = (end - start).length();
        let axis = if length > 0.0 { (end - start) / length } else { Vec3::Y };
        Self { start, end, axis, length, radius, material: ColliderMaterial::default() }
    }

    pub fn with_material(mut self, material: ColliderMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn ends(&self) -> (Vec3, Vec3) {
        (self.start, self.end)
    }

    /// Radial direction used when the point sits exactly on the axis
    fn fallback_radial(&self) -> Vec3 {
        let n = self.axis.cross(Vec3::Y);
        let n = if n.abs_diff_eq(Vec3::ZERO, 1e-6) { self.axis.cross(Vec3::X) } else { n };
        n.normalize_or_zero()
    }

    fn cap_contact(&self, point: Vec3, center: Vec3, outward: Vec3) -> Option<Contact> {
        let offset = point - center;
        let distance = offset.length();
        if distance >= self.radius {
            return None;
        }
        let normal = if distance > 0.0 { offset / distance } else { outward };
        Some(Contact { push: center + normal * self.radius - point, normal })
    }
}

impl Collider for CapsuleCollider {
    fn test_point(&self, point: Vec3, _prior: Vec3) -> Option<Contact> {
        let rel = point - self.start;
        let t = rel.dot(self.axis);
        if t > 0.0 && t < self.length {
            let radial = rel - self.axis * t;
            let distance = radial.length();
            if distance >= self.radius {
                return None;
            }
            let normal = if approximately(distance, 0.0) { self.fallback_radial() } else { radial / distance };
            return Some(Contact { push: self.start + self.axis * t + normal * self.radius - point, normal });
        }
        if t <= 0.0 && t > -self.radius {
            return self.cap_contact(point, self.start, -self.axis);
        }
        if t >= self.length && t < self.length + self.radius {
            return self.cap_contact(point, self.end, self.axis);
        }
        None
    }

    fn density(&self) -> DensityType {
        self.material.density
    }

    fn friction_factor(&self) -> f32 {
        self.material.friction_factor
    }
}
