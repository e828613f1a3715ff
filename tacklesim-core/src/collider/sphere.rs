use glam::Vec3;

use super::{Collider, ColliderMaterial, Contact, DensityType};
use crate::math::approximately;

#[derive(Debug, Clone, PartialEq)]
pub struct SphereCollider {
    pub center: Vec3,
    pub radius: f32,
    pub material: ColliderMaterial,
}

impl SphereCollider {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius, material: ColliderMaterial::default() }
    }

    pub fn with_material(mut self, material: ColliderMaterial) -> Self {
        self.material = material;
        self
    }
}

impl Collider for SphereCollider {
    fn test_point(&self, point: Vec3, _prior: Vec3) -> Option<Contact> {
        let offset = point - self.center;
        let distance = offset.length();
        if distance >= self.radius {
            return None;
        }
        // A point at the exact center leaves upwards
        let normal = if approximately(distance, 0.0) { Vec3::Y } else { offset / distance };
        Some(Contact { push: normal * (self.radius - distance), normal })
    }

    fn density(&self) -> DensityType {
        self.material.density
    }

    fn friction_factor(&self) -> f32 {
        self.material.friction_factor
    }

    fn position(&self) -> Option<Vec3> {
        Some(self.center)
    }

    fn force_damping(&self) -> Option<Vec3> {
        Some(self.material.force_damping)
    }
}
