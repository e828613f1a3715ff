use glam::{Quat, Vec3};

use super::{sign, Collider, ColliderMaterial, Contact, DensityType};

/// Oriented box. `half_extents` maps the unit cube onto the box.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider {
    position: Vec3,
    half_extents: Vec3,
    rotation: Quat,
    inv_rotation: Quat,
    pub material: ColliderMaterial,
}

impl BoxCollider {
    pub fn new(position: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        let rotation = rotation.normalize();
        Self {
            position,
            half_extents,
            rotation,
            inv_rotation: rotation.inverse(),
            material: ColliderMaterial::default(),
        }
    }

    pub fn with_material(mut self, material: ColliderMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.inv_rotation = self.rotation.inverse();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn sync(&mut self, source: &BoxCollider) {
        self.position = source.position;
        self.half_extents = source.half_extents;
        self.set_rotation(source.rotation);
    }

    fn to_unit(&self, point: Vec3) -> Vec3 {
        (self.inv_rotation * (point - self.position)) / self.half_extents
    }
}

impl Collider for BoxCollider {
    fn test_point(&self, point: Vec3, _prior: Vec3) -> Option<Contact> {
        let local = self.to_unit(point);
        if local.abs().max_element() > 1.0 {
            return None;
        }

        // Leave through the face with the least depth
        let depth = Vec3::ONE - local.abs();
        let (axis, d) = if depth.y < depth.x && depth.y < depth.z {
            (Vec3::Y, depth.y)
        } else if depth.z < depth.x {
            (Vec3::Z, depth.z)
        } else {
            (Vec3::X, depth.x)
        };
        let local_push = axis * d * sign(local.dot(axis));
        let push = self.rotation * (local_push * self.half_extents);
        if push == Vec3::ZERO {
            return None;
        }
        Some(Contact { push, normal: self.rotation * local_push.normalize_or_zero() })
    }

    fn density(&self) -> DensityType {
        self.material.density
    }

    fn friction_factor(&self) -> f32 {
        self.material.friction_factor
    }

    fn position(&self) -> Option<Vec3> {
        Some(self.position)
    }

    fn force_damping(&self) -> Option<Vec3> {
        Some(self.material.force_damping)
    }
}
