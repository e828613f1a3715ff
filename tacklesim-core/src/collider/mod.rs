//! Point-sample collision primitives.
//!
//! Every collider answers one query: given a candidate point and the point
//! it moved from, how far must it be pushed to leave the solid, and along
//! which normal. Masses test their colliders in assignment order and apply
//! each push before testing the next one.

mod box_collider;
mod capsule;
mod heightfield;
mod sphere;

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use box_collider::BoxCollider;
pub use capsule::CapsuleCollider;
pub use heightfield::PlaneSudokuCollider;
pub use sphere::SphereCollider;

/// How strongly a surface holds on to a mass that has sunk into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DensityType {
    #[default]
    None,
    /// Pushes the mass back out
    Solid,
    /// Lets the mass through while damping it
    Sparse,
    /// Can trap the mass in place
    Sticky,
}

/// Penetration found by [`Collider::test_point`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Offset that moves the tested point back onto the surface
    pub push: Vec3,
    /// Unit surface normal at the contact
    pub normal: Vec3,
}

/// Surface response shared by the primitive colliders
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderMaterial {
    pub density: DensityType,
    /// Share of the normal velocity removed on non-solid contacts
    pub friction_factor: f32,
    /// Drag a sticky surface exerts on a mass resting at its level
    pub force_damping: Vec3,
}

impl Default for ColliderMaterial {
    fn default() -> Self {
        Self { density: DensityType::Solid, friction_factor: 0.0, force_damping: Vec3::ZERO }
    }
}

pub trait Collider: fmt::Debug {
    /// Push-out for `point`, or `None` when it is outside the solid
    fn test_point(&self, point: Vec3, prior: Vec3) -> Option<Contact>;

    fn density(&self) -> DensityType;

    fn friction_factor(&self) -> f32;

    /// Reference position used by sticky surfaces. `None` for shapes without one.
    fn position(&self) -> Option<Vec3> {
        None
    }

    /// Damping used by sticky surfaces. `None` for shapes without one.
    fn force_damping(&self) -> Option<Vec3> {
        None
    }
}

/// Sign that treats zero as positive
pub(crate) fn sign(x: f32) -> f32 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}
