//! Rigid bodies: a point mass with orientation, angular velocity and a
//! diagonal inertia tensor.

use std::f32::consts::PI;

use glam::{Mat3, Quat, Vec3};
use tracing::error;

use super::{CollisionType, Mass, MassKind};
use crate::config::TIME_QUANT;
use crate::error::{PhysicsError, Result};
use crate::math::{approximately, kahan_add};
use crate::simulation::StepContext;

pub const MAX_ANGULAR_VELOCITY: f32 = 20.0 * PI;
pub const MAX_CONTACTS: usize = 20;

/// Inertia of a solid box with the given mass and edge lengths
pub fn box_inertia(mass: f32, width: f32, height: f32, depth: f32) -> Vec3 {
    let k = mass / 12.0;
    Vec3::new(
        k * (height * height + depth * depth),
        k * (width * width + depth * depth),
        k * (width * width + height * height),
    )
}

/// Externally detected contact between a body and the world
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactPoint {
    pub point: Vec3,
    pub normal: Vec3,
    /// Point on the body in body space
    pub local_point: Vec3,
    pub distance: f32,
    pub friction: f32,
    pub bounce: f32,
}

#[derive(Debug, Clone)]
pub struct RigidBodyState {
    pub(crate) inertia_tensor: Vec3,
    pub(crate) world_inertia: Vec3,
    pub(crate) world_inverse_inertia: Mat3,
    pub(crate) inv_rotation: Quat,
    pub(crate) angular_velocity: Vec3,
    pub(crate) torque: Vec3,
    pub(crate) angle_kahan: Vec3,
    pub(crate) rotation_damping: f32,
    pub(crate) underwater_rotation_damping: f32,
    pub(crate) dimensions: Vec3,
    pub(crate) buoyancy_normal: Vec3,
    pub(crate) rotational_buoyancy_factor: f32,
    pub(crate) water_y: f32,
    pub(crate) axial_water_drag_factors: Vec3,
    pub(crate) axial_water_drag_enabled: bool,
    pub(crate) contacts: Vec<ContactPoint>,
    pub(crate) bounce_factor: f32,
    pub(crate) extrude_factor: f32,
    pub(crate) collision_impulse_velocity: Vec3,
}

impl RigidBodyState {
    /// Body of `mass` with uniform inertia and a cube of edge `2 * radius`.
    pub fn new(mass: f32, radius: f32) -> Result<Self> {
        let mut state = Self {
            inertia_tensor: Vec3::splat(0.4 * mass),
            world_inertia: Vec3::ONE,
            world_inverse_inertia: Mat3::IDENTITY,
            inv_rotation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            torque: Vec3::ZERO,
            angle_kahan: Vec3::ZERO,
            rotation_damping: 1.0,
            underwater_rotation_damping: 1.0,
            dimensions: Vec3::splat(radius * 2.0),
            buoyancy_normal: Vec3::Y,
            rotational_buoyancy_factor: 0.0,
            water_y: 0.0,
            axial_water_drag_factors: Vec3::ONE,
            axial_water_drag_enabled: true,
            contacts: Vec::new(),
            bounce_factor: 0.0,
            extrude_factor: 0.01,
            collision_impulse_velocity: Vec3::ZERO,
        };
        state.update_world_inertia(Quat::IDENTITY);
        state.check_inertia()?;
        Ok(state)
    }

    fn check_inertia(&self) -> Result<()> {
        for (axis, value) in [('x', self.world_inertia.x), ('y', self.world_inertia.y), ('z', self.world_inertia.z)] {
            if approximately(value, 0.0) {
                return Err(PhysicsError::DegenerateInertia { axis, value });
            }
        }
        Ok(())
    }

    /// Rotate the body-space tensor into world space
    pub(crate) fn update_world_inertia(&mut self, rotation: Quat) {
        let r = Mat3::from_quat(rotation);
        let world = r * Mat3::from_diagonal(self.inertia_tensor) * r.transpose();
        self.world_inertia = Vec3::new(world.x_axis.x, world.y_axis.y, world.z_axis.z);
        let inv_diag = Vec3::new(
            safe_inv(self.inertia_tensor.x),
            safe_inv(self.inertia_tensor.y),
            safe_inv(self.inertia_tensor.z),
        );
        self.world_inverse_inertia = r * Mat3::from_diagonal(inv_diag) * r.transpose();
        self.inv_rotation = rotation.inverse();
    }

    pub fn inertia_tensor(&self) -> Vec3 {
        self.inertia_tensor
    }

    pub fn world_inertia(&self) -> Vec3 {
        self.world_inertia
    }

    pub fn world_inverse_inertia(&self) -> Mat3 {
        self.world_inverse_inertia
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Runtime write. A non-finite value is logged and dropped.
    pub fn set_angular_velocity(&mut self, value: Vec3) -> bool {
        if let Err(err) = self.try_set_angular_velocity(value) {
            error!(%err, "discarding angular velocity write");
            return false;
        }
        true
    }

    /// Configuration write. A non-finite value is a hard error.
    pub fn try_set_angular_velocity(&mut self, value: Vec3) -> Result<()> {
        if !value.is_finite() {
            return Err(PhysicsError::NonFiniteAngularVelocity(value));
        }
        self.angular_velocity = value;
        Ok(())
    }

    /// Check the state a body is built from
    pub(crate) fn validate(&self) -> Result<()> {
        self.check_inertia()?;
        if !self.angular_velocity.is_finite() {
            return Err(PhysicsError::NonFiniteAngularVelocity(self.angular_velocity));
        }
        Ok(())
    }

    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    pub fn dimensions(&self) -> Vec3 {
        self.dimensions
    }

    pub fn set_dimensions(&mut self, value: Vec3) {
        self.dimensions = value;
    }

    pub fn set_rotation_damping(&mut self, value: f32) {
        self.rotation_damping = value;
    }

    pub fn set_underwater_rotation_damping(&mut self, value: f32) {
        self.underwater_rotation_damping = value;
    }

    pub fn set_buoyancy_normal(&mut self, value: Vec3) {
        self.buoyancy_normal = value;
    }

    pub fn set_rotational_buoyancy_factor(&mut self, value: f32) {
        self.rotational_buoyancy_factor = value;
    }

    pub fn set_water_y(&mut self, value: f32) {
        self.water_y = value;
    }

    pub fn set_axial_water_drag(&mut self, factors: Vec3, enabled: bool) {
        self.axial_water_drag_factors = factors;
        self.axial_water_drag_enabled = enabled;
    }

    pub fn set_bounce_factor(&mut self, value: f32) {
        self.bounce_factor = value;
    }

    pub fn set_extrude_factor(&mut self, value: f32) {
        self.extrude_factor = value;
    }

    pub fn contacts(&self) -> &[ContactPoint] {
        &self.contacts
    }

    /// Replace the contact buffer. Contacts past [`MAX_CONTACTS`] are dropped.
    pub fn set_contacts(&mut self, contacts: &[ContactPoint]) {
        self.contacts.clear();
        self.contacts.extend(contacts.iter().take(MAX_CONTACTS).copied());
    }

    /// Velocity change from contact impulses since the last read
    pub fn take_collision_impulse_velocity(&mut self) -> Vec3 {
        std::mem::take(&mut self.collision_impulse_velocity)
    }
}

fn safe_inv(x: f32) -> f32 {
    if x == 0.0 {
        0.0
    } else {
        1.0 / x
    }
}

impl Mass {
    pub fn rigid_body(&self) -> Option<&RigidBodyState> {
        match &self.kind {
            MassKind::RigidBody(body) => Some(body.as_ref()),
            _ => None,
        }
    }

    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBodyState> {
        match &mut self.kind {
            MassKind::RigidBody(body) => Some(body.as_mut()),
            _ => None,
        }
    }

    /// Replace the body-space inertia. Rejects tensors with a zero axis.
    pub fn set_inertia_tensor(&mut self, tensor: Vec3) -> Result<()> {
        let rotation = self.rotation;
        let Some(body) = self.rigid_body_mut() else {
            return Ok(());
        };
        let previous = body.inertia_tensor;
        body.inertia_tensor = tensor;
        body.update_world_inertia(rotation);
        if let Err(err) = body.check_inertia() {
            body.inertia_tensor = previous;
            body.update_world_inertia(rotation);
            return Err(err);
        }
        Ok(())
    }

    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.rotation * local + self.position
    }

    pub fn world_to_local(&self, world: Vec3) -> Vec3 {
        let inv = self.rigid_body().map_or_else(|| self.rotation.inverse(), |b| b.inv_rotation);
        inv * (world - self.position)
    }

    /// Velocity of a body-space point
    pub fn point_velocity(&self, local: Vec3) -> Vec3 {
        let omega = self.rigid_body().map_or(Vec3::ZERO, |b| b.angular_velocity);
        self.velocity + omega.cross(self.rotation * local)
    }

    /// Force at a body-space point: adds the force and its torque
    pub fn apply_force_at(&mut self, force: Vec3, local: Vec3, capture: bool) {
        self.apply_force(force, capture);
        if self.is_kinematic {
            return;
        }
        let arm = self.rotation * local;
        if let MassKind::RigidBody(body) = &mut self.kind {
            body.torque += arm.cross(force);
        }
    }

    pub fn apply_local_force(&mut self, local_force: Vec3, local: Vec3) {
        let force = self.rotation * local_force;
        self.apply_force_at(force, local, false);
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_kinematic {
            return;
        }
        if let MassKind::RigidBody(body) = &mut self.kind {
            body.torque += torque;
        }
    }

    /// Instant change of linear and angular velocity at a body-space point
    pub fn apply_impulse_at(&mut self, impulse: Vec3, local: Vec3) {
        if self.is_kinematic {
            return;
        }
        let arm = self.rotation * local;
        if let MassKind::RigidBody(body) = &mut self.kind {
            let dw = arm.cross(impulse) / body.world_inertia;
            kahan_add(&mut body.angular_velocity, &mut body.angle_kahan, dw);
        }
        self.velocity += impulse * self.inv_mass;
    }

    /// Torque turning `buoyancy_normal` towards world up
    pub fn update_buoyant_rotation(&mut self) {
        let rotation = self.rotation;
        if let MassKind::RigidBody(body) = &mut self.kind {
            let turn = (rotation * body.buoyancy_normal).cross(Vec3::Y);
            body.torque += body.inv_rotation * turn * body.rotational_buoyancy_factor;
        }
    }

    /// Per-axis quadratic drag against the water in body space
    pub fn update_axial_water_drag(&mut self) {
        let Some(body) = self.rigid_body() else {
            return;
        };
        let factors = body.axial_water_drag_factors;
        let local = body.inv_rotation * (self.flow_velocity - self.velocity);
        for (axis, value, factor) in [(Vec3::X, local.x, factors.x), (Vec3::Y, local.y, factors.y), (Vec3::Z, local.z, factors.z)] {
            let magnitude = value * value.abs().max(1.0) * factor;
            if magnitude != 0.0 {
                self.apply_local_force(axis * magnitude, Vec3::ZERO);
            }
        }
    }

    /// Impulse based resolution of the contact buffer
    pub fn resolve_collisions(&mut self, frame_delta_time: f32) {
        let Some(body) = self.rigid_body() else {
            return;
        };
        let mut contacts = body.contacts.clone();
        let dimensions = body.dimensions;
        let extrude = body.extrude_factor;
        let bounce = body.bounce_factor;
        let before = self.velocity;

        for contact in contacts.iter_mut() {
            let lp = contact.local_point;
            let world_point = self.local_to_world(lp);
            let depth = (world_point - contact.point).dot(contact.normal);
            let within = lp.x.abs() <= dimensions.x && lp.y.abs() <= dimensions.y && lp.z.abs() <= dimensions.z;
            if !within || depth >= 0.0 {
                continue;
            }
            let n = contact.normal;
            let pv = self.point_velocity(lp);
            let vn = pv.dot(n);
            let tangent = pv - n * vn;
            let friction = tangent - self.friction_velocity(pv, tangent, frame_delta_time);
            let extrusion = if frame_delta_time > 0.0 { -extrude * depth / frame_delta_time } else { 0.0 };
            contact.distance += extrusion * TIME_QUANT;
            if vn < 2.0 * extrusion {
                let r = contact.point - self.position;
                let world_inertia = self.rigid_body().map_or(Vec3::ONE, |b| b.world_inertia);
                let denom = self.inv_mass + n.dot((r.cross(n) / world_inertia).cross(r));
                if denom != 0.0 {
                    let impulse = (n * (extrusion - (1.0 + bounce) * vn) - friction) / denom;
                    self.apply_impulse_at(impulse, lp);
                }
            }
        }

        let after = self.velocity;
        if let MassKind::RigidBody(body) = &mut self.kind {
            body.contacts = contacts;
            body.collision_impulse_velocity += after - before;
        }
    }
}

/// Environment torques, contacts, the plain linear step, then rotation.
pub(crate) fn simulate(mass: &mut Mass, ctx: &StepContext) {
    let Some(body) = mass.rigid_body() else {
        return;
    };
    if mass.position.y <= body.water_y && body.axial_water_drag_enabled {
        mass.update_axial_water_drag();
    }
    if mass.collision == CollisionType::RigidbodyContacts {
        mass.resolve_collisions(ctx.frame_delta_time);
    }
    mass.update_buoyant_rotation();

    mass.simulate_plain(ctx);
    if mass.is_kinematic {
        return;
    }

    let y = mass.position.y;
    let mut rotation = mass.rotation;
    let MassKind::RigidBody(body) = &mut mass.kind else {
        return;
    };
    let damping = if y <= body.water_y { body.underwater_rotation_damping } else { body.rotation_damping };
    body.angular_velocity *= damping.powf(TIME_QUANT);

    let angular_step = body.world_inverse_inertia * body.torque * TIME_QUANT;
    kahan_add(&mut body.angular_velocity, &mut body.angle_kahan, angular_step);

    let speed = body.angular_velocity.length();
    if speed > MAX_ANGULAR_VELOCITY {
        body.angular_velocity *= MAX_ANGULAR_VELOCITY / speed;
    }

    let turn = body.angular_velocity * TIME_QUANT;
    let angle = turn.length();
    if !approximately(angle, 0.0) {
        rotation = Quat::from_axis_angle(turn / angle, angle) * rotation;
    }
    rotation = rotation.normalize();
    body.update_world_inertia(rotation);
    mass.rotation = rotation;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_inertia() {
        let i = box_inertia(12.0, 1.0, 2.0, 3.0);
        assert_eq!(i, Vec3::new(13.0, 10.0, 5.0));
    }

    #[test]
    fn test_zero_mass_body_is_degenerate() {
        assert!(matches!(RigidBodyState::new(0.0, 0.1), Err(PhysicsError::DegenerateInertia { axis: 'x', .. })));
    }

    #[test]
    fn test_world_inertia_follows_rotation() {
        let mut body = RigidBodyState::new(1.0, 0.1).unwrap();
        body.inertia_tensor = Vec3::new(1.0, 2.0, 3.0);
        body.update_world_inertia(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // A quarter turn about z swaps the x and y moments
        assert!((body.world_inertia.x - 2.0).abs() < 1e-5);
        assert!((body.world_inertia.y - 1.0).abs() < 1e-5);
        assert!((body.world_inertia.z - 3.0).abs() < 1e-5);
    }
}
