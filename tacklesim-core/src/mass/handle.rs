use std::ops::Deref;

use glam::{Quat, Vec3};

use super::{apply_force, CollisionType, Mass, MassArena, MassKey, MassKind, MassType};
use crate::listener::{notify, PhysicsEvent, PhysicsListener};

/// Mutable access to one mass that reports every change to the listener.
///
/// Reads go through `Deref<Target = Mass>`. Writes that should stay silent
/// can use [`MassMut::quiet`].
pub struct MassMut<'a> {
    arena: &'a mut MassArena,
    key: MassKey,
    listener: &'a mut Option<Box<dyn PhysicsListener>>,
}

impl<'a> MassMut<'a> {
    /// `None` when `key` is not in `arena`
    pub(crate) fn new(
        arena: &'a mut MassArena,
        key: MassKey,
        listener: &'a mut Option<Box<dyn PhysicsListener>>,
    ) -> Option<Self> {
        if arena.contains_key(key) {
            Some(Self { arena, key, listener })
        } else {
            None
        }
    }

    pub fn key(&self) -> MassKey {
        self.key
    }

    /// Direct access without notifications
    pub fn quiet(&mut self) -> &mut Mass {
        &mut self.arena[self.key]
    }

    fn emit(&mut self, event: PhysicsEvent) {
        notify(self.listener, event);
    }

    pub fn set_position(&mut self, position: Vec3) {
        if self.quiet().set_position(position) {
            let uid = self.uid();
            self.emit(PhysicsEvent::ChangeMassPosition { uid, position });
        }
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.quiet().set_rotation(rotation);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassRotation { uid, rotation });
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.quiet().set_velocity(velocity);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassVelocity { uid, velocity });
    }

    /// Accumulate a force; points of a rigid body forward it to their parent.
    pub fn apply_force(&mut self, force: Vec3, capture: bool) {
        apply_force(self.arena, self.key, force, capture);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassAppliedForce { uid, force });
    }

    pub fn set_motor(&mut self, motor: Vec3) {
        self.quiet().set_motor(motor);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassMotor { uid, motor });
    }

    pub fn set_water_motor(&mut self, motor: Vec3) {
        self.quiet().set_water_motor(motor);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassWaterMotor { uid, motor });
    }

    pub fn set_mass(&mut self, value: f32) {
        self.quiet().set_mass(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassValue { uid, value });
    }

    pub fn set_kinematic(&mut self, value: bool) {
        self.quiet().set_kinematic(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassIsKinematic { uid, value });
    }

    pub fn set_freeze(&mut self, value: bool) {
        self.quiet().set_freeze(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassIsFreeze { uid, value });
    }

    pub fn set_ref(&mut self, value: bool) {
        self.quiet().set_ref(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassIsRef { uid, value });
    }

    pub fn set_visual_offset(&mut self, offset: Vec3) {
        self.quiet().set_visual_offset(offset);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassVisualPositionOffset { uid, offset });
    }

    pub fn set_air_drag(&mut self, value: f32) {
        self.quiet().set_air_drag(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassAirDrag { uid, value });
    }

    pub fn set_water_drag(&mut self, value: f32) {
        self.quiet().set_water_drag(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassWaterDrag { uid, value });
    }

    pub fn set_buoyancy(&mut self, value: f32) {
        self.quiet().set_buoyancy(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassBuoyancy { uid, value });
    }

    pub fn set_buoyancy_speed_factor(&mut self, value: f32) {
        self.quiet().set_buoyancy_speed_factor(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassBuoyancySpeedFactor { uid, value });
    }

    pub fn set_velocity_limit(&mut self, value: f32) {
        self.quiet().set_velocity_limit(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassVelocityLimit { uid, value });
    }

    pub fn set_mass_type(&mut self, mass_type: MassType) {
        self.quiet().set_mass_type(mass_type);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassType { uid, mass_type });
    }

    pub fn set_disable_simulation(&mut self, value: bool) {
        self.quiet().set_disable_simulation(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassDisableSimulation { uid, value });
    }

    pub fn set_collision(&mut self, collision: CollisionType) {
        self.quiet().set_collision(collision);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassCollisionType { uid, collision });
    }

    pub fn set_force_factor(&mut self, value: f32) {
        self.quiet().set_force_factor(value);
        let uid = self.uid();
        self.emit(PhysicsEvent::ChangeMassForceFactor { uid, value });
    }

    /// Move a welded point within its parent's body space
    pub fn set_local_position(&mut self, position: Vec3) {
        if let MassKind::PointOfRigidBody(point) = &mut self.quiet().kind {
            point.local_position = position;
            let uid = self.uid();
            self.emit(PhysicsEvent::ChangeMassLocalPosition { uid, position });
        }
    }

    pub fn stop(&mut self) {
        self.quiet().stop();
        let uid = self.uid();
        self.emit(PhysicsEvent::StopMass { uid });
    }

    pub fn set_stopped(&mut self, state: bool) {
        self.quiet().set_stopped(state);
        let uid = self.uid();
        self.emit(PhysicsEvent::SetStopMassState { uid, state });
    }

    pub fn reset(&mut self) {
        self.quiet().reset();
        let uid = self.uid();
        self.emit(PhysicsEvent::ResetMass { uid });
    }

    pub fn kinematic_translate(&mut self, offset: Vec3) {
        self.quiet().kinematic_translate(offset);
        let uid = self.uid();
        self.emit(PhysicsEvent::MassKinematicTranslate { uid, offset });
    }
}

impl Deref for MassMut<'_> {
    type Target = Mass;

    fn deref(&self) -> &Mass {
        &self.arena[self.key]
    }
}
