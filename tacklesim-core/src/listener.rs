//! Change notifications pushed from the kernel to a presentation or
//! replication layer.
//!
//! Delivery is synchronous: every notifying setter calls the installed
//! listener before it returns, so a consumer sees changes in exactly the
//! order they were made.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::ids::Uid;
use crate::mass::{CollisionType, MassType, MassVariant};
use crate::object::PhysicsObjectType;

/// One state change or lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsEvent {
    CreateMass { uid: Uid, mass_type: MassType, variant: MassVariant },
    DestroyMass { uid: Uid },
    CreateConnection { uid: Uid, mass1: Uid, mass2: Uid },
    DestroyConnection { uid: Uid },
    CreateObject { uid: Uid, object_type: PhysicsObjectType },
    DestroyObject { uid: Uid },

    ChangeMassValue { uid: Uid, value: f32 },
    ChangeMassPosition { uid: Uid, position: Vec3 },
    ChangeMassRotation { uid: Uid, rotation: Quat },
    ChangeMassVelocity { uid: Uid, velocity: Vec3 },
    ChangeMassAppliedForce { uid: Uid, force: Vec3 },
    ChangeMassMotor { uid: Uid, motor: Vec3 },
    ChangeMassWaterMotor { uid: Uid, motor: Vec3 },
    ChangeMassIsKinematic { uid: Uid, value: bool },
    ChangeMassIsFreeze { uid: Uid, value: bool },
    ChangeMassIsRef { uid: Uid, value: bool },
    ChangeMassVisualPositionOffset { uid: Uid, offset: Vec3 },
    ChangeMassAirDrag { uid: Uid, value: f32 },
    ChangeMassWaterDrag { uid: Uid, value: f32 },
    ChangeMassBuoyancy { uid: Uid, value: f32 },
    ChangeMassBuoyancySpeedFactor { uid: Uid, value: f32 },
    ChangeMassVelocityLimit { uid: Uid, value: f32 },
    ChangeMassType { uid: Uid, mass_type: MassType },
    ChangeMassDisableSimulation { uid: Uid, value: bool },
    ChangeMassCollisionType { uid: Uid, collision: CollisionType },
    ChangeMassForceFactor { uid: Uid, value: f32 },
    ChangeMassLocalPosition { uid: Uid, position: Vec3 },

    StopMass { uid: Uid },
    SetStopMassState { uid: Uid, state: bool },
    ResetMass { uid: Uid },
    MassKinematicTranslate { uid: Uid, offset: Vec3 },

    ConnectionNeedSyncMark { uid: Uid },
    PhysicsObjectNeedSyncMark { uid: Uid },

    Clear,
    GlobalReset,
    GlobalVelocityLimit { value: f32 },
    VisualPositionOffsetGlobalChanged { offset: Vec3 },
}

impl PhysicsEvent {
    /// UID of the entity the event is about, if any
    pub fn uid(&self) -> Option<Uid> {
        use PhysicsEvent::*;
        match self {
            CreateMass { uid, .. }
            | DestroyMass { uid }
            | CreateConnection { uid, .. }
            | DestroyConnection { uid }
            | CreateObject { uid, .. }
            | DestroyObject { uid }
            | ChangeMassValue { uid, .. }
            | ChangeMassPosition { uid, .. }
            | ChangeMassRotation { uid, .. }
            | ChangeMassVelocity { uid, .. }
            | ChangeMassAppliedForce { uid, .. }
            | ChangeMassMotor { uid, .. }
            | ChangeMassWaterMotor { uid, .. }
            | ChangeMassIsKinematic { uid, .. }
            | ChangeMassIsFreeze { uid, .. }
            | ChangeMassIsRef { uid, .. }
            | ChangeMassVisualPositionOffset { uid, .. }
            | ChangeMassAirDrag { uid, .. }
            | ChangeMassWaterDrag { uid, .. }
            | ChangeMassBuoyancy { uid, .. }
            | ChangeMassBuoyancySpeedFactor { uid, .. }
            | ChangeMassVelocityLimit { uid, .. }
            | ChangeMassType { uid, .. }
            | ChangeMassDisableSimulation { uid, .. }
            | ChangeMassCollisionType { uid, .. }
            | ChangeMassForceFactor { uid, .. }
            | ChangeMassLocalPosition { uid, .. }
            | StopMass { uid }
            | SetStopMassState { uid, .. }
            | ResetMass { uid }
            | MassKinematicTranslate { uid, .. }
            | ConnectionNeedSyncMark { uid }
            | PhysicsObjectNeedSyncMark { uid } => Some(*uid),
            Clear | GlobalReset | GlobalVelocityLimit { .. } | VisualPositionOffsetGlobalChanged { .. } => None,
        }
    }
}

/// Sink for kernel notifications
pub trait PhysicsListener {
    fn on_event(&mut self, event: &PhysicsEvent);
}

/// Listener that appends every event to a shared log.
///
/// Cloning shares the log, so a test can keep one handle and install the
/// other into a simulation.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    log: Rc<RefCell<Vec<PhysicsEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PhysicsEvent> {
        self.log.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl PhysicsListener for RecordingListener {
    fn on_event(&mut self, event: &PhysicsEvent) {
        self.log.borrow_mut().push(event.clone());
    }
}

/// Invoke `listener` if one is installed.
pub(crate) fn notify(listener: &mut Option<Box<dyn PhysicsListener>>, event: PhysicsEvent) {
    if let Some(listener) = listener.as_deref_mut() {
        listener.on_event(&event);
    }
}
