//! Named aggregates of masses and connections.
//!
//! A [`PhysicsObject`] owns no physics state. It groups entities that are
//! registered with its simulation so they can be stopped, moved, queried
//! and removed together.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::connection::{ConnectionKey, ConnectionKind, TetrahedronWithBall};
use crate::error::{PhysicsError, Result};
use crate::ids::{Iid, Uid};
use crate::listener::PhysicsEvent;
use crate::mass::{CollisionType, Mass, MassArena, MassKey, MassMut, MassType};
use crate::simulation::Simulation;

slotmap::new_key_type! {
    /// Handle to a physics object inside a simulation
    pub struct ObjectKey;
}

pub type ObjectArena = SlotMap<ObjectKey, PhysicsObject>;

/// Radius given to soft body masses
pub const VERLET_MASS_RADIUS: f32 = 0.05;
/// Friction pair given to soft body masses
pub const VERLET_MASS_FRICTION: f32 = 0.01;
/// Friction of the six edges of a tetrahedron
pub const TETRAHEDRON_EDGE_FRICTION: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysicsObjectType {
    #[default]
    Undefined,
    Rod,
    Line,
    Lure,
    Bobber,
    Leader,
    Hook,
    Fish,
    Magnet,
    Sinker,
    Plant,
    Feeder,
    Leash,
    RubberStopper,
}

#[derive(Debug, Clone)]
pub struct PhysicsObject {
    pub(crate) uid: Uid,
    pub(crate) iid: Iid,
    pub(crate) object_type: PhysicsObjectType,
    pub(crate) masses: Vec<MassKey>,
    pub(crate) connections: Vec<ConnectionKey>,
    pub(crate) is_kinematic: bool,
}

impl PhysicsObject {
    pub(crate) fn new(uid: Uid, iid: Iid, object_type: PhysicsObjectType) -> Self {
        Self { uid, iid, object_type, masses: Vec::new(), connections: Vec::new(), is_kinematic: false }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn iid(&self) -> Iid {
        self.iid
    }

    pub fn object_type(&self) -> PhysicsObjectType {
        self.object_type
    }

    pub fn masses(&self) -> &[MassKey] {
        &self.masses
    }

    pub fn connections(&self) -> &[ConnectionKey] {
        &self.connections
    }

    pub fn is_kinematic(&self) -> bool {
        self.is_kinematic
    }

    fn find(&self, arena: &MassArena, pred: impl Fn(&Mass) -> bool) -> Vec<MassKey> {
        self.masses.iter().copied().filter(|k| arena.get(*k).is_some_and(&pred)).collect()
    }

    pub fn is_lying(&self, arena: &MassArena) -> bool {
        !self.find(arena, Mass::is_lying).is_empty()
    }

    pub fn is_blocked(&self, arena: &MassArena) -> bool {
        self.mass_blocked(arena).is_some()
    }

    /// First blocked constituent
    pub fn mass_blocked(&self, arena: &MassArena) -> Option<MassKey> {
        self.find(arena, Mass::is_blocked).first().copied()
    }

    pub fn masses_blocked(&self, arena: &MassArena) -> Vec<MassKey> {
        self.find(arena, Mass::is_blocked)
    }

    pub fn is_trapped(&self, arena: &MassArena) -> bool {
        self.mass_trapped(arena).is_some()
    }

    pub fn mass_trapped(&self, arena: &MassArena) -> Option<MassKey> {
        self.find(arena, Mass::is_trapped).first().copied()
    }

    pub fn masses_trapped(&self, arena: &MassArena) -> Vec<MassKey> {
        self.find(arena, Mass::is_trapped)
    }

    /// Collision mode of the first constituent
    pub fn collision(&self, arena: &MassArena) -> Option<CollisionType> {
        self.masses.first().and_then(|k| arena.get(*k)).map(Mass::collision)
    }

    pub fn visual_offset(&self, arena: &MassArena) -> Option<Vec3> {
        self.masses.first().and_then(|k| arena.get(*k)).map(Mass::visual_offset)
    }

    pub fn velocity_limit(&self, arena: &MassArena) -> Option<f32> {
        self.masses.first().and_then(|k| arena.get(*k)).map(Mass::velocity_limit)
    }
}

/// Write access to one object and the simulation that holds it.
///
/// Bulk setters go through the notifying mass handle, so the listener sees
/// one change per constituent.
pub struct ObjectMut<'a> {
    sim: &'a mut Simulation,
    key: ObjectKey,
}

impl<'a> ObjectMut<'a> {
    pub(crate) fn new(sim: &'a mut Simulation, key: ObjectKey) -> Option<Self> {
        if sim.objects.contains_key(key) {
            Some(Self { sim, key })
        } else {
            None
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn get(&self) -> &PhysicsObject {
        &self.sim.objects[self.key]
    }

    fn object_mut(&mut self) -> &mut PhysicsObject {
        &mut self.sim.objects[self.key]
    }

    fn mark(&mut self) {
        let uid = self.get().uid();
        self.sim.emit(PhysicsEvent::PhysicsObjectNeedSyncMark { uid });
    }

    fn for_each_mass(&mut self, mut f: impl FnMut(&mut MassMut<'_>)) {
        let keys = self.get().masses.clone();
        for key in keys {
            if let Some(mut mass) = self.sim.mass_mut(key) {
                f(&mut mass);
            }
        }
    }

    /// Make every constituent kinematic (or dynamic) and stop it
    pub fn set_kinematic(&mut self, value: bool) {
        self.object_mut().is_kinematic = value;
        self.for_each_mass(|m| {
            m.set_kinematic(value);
            m.stop();
        });
    }

    pub fn stop_masses(&mut self) {
        self.for_each_mass(|m| m.stop());
    }

    pub fn kinematic_translate(&mut self, offset: Vec3) {
        self.for_each_mass(|m| m.kinematic_translate(offset));
    }

    pub fn set_collision(&mut self, collision: CollisionType) {
        self.for_each_mass(|m| m.set_collision(collision));
    }

    pub fn set_visual_offset(&mut self, offset: Vec3) {
        self.for_each_mass(|m| m.set_visual_offset(offset));
    }

    pub fn set_ignore_env_forces(&mut self, value: bool) {
        self.for_each_mass(|m| m.quiet().set_ignore_env_forces(value));
    }

    pub fn set_velocity_limit(&mut self, value: f32) {
        self.for_each_mass(|m| m.set_velocity_limit(value));
    }

    pub fn set_motion_damping(&mut self, value: f32) {
        self.for_each_mass(|m| m.quiet().set_motion_damping(value));
    }

    /// Attach a registered mass to the object
    pub fn add_mass(&mut self, mass: MassKey) -> Result<()> {
        if self.sim.mass(mass).is_none() {
            return Err(PhysicsError::UnknownMass);
        }
        self.object_mut().masses.push(mass);
        self.mark();
        Ok(())
    }

    /// Attach a registered connection to the object
    pub fn add_connection(&mut self, connection: ConnectionKey) -> Result<()> {
        if self.sim.connection(connection).is_none() {
            return Err(PhysicsError::UnknownConnection);
        }
        self.object_mut().connections.push(connection);
        self.mark();
        Ok(())
    }

    /// Soft body mass: neutral buoyancy, no environment, full body collision.
    pub fn add_verlet_mass(&mut self, mass: f32, position: Vec3, mass_type: MassType) -> Result<MassKey> {
        let key = self.sim.add_verlet_mass(mass_type, mass, position)?;
        let m = &mut self.sim.masses[key];
        m.set_radius(VERLET_MASS_RADIUS);
        m.set_buoyancy(0.0);
        m.stop();
        m.set_ignore_environment(true);
        m.set_collision(CollisionType::FullBody);
        m.set_static_friction(VERLET_MASS_FRICTION);
        m.set_sliding_friction(VERLET_MASS_FRICTION);
        m.set_stopped(false);
        self.object_mut().masses.push(key);
        Ok(key)
    }

    /// Verlet spring whose length defaults to the current distance
    pub fn add_verlet_spring(
        &mut self,
        mass1: MassKey,
        mass2: MassKey,
        friction: f32,
        length: Option<f32>,
        compressible: bool,
    ) -> Result<ConnectionKey> {
        let length = match length.filter(|l| *l > 0.0) {
            Some(length) => length,
            None => {
                let a = self.sim.mass(mass1).ok_or(PhysicsError::UnknownMass)?;
                let b = self.sim.mass(mass2).ok_or(PhysicsError::UnknownMass)?;
                a.physical_position().distance(b.physical_position())
            }
        };
        let key = self.sim.add_verlet_spring(mass1, mass2, length, friction, compressible)?;
        self.object_mut().connections.push(key);
        Ok(key)
    }

    /// Four quarter-mass fish masses joined by six springs.
    ///
    /// Returns the index of the first new mass within the object, as taken
    /// by [`ObjectMut::add_ball_joint`].
    pub fn add_tetrahedron(&mut self, mass: f32, corners: [Vec3; 4], edge_length: Option<f32>) -> Result<usize> {
        let first = self.get().masses.len();
        let quarter = mass * 0.25;
        let mut keys = [MassKey::default(); 4];
        for (key, corner) in keys.iter_mut().zip(corners) {
            *key = self.add_verlet_mass(quarter, corner, MassType::Fish)?;
        }
        let [a, b, c, d] = keys;
        for (m1, m2) in [(a, b), (a, c), (a, d), (b, c), (c, d), (d, b)] {
            self.add_verlet_spring(m1, m2, TETRAHEDRON_EDGE_FRICTION, edge_length, false)?;
        }
        Ok(first)
    }

    /// Ball joint between the tetrahedra starting at object indices `t1` and `t2`
    pub fn add_ball_joint(&mut self, t1: usize, t2: usize, stiffness: f32, friction: f32) -> Result<ConnectionKey> {
        let tetra = |at: usize| -> Result<[MassKey; 4]> {
            let masses = &self.get().masses;
            masses
                .get(at..at + 4)
                .and_then(|s| <[MassKey; 4]>::try_from(s).ok())
                .ok_or_else(|| PhysicsError::InvalidConnection(format!("no tetrahedron at object index {at}")))
        };
        let (tetra1, tetra2) = (tetra(t1)?, tetra(t2)?);
        let joint = TetrahedronWithBall::new(tetra1, tetra2, stiffness, friction);
        let key = self.sim.add_connection(tetra1[0], tetra2[0], ConnectionKind::TetraBall(joint))?;
        self.object_mut().connections.push(key);
        Ok(key)
    }
}
