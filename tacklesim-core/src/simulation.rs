//! The fixed-step world.
//!
//! A [`Simulation`] owns every mass, connection and object. Each frame is
//! split into sub-steps of [`TIME_QUANT`]; a sub-step clears forces, applies
//! the environment and the connections, integrates the masses and then
//! satisfies one third of the Verlet constraints.
//!
//! Structural changes (adding or removing entities, toggling the
//! disable-simulation flag) happen between frames. They take effect in the
//! dense iteration arrays at the next [`Simulation::refresh_object_arrays`],
//! which `update` runs on its own after adds and removes.

use std::collections::HashMap;
use std::fmt;

use glam::{Quat, Vec3, Vec4};
use slotmap::SlotMap;
use tracing::{debug, error, info, trace, warn};

use crate::collider::PlaneSudokuCollider;
use crate::config::{SimulationConfig, TIME_QUANT};
use crate::connection::{Connection, ConnectionArena, ConnectionKey, ConnectionKind, KinematicConnection, Spring, VerletSpring};
use crate::error::{PhysicsError, Result};
use crate::ids::{IdSource, Iid, Uid, UidGenerator};
use crate::listener::{notify, PhysicsEvent, PhysicsListener};
use crate::mass::{
    self, ForceEnvironment, Mass, MassArena, MassKey, MassKind, MassMut, MassType, PointConstraint, PointState,
    RigidBodyState, VerletState,
};
use crate::math::terrain::{update_height_chunk, HEIGHT_CHUNK_DELTA};
use crate::math::{Terrain, Vector4Ext};
use crate::object::{ObjectArena, ObjectKey, ObjectMut, PhysicsObject, PhysicsObjectType};

/// Number of padding masses; enough to fill any partial group of four
const PADDING_MASSES: usize = 3;

/// Sub-step values handed to every mass and connection
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepContext {
    /// Share of the frame completed after this sub-step, in `(0, 1]`
    pub progress: f32,
    /// Index of the sub-step within the frame
    pub index: usize,
    pub iteration_amount: usize,
    /// Sub-steps run before this one, over the life of the simulation
    pub iterations: u32,
    pub internal_time: f32,
    pub frame_delta_time: f32,
}

/// An inconsistency between the registries of a simulation
#[derive(Debug, Clone, PartialEq)]
pub enum RefLeak {
    /// Dense array, sparse list and dictionary disagree in size
    ContainerMismatch { what: &'static str, dense: usize, list: usize, dict: usize },
    /// An entity in the dense array is missing from the dictionary
    NotInDict { what: &'static str, uid: Uid },
    /// `owner` references a mass that is not registered
    DanglingMass { owner: Uid, what: &'static str },
    /// `owner` references a connection that is not registered
    DanglingConnection { owner: Uid, what: &'static str },
}

impl fmt::Display for RefLeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefLeak::ContainerMismatch { what, dense, list, dict } => {
                write!(f, "{what} containers do not match: dense = {dense}, list = {list}, dict = {dict}")
            }
            RefLeak::NotInDict { what, uid } => write!(f, "{what} {} is not in the dictionary", uid.0),
            RefLeak::DanglingMass { owner, what } => {
                write!(f, "{what} {} references a mass that is not in the system", owner.0)
            }
            RefLeak::DanglingConnection { owner, what } => {
                write!(f, "{what} {} references a connection that is not in the system", owner.0)
            }
        }
    }
}

pub struct Simulation {
    name: String,
    is_main: bool,
    config: SimulationConfig,
    ids: IdSource,
    uids: UidGenerator,
    listener: Option<Box<dyn PhysicsListener>>,
    terrain: Option<Box<dyn Terrain>>,

    pub(crate) masses: MassArena,
    pub(crate) connections: ConnectionArena,
    pub(crate) objects: ObjectArena,

    mass_list: Vec<MassKey>,
    connection_list: Vec<ConnectionKey>,
    object_list: Vec<ObjectKey>,

    mass_dict: HashMap<Uid, MassKey>,
    connection_dict: HashMap<Uid, ConnectionKey>,
    object_dict: HashMap<Uid, ObjectKey>,

    /// Active masses followed by padding up to a multiple of four
    dense_masses: Vec<MassKey>,
    dense_mass_count: usize,
    dense_connections: Vec<ConnectionKey>,
    verlet_constraints: Vec<ConnectionKey>,
    impulse_springs: Vec<ConnectionKey>,
    padding: [MassKey; PADDING_MASSES],
    arrays_dirty: bool,

    iterations: u32,
    verlet_cycle: usize,
    ctx: StepContext,
    visual_position_offset: Vec3,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("name", &self.name)
            .field("is_main", &self.is_main)
            .field("masses", &self.mass_list.len())
            .field("connections", &self.connection_list.len())
            .field("objects", &self.object_list.len())
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl Simulation {
    pub fn new(name: impl Into<String>, config: SimulationConfig) -> Self {
        Self::with_ids(name, config, IdSource::new())
    }

    /// Simulation drawing identities from `ids`
    pub fn with_ids(name: impl Into<String>, config: SimulationConfig, ids: IdSource) -> Self {
        let mut sim = Self {
            name: name.into(),
            is_main: true,
            config,
            ids,
            uids: UidGenerator::default(),
            listener: None,
            terrain: None,
            masses: SlotMap::with_key(),
            connections: SlotMap::with_key(),
            objects: SlotMap::with_key(),
            mass_list: Vec::new(),
            connection_list: Vec::new(),
            object_list: Vec::new(),
            mass_dict: HashMap::new(),
            connection_dict: HashMap::new(),
            object_dict: HashMap::new(),
            dense_masses: Vec::new(),
            dense_mass_count: 0,
            dense_connections: Vec::new(),
            verlet_constraints: Vec::new(),
            impulse_springs: Vec::new(),
            padding: [MassKey::default(); PADDING_MASSES],
            arrays_dirty: false,
            iterations: 0,
            verlet_cycle: 0,
            ctx: StepContext::default(),
            visual_position_offset: Vec3::ZERO,
        };
        for slot in 0..PADDING_MASSES {
            let uid = sim.uids.next_uid();
            let iid = sim.ids.masses.next_iid();
            let padding = Mass::new(uid, iid, MassType::Padding, 0.0, Vec3::ZERO, Vec3::ZERO, MassKind::Plain, 0.0);
            sim.padding[slot] = sim.masses.insert(padding);
        }
        sim
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn set_main(&mut self, value: bool) {
        self.is_main = value;
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_listener(&mut self, listener: Box<dyn PhysicsListener>) {
        self.listener = Some(listener);
    }

    pub fn take_listener(&mut self) -> Option<Box<dyn PhysicsListener>> {
        self.listener.take()
    }

    pub fn set_terrain(&mut self, terrain: Option<Box<dyn Terrain>>) {
        self.terrain = terrain;
    }

    pub fn terrain(&self) -> Option<&dyn Terrain> {
        self.terrain.as_deref()
    }

    pub(crate) fn emit(&mut self, event: PhysicsEvent) {
        notify(&mut self.listener, event);
    }

    /// Draw a UID from the shared per-simulation space
    pub fn new_uid(&mut self) -> Uid {
        self.uids.next_uid()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Simulated seconds since the simulation was created
    pub fn internal_time(&self) -> f32 {
        self.iterations as f32 * TIME_QUANT
    }

    /// Context of the last sub-step
    pub fn step_context(&self) -> StepContext {
        self.ctx
    }

    pub fn frame_iteration_progress(&self) -> f32 {
        self.ctx.progress
    }

    pub fn visual_position_offset(&self) -> Vec3 {
        self.visual_position_offset
    }

    /// Shift the presentation origin of every mass
    pub fn set_visual_position_offset(&mut self, offset: Vec3) {
        self.visual_position_offset = offset;
        for &key in &self.mass_list {
            if let Some(mass) = self.masses.get_mut(key) {
                mass.set_visual_offset(offset);
            }
        }
        self.emit(PhysicsEvent::VisualPositionOffsetGlobalChanged { offset });
    }

    // ----- masses -----

    fn check_capacity(what: &'static str, len: usize, max: usize) -> Result<()> {
        if len >= max {
            return Err(PhysicsError::CapacityExceeded { what, max });
        }
        Ok(())
    }

    fn insert_mass(&mut self, mass_type: MassType, value: f32, position: Vec3, kind: MassKind) -> Result<MassKey> {
        Self::check_capacity("mass", self.mass_list.len(), self.config.max_masses)?;
        let uid = self.uids.next_uid();
        let iid = self.ids.masses.next_iid();
        let mut mass = Mass::new(uid, iid, mass_type, value, position, self.visual_position_offset, kind, self.config.gravity);
        mass.set_water_drag(self.config.water_drag_constant);
        mass.set_air_drag(self.config.air_drag_constant);
        let variant = mass.variant();

        let key = self.masses.insert(mass);
        self.mass_list.push(key);
        self.mass_dict.insert(uid, key);
        self.arrays_dirty = true;
        debug!(uid = uid.0, iid = iid.0, ?mass_type, ?variant, "mass created");
        self.emit(PhysicsEvent::CreateMass { uid, mass_type, variant });
        Ok(key)
    }

    /// Point mass integrated with semi-implicit Euler
    pub fn add_mass(&mut self, mass_type: MassType, mass: f32, position: Vec3) -> Result<MassKey> {
        self.insert_mass(mass_type, mass, position, MassKind::Plain)
    }

    pub fn add_verlet_mass(&mut self, mass_type: MassType, mass: f32, position: Vec3) -> Result<MassKey> {
        self.insert_mass(mass_type, mass, position, MassKind::Verlet(VerletState::new()))
    }

    /// Rigid body with uniform inertia sized by `radius`
    pub fn add_rigid_body(&mut self, mass_type: MassType, mass: f32, position: Vec3, radius: f32) -> Result<MassKey> {
        let body = RigidBodyState::new(mass, radius)?;
        let key = self.insert_mass(mass_type, mass, position, MassKind::RigidBody(Box::new(body)))?;
        self.masses[key].set_radius(radius);
        Ok(key)
    }

    /// Massless point welded to `parent` at `local_position`
    pub fn add_point_of_rigid_body(
        &mut self,
        parent: MassKey,
        local_position: Vec3,
        constraint: Option<PointConstraint>,
    ) -> Result<MassKey> {
        let body = self.masses.get(parent).ok_or(PhysicsError::UnknownMass)?;
        if body.rigid_body().is_none() {
            return Err(PhysicsError::InvalidConnection(format!(
                "mass {} is not a rigid body and cannot carry points",
                body.uid().0
            )));
        }
        let mass_type = body.mass_type();
        let position = body.local_to_world(local_position) + body.visual_offset();
        let mut state = PointState::new(parent, local_position);
        state.constraint = constraint;
        self.insert_mass(mass_type, 0.0, position, MassKind::PointOfRigidBody(state))
    }

    pub fn remove_mass(&mut self, key: MassKey) -> Result<()> {
        let Some(mass) = self.masses.get(key).filter(|m| m.mass_type() != MassType::Padding) else {
            warn!(?key, "remove_mass: unknown mass");
            return Err(PhysicsError::UnknownMass);
        };
        let uid = mass.uid();
        self.masses.remove(key);
        self.mass_list.retain(|k| *k != key);
        self.mass_dict.remove(&uid);
        self.arrays_dirty = true;
        debug!(uid = uid.0, "mass destroyed");
        self.emit(PhysicsEvent::DestroyMass { uid });
        Ok(())
    }

    pub fn mass(&self, key: MassKey) -> Option<&Mass> {
        self.masses.get(key).filter(|m| m.mass_type() != MassType::Padding)
    }

    /// Notifying write access to one mass
    pub fn mass_mut(&mut self, key: MassKey) -> Option<MassMut<'_>> {
        if self.masses.get(key).is_some_and(|m| m.mass_type() == MassType::Padding) {
            return None;
        }
        MassMut::new(&mut self.masses, key, &mut self.listener)
    }

    pub fn mass_by_uid(&self, uid: Uid) -> Option<MassKey> {
        self.mass_dict.get(&uid).copied()
    }

    /// Registered masses in insertion order
    pub fn masses(&self) -> &[MassKey] {
        &self.mass_list
    }

    /// Read access to the whole mass arena, for building constraints
    pub fn mass_arena(&self) -> &MassArena {
        &self.masses
    }

    /// Give `key` a private height chunk of `size` by `size` samples.
    pub fn enable_height_chunk(&mut self, key: MassKey, size: usize) -> Result<()> {
        let mut chunk = PlaneSudokuCollider::new(size, size, Vec3::ZERO, HEIGHT_CHUNK_DELTA, 1.0)?;
        let mass = self.masses.get_mut(key).ok_or(PhysicsError::UnknownMass)?;
        if let Some(terrain) = self.terrain.as_deref() {
            update_height_chunk(mass.position(), Some(terrain), &mut chunk, false);
        }
        mass.set_height_chunk(Some(chunk));
        Ok(())
    }

    /// Stop every mass and tell the listener
    pub fn global_reset(&mut self) {
        for &key in &self.mass_list {
            if let Some(mass) = self.masses.get_mut(key) {
                mass.stop();
                mass.set_stopped(false);
            }
        }
        self.emit(PhysicsEvent::GlobalReset);
    }

    pub fn set_global_velocity_limit(&mut self, value: f32) {
        for &key in &self.mass_list {
            if let Some(mass) = self.masses.get_mut(key) {
                mass.set_velocity_limit(value);
            }
        }
        self.emit(PhysicsEvent::GlobalVelocityLimit { value });
    }

    /// Whether the springs on either side of `key` are stretched. Always
    /// false for Verlet masses.
    pub fn is_tensioned(&self, key: MassKey) -> bool {
        let Some(mass) = self.masses.get(key) else {
            return false;
        };
        if mass.verlet().is_some() {
            return false;
        }
        [mass.prior_spring(), mass.next_spring()]
            .into_iter()
            .flatten()
            .filter_map(|c| self.connections.get(c))
            .any(|c| c.is_stretched(&self.masses))
    }

    /// Rest length of the spring chain from `lower` up to `upper`.
    ///
    /// With a non-zero `load` (in kg) each spring contributes its stretched
    /// length under that weight. Returns -1 when `upper` is not reachable
    /// through `next_spring` links.
    pub fn mass_to_mass_spring_distance(&self, lower: MassKey, upper: MassKey, load: f32) -> f32 {
        let mut total = 0.0;
        let mut current = lower;
        for _ in 0..=self.connection_list.len() {
            if current == upper {
                return total;
            }
            let Some(link) = self.masses.get(current).and_then(Mass::next_spring) else {
                break;
            };
            let Some(connection) = self.connections.get(link) else {
                break;
            };
            let Some(spring) = connection.as_spring() else {
                break;
            };
            total += if load != 0.0 {
                spring.equilibrant_length(load * self.config.gravity)
            } else {
                spring.spring_length()
            };
            current = connection.mass2();
        }
        if current == upper {
            total
        } else {
            -1.0
        }
    }

    // ----- connections -----

    /// Register a connection of any kind between `mass1` and `mass2`.
    pub fn add_connection(&mut self, mass1: MassKey, mass2: MassKey, kind: ConnectionKind) -> Result<ConnectionKey> {
        Self::check_capacity("connection", self.connection_list.len(), self.config.max_connections)?;
        if matches!(kind, ConnectionKind::Spring(_) | ConnectionKind::VerletSpring(_)) && mass1 == mass2 {
            return Err(PhysicsError::InvalidConnection("spring endpoints must differ".into()));
        }
        let mut connection = Connection::new(Uid::default(), Iid::default(), mass1, mass2, kind);
        for key in connection.masses() {
            if self.mass(key).is_none() {
                return Err(PhysicsError::UnknownMass);
            }
        }
        let uid = self.uids.next_uid();
        let iid = self.ids.connections.next_iid();
        connection.uid = uid;
        connection.iid = iid;
        let is_spring = connection.is_impulse_spring();
        let name = connection.kind().name();
        let (uid1, uid2) = (self.masses[mass1].uid(), self.masses[mass2].uid());

        let key = self.connections.insert(connection);
        if is_spring {
            self.masses[mass1].next_spring = Some(key);
            self.masses[mass2].prior_spring = Some(key);
        }
        self.connection_list.push(key);
        self.connection_dict.insert(uid, key);
        self.arrays_dirty = true;
        debug!(uid = uid.0, iid = iid.0, kind = name, "connection created");
        self.emit(PhysicsEvent::CreateConnection { uid, mass1: uid1, mass2: uid2 });
        Ok(key)
    }

    /// Impulse spring of stiffness `k`
    pub fn add_spring(&mut self, mass1: MassKey, mass2: MassKey, k: f32, length: f32, friction: f32) -> Result<ConnectionKey> {
        let spring = Spring::new(k, length, friction)?;
        self.add_connection(mass1, mass2, ConnectionKind::Spring(spring))
    }

    pub fn add_verlet_spring(
        &mut self,
        mass1: MassKey,
        mass2: MassKey,
        length: f32,
        friction: f32,
        compressible: bool,
    ) -> Result<ConnectionKey> {
        if length < 0.0 {
            return Err(PhysicsError::NegativeSpringLength(length));
        }
        let spring = VerletSpring::new(length, friction, compressible);
        self.add_connection(mass1, mass2, ConnectionKind::VerletSpring(spring))
    }

    /// Scripted driver for a single mass
    pub fn add_kinematic_connection(&mut self, mass: MassKey, is_passive: bool) -> Result<ConnectionKey> {
        let driver = KinematicConnection::new(self.mass(mass).ok_or(PhysicsError::UnknownMass)?, is_passive);
        self.add_connection(mass, mass, ConnectionKind::Kinematic(driver))
    }

    pub fn remove_connection(&mut self, key: ConnectionKey) -> Result<()> {
        let Some(connection) = self.connections.remove(key) else {
            warn!(?key, "remove_connection: unknown connection");
            return Err(PhysicsError::UnknownConnection);
        };
        let uid = connection.uid();
        for mass in self.masses.values_mut() {
            if mass.next_spring == Some(key) {
                mass.next_spring = None;
            }
            if mass.prior_spring == Some(key) {
                mass.prior_spring = None;
            }
        }
        self.connection_list.retain(|k| *k != key);
        self.connection_dict.remove(&uid);
        self.arrays_dirty = true;
        debug!(uid = uid.0, kind = connection.kind().name(), "connection destroyed");
        self.emit(PhysicsEvent::DestroyConnection { uid });
        Ok(())
    }

    pub fn connection(&self, key: ConnectionKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    /// Write access to a connection. Marks it for resync.
    pub fn connection_mut(&mut self, key: ConnectionKey) -> Option<&mut Connection> {
        let uid = self.connections.get(key)?.uid();
        self.emit(PhysicsEvent::ConnectionNeedSyncMark { uid });
        self.connections.get_mut(key)
    }

    pub fn connection_by_uid(&self, uid: Uid) -> Option<ConnectionKey> {
        self.connection_dict.get(&uid).copied()
    }

    pub fn connections(&self) -> &[ConnectionKey] {
        &self.connection_list
    }

    /// Re-point a connection and keep the spring chain in step.
    pub fn set_connection_masses(&mut self, key: ConnectionKey, mass1: Option<MassKey>, mass2: Option<MassKey>) -> Result<()> {
        for k in [mass1, mass2].into_iter().flatten() {
            if self.mass(k).is_none() {
                return Err(PhysicsError::UnknownMass);
            }
        }
        let connection = self.connections.get_mut(key).ok_or(PhysicsError::UnknownConnection)?;
        let (old1, old2) = (connection.mass1(), connection.mass2());
        connection.set_masses(mass1, mass2);
        let (new1, new2) = (connection.mass1(), connection.mass2());
        let uid = connection.uid();
        if connection.is_impulse_spring() {
            if let Some(m) = self.masses.get_mut(old1).filter(|m| m.next_spring == Some(key)) {
                m.next_spring = None;
            }
            if let Some(m) = self.masses.get_mut(old2).filter(|m| m.prior_spring == Some(key)) {
                m.prior_spring = None;
            }
            self.masses[new1].next_spring = Some(key);
            self.masses[new2].prior_spring = Some(key);
        }
        self.emit(PhysicsEvent::ConnectionNeedSyncMark { uid });
        Ok(())
    }

    /// Command the pose a kinematic connection reaches by the end of the frame.
    pub fn set_kinematic_target(
        &mut self,
        key: ConnectionKey,
        position: Vec3,
        rotation: Quat,
        frame_delta_time: f32,
    ) -> Result<()> {
        let connection = self.connections.get_mut(key).ok_or(PhysicsError::UnknownConnection)?;
        let mass = self.masses.get(connection.mass1()).ok_or(PhysicsError::UnknownMass)?;
        match connection.kind_mut() {
            ConnectionKind::Kinematic(driver) => {
                driver.set_next_position_and_rotation(mass, position, rotation, frame_delta_time);
                Ok(())
            }
            other => Err(PhysicsError::InvalidConnection(format!("{} is not a kinematic connection", other.name()))),
        }
    }

    /// Apply the pose a passive kinematic connection computed this sub-step.
    pub fn postponed_solve(&mut self, key: ConnectionKey) -> Result<()> {
        let connection = self.connections.get(key).ok_or(PhysicsError::UnknownConnection)?;
        let mass = self.masses.get_mut(connection.mass1()).ok_or(PhysicsError::UnknownMass)?;
        if let ConnectionKind::Kinematic(driver) = connection.kind() {
            driver.postponed_solve(mass);
        }
        Ok(())
    }

    // ----- objects -----

    pub fn add_object(&mut self, object_type: PhysicsObjectType) -> Result<ObjectKey> {
        Self::check_capacity("object", self.object_list.len(), self.config.max_objects)?;
        let uid = self.uids.next_uid();
        let iid = self.ids.objects.next_iid();
        let key = self.objects.insert(PhysicsObject::new(uid, iid, object_type));
        self.object_list.push(key);
        self.object_dict.insert(uid, key);
        debug!(uid = uid.0, iid = iid.0, ?object_type, "object created");
        self.emit(PhysicsEvent::CreateObject { uid, object_type });
        Ok(key)
    }

    pub fn object(&self, key: ObjectKey) -> Option<&PhysicsObject> {
        self.objects.get(key)
    }

    /// Bulk operations and builders on one object
    pub fn object_mut(&mut self, key: ObjectKey) -> Option<ObjectMut<'_>> {
        ObjectMut::new(self, key)
    }

    pub fn object_by_uid(&self, uid: Uid) -> Option<ObjectKey> {
        self.object_dict.get(&uid).copied()
    }

    pub fn objects(&self) -> &[ObjectKey] {
        &self.object_list
    }

    /// Remove an object together with its masses and connections.
    pub fn remove_object(&mut self, key: ObjectKey) -> Result<()> {
        let Some(object) = self.objects.remove(key) else {
            warn!(?key, "remove_object: unknown object");
            return Err(PhysicsError::UnknownObject);
        };
        for &mass in object.masses() {
            if self.masses.contains_key(mass) {
                self.remove_mass(mass)?;
            }
        }
        for &connection in object.connections() {
            if self.connections.contains_key(connection) {
                self.remove_connection(connection)?;
            }
        }
        let uid = object.uid();
        self.object_list.retain(|k| *k != key);
        self.object_dict.remove(&uid);
        debug!(uid = uid.0, "object destroyed");
        self.emit(PhysicsEvent::DestroyObject { uid });
        self.refresh_object_arrays();
        Ok(())
    }

    /// Drop every entity. Padding survives.
    pub fn clear(&mut self) {
        self.emit(PhysicsEvent::Clear);
        let padding = self.padding;
        self.masses.retain(|key, _| padding.contains(&key));
        self.connections.clear();
        self.objects.clear();
        self.mass_list.clear();
        self.connection_list.clear();
        self.object_list.clear();
        self.mass_dict.clear();
        self.connection_dict.clear();
        self.object_dict.clear();
        self.refresh_object_arrays();
    }

    // ----- dense arrays -----

    fn is_active(&self, key: MassKey) -> bool {
        self.masses.get(key).is_some_and(|m| !m.is_simulation_disabled())
    }

    /// Rebuild the dense iteration arrays and reconcile the dictionaries
    /// with the sparse lists.
    pub fn refresh_object_arrays(&mut self) {
        let active: Vec<MassKey> = self.mass_list.iter().copied().filter(|k| self.is_active(*k)).collect();
        self.dense_mass_count = active.len();
        self.dense_masses = active;
        let pad = (4 - self.dense_mass_count % 4) % 4;
        self.dense_masses.extend_from_slice(&self.padding[..pad]);

        self.dense_connections.clear();
        self.verlet_constraints.clear();
        self.impulse_springs.clear();
        for &key in &self.connection_list {
            let Some(connection) = self.connections.get(key) else {
                continue;
            };
            if !(self.is_active(connection.mass1()) && self.is_active(connection.mass2())) {
                continue;
            }
            self.dense_connections.push(key);
            if connection.is_verlet_constraint() {
                self.verlet_constraints.push(key);
            }
            if connection.is_impulse_spring() {
                self.impulse_springs.push(key);
            }
        }

        // Only simulated masses are reachable by UID
        self.mass_dict.clear();
        for &key in &self.dense_masses[..self.dense_mass_count] {
            self.mass_dict.insert(self.masses[key].uid(), key);
        }
        let connections = &self.connections;
        self.connection_dict.retain(|_, key| connections.contains_key(*key));
        for &key in &self.connection_list {
            if let Some(connection) = connections.get(key) {
                self.connection_dict.entry(connection.uid()).or_insert(key);
            }
        }
        let objects = &self.objects;
        self.object_dict.retain(|_, key| objects.contains_key(*key));

        self.arrays_dirty = false;
        debug!(
            name = %self.name,
            masses = self.dense_mass_count,
            connections = self.dense_connections.len(),
            verlet = self.verlet_constraints.len(),
            springs = self.impulse_springs.len(),
            "object arrays refreshed"
        );
        if self.config.detect_ref_leaks_on_refresh {
            self.detect_ref_leaks();
        }
    }

    /// Masses integrated each sub-step, without padding
    pub fn dense_masses(&self) -> &[MassKey] {
        &self.dense_masses[..self.dense_mass_count]
    }

    /// Dense mass array including padding
    pub fn padded_dense_masses(&self) -> &[MassKey] {
        &self.dense_masses
    }

    pub fn dense_connections(&self) -> &[ConnectionKey] {
        &self.dense_connections
    }

    pub fn verlet_constraints(&self) -> &[ConnectionKey] {
        &self.verlet_constraints
    }

    pub fn impulse_springs(&self) -> &[ConnectionKey] {
        &self.impulse_springs
    }

    pub fn mass_dict_len(&self) -> usize {
        self.mass_dict.len()
    }

    pub fn connection_dict_len(&self) -> usize {
        self.connection_dict.len()
    }

    pub fn object_dict_len(&self) -> usize {
        self.object_dict.len()
    }

    /// Verlet constraints satisfied by the next sub-step
    pub fn verlet_constraints_due(&self) -> Vec<ConnectionKey> {
        self.verlet_constraints
            .iter()
            .enumerate()
            .filter(|(j, _)| j % 3 == self.verlet_cycle)
            .map(|(_, key)| *key)
            .collect()
    }

    // ----- stepping -----

    /// Advance by one rendered frame of `frame_delta_time` seconds.
    pub fn update(&mut self, frame_delta_time: f32) {
        if self.arrays_dirty {
            self.refresh_object_arrays();
        }
        self.refresh_ground();

        let amount = (frame_delta_time / TIME_QUANT) as usize + 1;
        self.ctx.iteration_amount = amount;
        self.ctx.frame_delta_time = frame_delta_time;
        for i in 0..amount {
            self.ctx.index = i;
            self.ctx.progress = (i + 1) as f32 / amount as f32;
            self.operate();
        }
        trace!(name = %self.name, steps = amount, iterations = self.iterations, "frame simulated");
    }

    /// Re-sample ground data and height chunks from the terrain
    fn refresh_ground(&mut self) {
        let Some(terrain) = self.terrain.as_deref() else {
            return;
        };
        for &key in &self.mass_list {
            let Some(mass) = self.masses.get_mut(key) else {
                continue;
            };
            mass.update_ground_data(Some(terrain));
            let (uid, position) = (mass.uid(), mass.position());
            if let Some(chunk) = mass.height_chunk_mut() {
                if update_height_chunk(position, Some(terrain), chunk, false) {
                    trace!(uid = uid.0, "height chunk moved");
                }
            }
        }
    }

    fn operate(&mut self) {
        self.ctx.iterations = self.iterations;
        self.ctx.internal_time = self.internal_time();
        let ctx = self.ctx;

        for &key in &self.dense_masses[..self.dense_mass_count] {
            self.masses[key].reset();
        }

        self.apply_forces_to_masses();
        for &key in &self.dense_connections {
            if let Some(connection) = self.connections.get_mut(key) {
                connection.solve(&mut self.masses, &ctx);
            }
        }

        for &key in &self.dense_masses[..self.dense_mass_count] {
            mass::simulate(&mut self.masses, key, &ctx);
        }
        self.iterations = self.iterations.wrapping_add(1);

        self.satisfy_verlet_constraints();
        self.verlet_cycle = (self.verlet_cycle + 1) % 3;
    }

    fn satisfy_verlet_constraints(&mut self) {
        for (j, &key) in self.verlet_constraints.iter().enumerate() {
            if j % 3 != self.verlet_cycle {
                continue;
            }
            if let Some(connection) = self.connections.get_mut(key) {
                connection.satisfy(&mut self.masses);
            }
        }
    }

    /// Environment forces, four masses at a time.
    ///
    /// The cached per-period force of a group is recomputed every third
    /// sub-step, phased by the UID of the group's first mass. The cache
    /// plus motors is applied on every sub-step.
    fn apply_forces_to_masses(&mut self) {
        let env = ForceEnvironment {
            laminar_water_speed: self.config.laminar_water_speed,
            buoyancy_speed_factor: self.config.buoyancy_speed_factor,
            max_dynamic_buoyancy: self.config.max_dynamic_buoyancy,
        };
        let eps = self.config.water_level_epsilon;
        let eps4 = Vec4::splat(eps);

        for group in self.dense_masses.chunks_exact(4) {
            let lane = |i: usize| &self.masses[group[i]];
            let phase = lane(0).uid().0.max(0) as u64;
            if (u64::from(self.iterations) + phase) % 3 == 0 {
                let visible = Vec4::new(lane(0).position().y, lane(1).position().y, lane(2).position().y, lane(3).position().y);
                let physical = Vec4::new(
                    lane(0).physical_position().y,
                    lane(1).physical_position().y,
                    lane(2).physical_position().y,
                    lane(3).physical_position().y,
                );
                let submerged = if eps > 0.0 {
                    (Vec4::ONE - visible.clamp(-eps4, eps4) / eps4) * 0.5
                } else {
                    visible.le_mask(Vec4::ZERO)
                };
                let under = physical.le_mask(eps4);
                for (i, &key) in group.iter().enumerate() {
                    self.masses[key].refresh_period_force(&env, submerged[i], under[i]);
                }
            }
            for &key in group {
                let force = self.masses[key].step_force();
                mass::apply_force(&mut self.masses, key, force, false);
            }
        }
    }

    // ----- diagnostics -----

    /// Spring energy plus gravitational potential of every mass
    pub fn system_potential_energy(&self) -> f32 {
        let springs: f32 = self
            .connection_list
            .iter()
            .filter_map(|k| self.connections.get(*k))
            .map(|c| c.potential_energy(&self.masses))
            .sum();
        let gravity: f32 = self
            .mass_list
            .iter()
            .filter_map(|k| self.masses.get(*k))
            .map(|m| m.mass() * self.config.gravity * m.physical_position().y)
            .sum();
        springs + gravity
    }

    /// Walk every registry and report entities missing from another.
    ///
    /// Each finding is logged. Nothing is repaired.
    pub fn detect_ref_leaks(&self) -> Vec<RefLeak> {
        let mut leaks = Vec::new();
        // Disabled masses and the connections touching them sit only in the lists
        let active = self.mass_list.iter().filter(|k| self.is_active(**k)).count();
        let (dense, dict) = (self.dense_mass_count, self.mass_dict.len());
        if dense != active || dense != dict {
            leaks.push(RefLeak::ContainerMismatch { what: "mass", dense, list: active, dict });
        }
        let disabled = |key: MassKey| self.masses.get(key).is_some_and(|m| m.is_simulation_disabled());
        let active = self
            .connection_list
            .iter()
            .filter_map(|k| self.connections.get(*k))
            .filter(|c| !disabled(c.mass1()) && !disabled(c.mass2()))
            .count();
        let (dense, list, dict) = (self.dense_connections.len(), self.connection_list.len(), self.connection_dict.len());
        if dense != active || list != dict {
            leaks.push(RefLeak::ContainerMismatch { what: "connection", dense, list, dict });
        }
        let (list, dict) = (self.object_list.len(), self.object_dict.len());
        if list != dict {
            leaks.push(RefLeak::ContainerMismatch { what: "object", dense: list, list, dict });
        }

        for &key in self.dense_masses() {
            let uid = self.masses[key].uid();
            if !self.mass_dict.contains_key(&uid) {
                leaks.push(RefLeak::NotInDict { what: "mass", uid });
            }
        }
        for &key in &self.dense_connections {
            if let Some(connection) = self.connections.get(key) {
                if !self.connection_dict.contains_key(&connection.uid()) {
                    leaks.push(RefLeak::NotInDict { what: "connection", uid: connection.uid() });
                }
            }
        }
        for &key in &self.object_list {
            if let Some(object) = self.objects.get(key) {
                if !self.object_dict.contains_key(&object.uid()) {
                    leaks.push(RefLeak::NotInDict { what: "object", uid: object.uid() });
                }
            }
        }

        let registered = |key: MassKey| {
            self.mass(key).is_some_and(|m| m.is_simulation_disabled() || self.mass_dict.contains_key(&m.uid()))
        };
        let linked = |key: ConnectionKey| {
            self.connections.get(key).is_some_and(|c| self.connection_dict.contains_key(&c.uid()))
        };
        for &key in &self.mass_list {
            let Some(mass) = self.masses.get(key) else {
                continue;
            };
            for spring in [mass.prior_spring(), mass.next_spring()].into_iter().flatten() {
                if !linked(spring) {
                    leaks.push(RefLeak::DanglingConnection { owner: mass.uid(), what: "mass" });
                }
            }
        }
        for &key in &self.connection_list {
            let Some(connection) = self.connections.get(key) else {
                continue;
            };
            if connection.masses().into_iter().any(|m| !registered(m)) {
                leaks.push(RefLeak::DanglingMass { owner: connection.uid(), what: "connection" });
            }
        }
        for &key in &self.object_list {
            let Some(object) = self.objects.get(key) else {
                continue;
            };
            if object.masses().iter().any(|m| !registered(*m)) {
                leaks.push(RefLeak::DanglingMass { owner: object.uid(), what: "object" });
            }
            if object.connections().iter().any(|c| !linked(*c)) {
                leaks.push(RefLeak::DanglingConnection { owner: object.uid(), what: "object" });
            }
        }

        for leak in &leaks {
            error!(name = %self.name, "ref leak: {leak}");
        }
        leaks
    }

    /// Log every mass and connection
    pub fn debug_snapshot(&self) {
        info!(name = %self.name, "----- masses -----");
        for &key in &self.mass_list {
            if let Some(mass) = self.masses.get(key) {
                info!("{mass}");
            }
        }
        info!(name = %self.name, "----- connections -----");
        for &key in &self.connection_list {
            if let Some(connection) = self.connections.get(key) {
                info!(
                    uid = connection.uid().0,
                    mass1 = key_uid(&self.masses, connection.mass1()),
                    mass2 = key_uid(&self.masses, connection.mass2()),
                    "{}",
                    connection.kind().name()
                );
            }
        }
    }

    // ----- mirroring -----

    /// Copy of `source` keyed by the same UIDs, for prediction or replay.
    ///
    /// Every entity keeps its source UID and takes the negated IID of a
    /// fresh draw. The copy has no listener and no terrain. A rigid body
    /// with degenerate inertia or a non-finite angular velocity fails the copy.
    pub fn mirror_of(source: &Simulation) -> Result<Simulation> {
        let mut ids = IdSource::new();
        let mut masses = source.masses.clone();
        for mass in masses.values_mut() {
            if let Some(body) = mass.rigid_body() {
                body.validate()?;
            }
            mass.source = Some(mass.uid());
            mass.iid = ids.masses.next_iid().mirrored();
        }
        let mut connections = source.connections.clone();
        for connection in connections.values_mut() {
            connection.iid = ids.connections.next_iid().mirrored();
        }
        let mut objects = source.objects.clone();
        for object in objects.values_mut() {
            object.iid = ids.objects.next_iid().mirrored();
        }

        let mut mirror = Simulation {
            name: format!("{}-mirror", source.name),
            is_main: false,
            config: source.config.clone(),
            ids,
            uids: source.uids.clone(),
            listener: None,
            terrain: None,
            masses,
            connections,
            objects,
            mass_list: source.mass_list.clone(),
            connection_list: source.connection_list.clone(),
            object_list: source.object_list.clone(),
            mass_dict: source.mass_dict.clone(),
            connection_dict: source.connection_dict.clone(),
            object_dict: source.object_dict.clone(),
            dense_masses: Vec::new(),
            dense_mass_count: 0,
            dense_connections: Vec::new(),
            verlet_constraints: Vec::new(),
            impulse_springs: Vec::new(),
            padding: source.padding,
            arrays_dirty: true,
            iterations: source.iterations,
            verlet_cycle: source.verlet_cycle,
            ctx: source.ctx,
            visual_position_offset: source.visual_position_offset,
        };
        mirror.refresh_object_arrays();
        Ok(mirror)
    }

    /// Pull authoritative mass and spring state from `source` by UID.
    ///
    /// Ground data flows the other way: the source receives the mirror's
    /// external ground plane, colliders and height chunk samples.
    pub fn sync_main(&mut self, source: &mut Simulation) {
        let terrain = self.terrain.as_deref();
        let mut disabled_changed = false;
        for &key in &self.mass_list {
            let Some(mass) = self.masses.get_mut(key) else {
                continue;
            };
            // Keys are shared with the source unless it was rebuilt since;
            // disabled masses are missing from its UID dictionary
            let uid = mass.uid();
            let same_key = source.masses.get(key).is_some_and(|m| m.uid() == uid);
            let their_key = if same_key { Some(key) } else { source.mass_dict.get(&uid).copied() };
            let Some(theirs) = their_key.and_then(|k| source.masses.get_mut(k)) else {
                continue;
            };
            let was = mass.is_simulation_disabled();
            mass.sync_main(theirs, terrain);
            disabled_changed |= was != mass.is_simulation_disabled();
        }
        for &key in &self.connection_list {
            let Some(uid) = self.connections.get(key).filter(|c| c.is_impulse_spring()).map(Connection::uid) else {
                continue;
            };
            let theirs = source
                .connection_dict
                .get(&uid)
                .and_then(|k| source.connections.get_mut(*k))
                .and_then(Connection::as_spring_mut);
            let ours = self.connections.get_mut(key).and_then(Connection::as_spring_mut);
            if let (Some(ours), Some(theirs)) = (ours, theirs) {
                ours.sync_from(theirs);
            }
        }
        if disabled_changed {
            self.refresh_object_arrays();
        }
    }
}

fn key_uid(masses: &MassArena, key: MassKey) -> i32 {
    masses.get(key).map_or(i32::MIN, |m| m.uid().0)
}
