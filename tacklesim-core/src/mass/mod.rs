//! Point masses and their variants.
//!
//! Every mass shares the state in [`Mass`]; variant specific state lives in
//! [`MassKind`]. Masses are stored in a [`MassArena`] and referenced by
//! [`MassKey`] so connections can reach both of their endpoints.

mod handle;
pub mod point;
pub mod rigid;
pub mod verlet;

use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::error;

use crate::collider::{Collider, DensityType, PlaneSudokuCollider};
use crate::config::TIME_QUANT;
use crate::connection::ConnectionKey;
use crate::error::{PhysicsError, Result};
use crate::ids::{Iid, Uid};
use crate::math::terrain::ground_collision;
use crate::math::{approximately, lerp_vec3, Terrain};
use crate::simulation::StepContext;

pub use handle::MassMut;
pub use point::{PointConstraint, PointState};
pub use rigid::{box_inertia, ContactPoint, RigidBodyState, MAX_ANGULAR_VELOCITY, MAX_CONTACTS};
pub use verlet::{FishData, VerletState};

slotmap::new_key_type! {
    /// Handle to a mass inside a simulation
    pub struct MassKey;
}

pub type MassArena = SlotMap<MassKey, Mass>;

pub const DEFAULT_RADIUS: f32 = 0.0125;
pub const DEFAULT_STATIC_FRICTION: f32 = 0.3;
pub const DEFAULT_SLIDING_FRICTION: f32 = 0.25;
pub const DEFAULT_VELOCITY_LIMIT: f32 = 20.0;
pub const FISH_VELOCITY_LIMIT: f32 = 100.0;
pub const DEFAULT_BUOYANCY: f32 = -1.0;
pub const DEFAULT_BUOYANCY_AT_MINIMAL_SPEED: f32 = 0.7;
/// Share of the normal velocity kept when bouncing off a surface
pub const SURFACE_BOUNCE: f32 = 0.15;
pub const MAX_COLLIDERS: usize = 6;

/// Half height of the band where a mass counts as touching the water
const WATER_BAND: f32 = DEFAULT_RADIUS;

/// Gameplay role of a mass. Some roles change the physics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MassType {
    #[default]
    Unknown,
    Rod,
    Line,
    Leader,
    Lure,
    Bobber,
    Sinker,
    Wobbler,
    Hook,
    Fish,
    TopWaterLure,
    Feeder,
    Auxiliary,
    Padding,
    Leash,
    Swivel,
    RubberStopper,
    LureHook,
}

/// How a mass resolves contact with its surroundings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CollisionType {
    None,
    /// Test the assigned colliders and the height chunk every sub-step
    #[default]
    FullBody,
    /// Stay above the externally supplied ground plane
    ExternalPlane,
    /// Resolve the rigid body contact buffer
    RigidbodyContacts,
}

/// Variant tag without the variant state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MassVariant {
    Plain,
    Verlet,
    RigidBody,
    PointOfRigidBody,
}

#[derive(Debug, Clone)]
pub enum MassKind {
    Plain,
    Verlet(VerletState),
    RigidBody(Box<RigidBodyState>),
    PointOfRigidBody(PointState),
}

impl MassKind {
    pub fn variant(&self) -> MassVariant {
        match self {
            MassKind::Plain => MassVariant::Plain,
            MassKind::Verlet(_) => MassVariant::Verlet,
            MassKind::RigidBody(_) => MassVariant::RigidBody,
            MassKind::PointOfRigidBody(_) => MassVariant::PointOfRigidBody,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mass {
    pub(crate) uid: Uid,
    pub(crate) iid: Iid,
    pub(crate) mass_type: MassType,
    pub(crate) kind: MassKind,

    /// Physical position. The visible position adds `visual_offset`.
    pub(crate) position: Vec3,
    pub(crate) visual_offset: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) velocity: Vec3,
    pub(crate) force: Vec3,
    pub(crate) motor: Vec3,
    pub(crate) water_motor: Vec3,
    pub(crate) flow_velocity: Vec3,
    pub(crate) wind_velocity: Vec3,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inv_mass_delta: f32,
    pub(crate) weight: f32,
    pub(crate) gravity: f32,
    pub(crate) buoyancy: f32,
    pub(crate) buoyancy_speed_factor: f32,
    pub(crate) buoyancy_at_minimal_speed: f32,
    pub(crate) water_drag: f32,
    pub(crate) air_drag: f32,
    pub(crate) compound_water_resistance: f32,
    pub(crate) velocity_limit: f32,
    pub(crate) delta_limit: f32,
    pub(crate) radius: f32,
    pub(crate) static_friction: f32,
    pub(crate) sliding_friction: f32,
    pub(crate) motion_damping: f32,
    pub(crate) force_factor: f32,

    pub(crate) is_kinematic: bool,
    pub(crate) is_freeze: bool,
    pub(crate) is_ref: bool,
    pub(crate) ignore_env_forces: bool,
    pub(crate) ignore_environment: bool,
    pub(crate) disable_simulation: bool,
    pub(crate) collision: CollisionType,
    pub(crate) density: DensityType,
    pub(crate) is_collision: bool,
    pub(crate) limit_breached: bool,
    pub(crate) is_stopped: bool,

    pub(crate) colliders: Vec<Rc<dyn Collider>>,
    pub(crate) height_chunk: Option<PlaneSudokuCollider>,

    pub(crate) ground_point: Vec3,
    pub(crate) ground_normal: Vec3,
    pub(crate) ext_ground_point_prev: Vec3,
    pub(crate) ext_ground_point: Vec3,
    pub(crate) ext_ground_normal_prev: Vec3,
    pub(crate) ext_ground_normal: Vec3,

    pub(crate) prior_spring: Option<ConnectionKey>,
    pub(crate) next_spring: Option<ConnectionKey>,

    pub(crate) period_force_cache: Vec3,
    pub(crate) frame_force_cache: Vec3,
    pub(crate) avg_force: Vec3,
    pub(crate) avg_force_count: u32,
    pub(crate) drag_force: Vec3,

    /// Set on mirror copies: the simulation-stable id of the source mass
    pub(crate) source: Option<Uid>,
    pub(crate) source_disabled: bool,
}

impl Mass {
    /// A mass whose visible position is `position` under `visual_offset`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        uid: Uid,
        iid: Iid,
        mass_type: MassType,
        mass: f32,
        position: Vec3,
        visual_offset: Vec3,
        kind: MassKind,
        gravity: f32,
    ) -> Self {
        let velocity_limit = if mass_type == MassType::Fish { FISH_VELOCITY_LIMIT } else { DEFAULT_VELOCITY_LIMIT };
        let mut m = Self {
            uid,
            iid,
            mass_type,
            kind,
            position: position - visual_offset,
            visual_offset,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            motor: Vec3::ZERO,
            water_motor: Vec3::ZERO,
            flow_velocity: Vec3::ZERO,
            wind_velocity: Vec3::ZERO,
            mass: 0.0,
            inv_mass: 0.0,
            inv_mass_delta: 0.0,
            weight: 0.0,
            gravity,
            buoyancy: 0.0,
            buoyancy_speed_factor: 0.0,
            buoyancy_at_minimal_speed: DEFAULT_BUOYANCY_AT_MINIMAL_SPEED,
            water_drag: 0.0,
            air_drag: 0.0,
            compound_water_resistance: 0.0,
            velocity_limit,
            delta_limit: velocity_limit * TIME_QUANT,
            radius: DEFAULT_RADIUS,
            static_friction: DEFAULT_STATIC_FRICTION,
            sliding_friction: DEFAULT_SLIDING_FRICTION,
            motion_damping: 0.0,
            force_factor: 0.0,
            is_kinematic: false,
            is_freeze: false,
            is_ref: false,
            ignore_env_forces: false,
            ignore_environment: false,
            disable_simulation: false,
            collision: CollisionType::FullBody,
            density: DensityType::None,
            is_collision: false,
            limit_breached: false,
            is_stopped: false,
            colliders: Vec::new(),
            height_chunk: None,
            ground_point: Vec3::ZERO,
            ground_normal: Vec3::Y,
            ext_ground_point_prev: Vec3::ZERO,
            ext_ground_point: Vec3::ZERO,
            ext_ground_normal_prev: Vec3::Y,
            ext_ground_normal: Vec3::Y,
            prior_spring: None,
            next_spring: None,
            period_force_cache: Vec3::ZERO,
            frame_force_cache: Vec3::ZERO,
            avg_force: Vec3::ZERO,
            avg_force_count: 0,
            drag_force: Vec3::ZERO,
            source: None,
            source_disabled: false,
        };
        m.set_mass(mass);
        m.set_buoyancy(DEFAULT_BUOYANCY);
        if let MassKind::Verlet(state) = &mut m.kind {
            state.prev = m.position;
            state.kin_prev = m.position;
            state.kin_next = m.position;
        }
        m
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn iid(&self) -> Iid {
        self.iid
    }

    pub fn kind(&self) -> &MassKind {
        &self.kind
    }

    pub fn variant(&self) -> MassVariant {
        self.kind.variant()
    }

    pub fn mass_type(&self) -> MassType {
        self.mass_type
    }

    pub fn set_mass_type(&mut self, mass_type: MassType) {
        self.mass_type = mass_type;
    }

    /// Visible position
    pub fn position(&self) -> Vec3 {
        self.position + self.visual_offset
    }

    pub fn physical_position(&self) -> Vec3 {
        self.position
    }

    /// Move the visible position to `value`. NaN writes are dropped.
    pub fn set_position(&mut self, value: Vec3) -> bool {
        if value.is_nan() {
            error!(uid = self.uid.0, mass_type = ?self.mass_type, "discarding NaN position write");
            return false;
        }
        let physical = value - self.visual_offset;
        match &mut self.kind {
            MassKind::Verlet(state) if self.is_kinematic => {
                state.is_static = false;
                state.kin_prev = self.position;
                state.kin_next = physical;
            }
            MassKind::Verlet(state) => {
                state.prev += physical - self.position;
                self.position = physical;
            }
            _ => self.position = physical,
        }
        true
    }

    pub fn visual_offset(&self) -> Vec3 {
        self.visual_offset
    }

    /// Change the visual offset while keeping the visible position in place.
    pub fn set_visual_offset(&mut self, value: Vec3) {
        let shift = self.visual_offset - value;
        self.visual_offset = value;
        self.position += shift;
        if let MassKind::Verlet(state) = &mut self.kind {
            state.prev += shift;
        }
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        if let MassKind::RigidBody(body) = &mut self.kind {
            body.update_world_inertia(rotation);
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn force(&self) -> Vec3 {
        self.force
    }

    pub fn set_force(&mut self, force: Vec3) {
        self.force = force;
    }

    pub fn motor(&self) -> Vec3 {
        self.motor
    }

    pub fn set_motor(&mut self, motor: Vec3) {
        self.motor = motor;
    }

    pub fn water_motor(&self) -> Vec3 {
        self.water_motor
    }

    pub fn set_water_motor(&mut self, motor: Vec3) {
        self.water_motor = motor;
    }

    pub fn flow_velocity(&self) -> Vec3 {
        self.flow_velocity
    }

    pub fn set_flow_velocity(&mut self, flow: Vec3) {
        self.flow_velocity = flow;
    }

    pub fn wind_velocity(&self) -> Vec3 {
        self.wind_velocity
    }

    pub fn set_wind_velocity(&mut self, wind: Vec3) {
        self.wind_velocity = wind;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set the mass and every value derived from it.
    ///
    /// A non-positive mass has zero inverse mass.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
        if mass > 0.0 {
            self.inv_mass = 1.0 / mass;
            self.inv_mass_delta = TIME_QUANT / mass;
        } else {
            self.inv_mass = 0.0;
            self.inv_mass_delta = 0.0;
        }
        self.weight = mass * self.gravity;
        if self.mass_type == MassType::Rod && mass < 0.002 {
            self.weight *= 0.1;
        }
        self.compound_water_resistance = mass * self.water_drag;
    }

    /// Inverse mass, zero while kinematic
    pub fn inv_mass(&self) -> f32 {
        if self.is_kinematic {
            0.0
        } else {
            self.inv_mass
        }
    }

    /// Inverse mass ignoring the kinematic flag
    pub fn raw_inv_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn buoyancy(&self) -> f32 {
        self.buoyancy
    }

    /// Fish carry one extra unit of buoyancy on top of the assigned value.
    pub fn set_buoyancy(&mut self, value: f32) {
        self.buoyancy = if self.mass_type == MassType::Fish { value + 1.0 } else { value };
    }

    pub fn buoyancy_speed_factor(&self) -> f32 {
        self.buoyancy_speed_factor
    }

    pub fn set_buoyancy_speed_factor(&mut self, value: f32) {
        self.buoyancy_speed_factor = value;
    }

    pub fn buoyancy_at_minimal_speed(&self) -> f32 {
        self.buoyancy_at_minimal_speed
    }

    pub fn set_buoyancy_at_minimal_speed(&mut self, value: f32) {
        self.buoyancy_at_minimal_speed = value;
    }

    pub fn water_drag(&self) -> f32 {
        self.water_drag
    }

    pub fn set_water_drag(&mut self, value: f32) {
        self.water_drag = value;
        self.compound_water_resistance = self.mass * value;
    }

    pub fn compound_water_resistance(&self) -> f32 {
        self.compound_water_resistance
    }

    pub fn air_drag(&self) -> f32 {
        self.air_drag
    }

    pub fn set_air_drag(&mut self, value: f32) {
        self.air_drag = value;
    }

    pub fn velocity_limit(&self) -> f32 {
        self.velocity_limit
    }

    pub fn set_velocity_limit(&mut self, limit: f32) {
        self.velocity_limit = limit;
        self.delta_limit = limit * TIME_QUANT;
    }

    pub fn is_limit_breached(&self) -> bool {
        self.limit_breached
    }

    pub fn clear_limit_breached(&mut self) {
        self.limit_breached = false;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    pub fn static_friction(&self) -> f32 {
        self.static_friction
    }

    pub fn set_static_friction(&mut self, value: f32) {
        self.static_friction = value.max(0.0);
        if self.sliding_friction > self.static_friction {
            self.sliding_friction = self.static_friction;
        }
    }

    pub fn sliding_friction(&self) -> f32 {
        self.sliding_friction
    }

    pub fn set_sliding_friction(&mut self, value: f32) {
        self.sliding_friction = value.max(0.0);
        if self.sliding_friction > self.static_friction {
            self.static_friction = self.sliding_friction;
        }
    }

    pub fn motion_damping(&self) -> f32 {
        self.motion_damping
    }

    pub fn set_motion_damping(&mut self, value: f32) {
        self.motion_damping = value;
    }

    pub fn force_factor(&self) -> f32 {
        self.force_factor
    }

    /// Multiplier applied once to the next force integration
    pub fn set_force_factor(&mut self, value: f32) {
        self.force_factor = value;
    }

    pub fn is_kinematic(&self) -> bool {
        self.is_kinematic
    }

    pub fn set_kinematic(&mut self, value: bool) {
        self.is_kinematic = value;
    }

    pub fn is_freeze(&self) -> bool {
        self.is_freeze
    }

    pub fn set_freeze(&mut self, value: bool) {
        self.is_freeze = value;
    }

    pub fn is_ref(&self) -> bool {
        self.is_ref
    }

    pub fn set_ref(&mut self, value: bool) {
        self.is_ref = value;
    }

    pub fn ignore_env_forces(&self) -> bool {
        self.ignore_env_forces
    }

    /// Skip buoyancy and water drag in the force pass
    pub fn set_ignore_env_forces(&mut self, value: bool) {
        self.ignore_env_forces = value;
    }

    pub fn ignore_environment(&self) -> bool {
        self.ignore_environment
    }

    pub fn set_ignore_environment(&mut self, value: bool) {
        self.ignore_environment = value;
    }

    pub fn disable_simulation(&self) -> bool {
        self.disable_simulation
    }

    pub fn set_disable_simulation(&mut self, value: bool) {
        self.disable_simulation = value;
    }

    /// Excluded from the dense arrays, directly or through its source
    pub fn is_simulation_disabled(&self) -> bool {
        self.disable_simulation || (self.source.is_some() && self.source_disabled)
    }

    pub fn collision(&self) -> CollisionType {
        self.collision
    }

    pub fn set_collision(&mut self, collision: CollisionType) {
        self.collision = collision;
    }

    pub fn density(&self) -> DensityType {
        self.density
    }

    pub fn is_collision(&self) -> bool {
        if self.is_collision {
            return true;
        }
        match &self.kind {
            MassKind::RigidBody(body) => body.contacts.iter().any(|c| c.distance < 0.0),
            _ => false,
        }
    }

    pub fn is_trapped(&self) -> bool {
        self.density == DensityType::Sticky
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.density, DensityType::Sticky | DensityType::Sparse)
    }

    pub fn is_stopped(&self) -> bool {
        self.is_stopped
    }

    pub fn set_stopped(&mut self, state: bool) {
        self.is_stopped = state;
    }

    pub fn source(&self) -> Option<Uid> {
        self.source
    }

    pub fn prior_spring(&self) -> Option<ConnectionKey> {
        self.prior_spring
    }

    pub fn next_spring(&self) -> Option<ConnectionKey> {
        self.next_spring
    }

    pub fn colliders(&self) -> &[Rc<dyn Collider>] {
        &self.colliders
    }

    /// Colliders are tested in the order they were added.
    pub fn add_collider(&mut self, collider: Rc<dyn Collider>) -> Result<()> {
        if self.colliders.len() >= MAX_COLLIDERS {
            return Err(PhysicsError::TooManyColliders { uid: self.uid, max: MAX_COLLIDERS });
        }
        self.colliders.push(collider);
        Ok(())
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    pub fn height_chunk(&self) -> Option<&PlaneSudokuCollider> {
        self.height_chunk.as_ref()
    }

    pub fn height_chunk_mut(&mut self) -> Option<&mut PlaneSudokuCollider> {
        self.height_chunk.as_mut()
    }

    pub fn set_height_chunk(&mut self, chunk: Option<PlaneSudokuCollider>) {
        self.height_chunk = chunk;
    }

    pub fn ground_point(&self) -> Vec3 {
        self.ground_point
    }

    pub fn ground_height(&self) -> f32 {
        self.ground_point.y
    }

    pub fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    /// Push a new external ground point, keeping the previous one for interpolation.
    pub fn set_ground_point(&mut self, point: Vec3) {
        self.ext_ground_point_prev = self.ext_ground_point;
        self.ext_ground_point = point;
        self.ground_point = point;
    }

    pub fn set_ground_height(&mut self, height: f32) {
        self.ext_ground_point_prev = self.ext_ground_point;
        self.ext_ground_point.y = height;
        self.ground_point.y = height;
    }

    pub fn set_ground_normal(&mut self, normal: Vec3) {
        self.ext_ground_normal_prev = self.ext_ground_normal;
        self.ext_ground_normal = normal;
        self.ground_normal = normal;
    }

    pub fn ext_ground_point_interpolated(&self, progress: f32) -> Vec3 {
        lerp_vec3(self.ext_ground_point_prev, self.ext_ground_point, progress)
    }

    pub fn ext_ground_normal_interpolated(&self, progress: f32) -> Vec3 {
        lerp_vec3(self.ext_ground_normal_prev, self.ext_ground_normal, progress)
    }

    /// Refresh the ground point and normal from `terrain` below the visible position.
    pub fn update_ground_data(&mut self, terrain: Option<&dyn Terrain>) {
        let (point, normal) = ground_collision(terrain, self.position());
        self.ground_point = point;
        self.ground_normal = normal;
    }

    pub fn water_height(&self) -> f32 {
        0.0
    }

    /// Resting on or sunk into the ground
    pub fn is_lying(&self) -> bool {
        let y = self.position().y;
        let ground = self.ground_height();
        y < ground || y - ground < self.radius || (self.is_collision() && y - ground < self.radius * 2.0)
    }

    pub fn avg_force(&self) -> Vec3 {
        if self.avg_force_count == 0 {
            Vec3::ZERO
        } else {
            self.avg_force / self.avg_force_count as f32
        }
    }

    pub fn reset_avg_force(&mut self) {
        self.avg_force = Vec3::ZERO;
        self.avg_force_count = 0;
    }

    pub fn update_avg_force(&mut self, force: Vec3) {
        self.avg_force += force;
        self.avg_force_count += 1;
    }

    pub fn drag_force(&self) -> Vec3 {
        self.drag_force
    }

    pub fn update_drag_force(&mut self, force: Vec3) {
        self.drag_force = force;
    }

    pub fn reset_drag_force(&mut self) {
        self.drag_force = Vec3::ZERO;
    }

    /// Cached environment force from the last three-step recompute
    pub fn period_force(&self) -> Vec3 {
        self.period_force_cache
    }

    /// Ground friction opposing the current motion of a lying mass
    pub fn friction_force(&self) -> Vec3 {
        if !self.is_lying() {
            return Vec3::ZERO;
        }
        let moving = self.velocity.length() > 0.0;
        let normal = crate::math::normalize_or_zero(self.ground_normal);
        let factor = if moving { self.static_friction } else { self.sliding_friction };
        let magnitude = (self.weight * Vec3::NEG_Y.dot(normal) * factor).abs();
        crate::math::normalize_or_zero(-self.velocity) * magnitude
    }

    /// Accumulate `force` for the next integration. Kinematic masses ignore it.
    ///
    /// Points of a rigid body also forward the force to their parent; use
    /// [`apply_force`] when the arena is at hand.
    pub fn apply_force(&mut self, force: Vec3, capture: bool) {
        let is_point = matches!(self.kind, MassKind::PointOfRigidBody(_));
        if self.is_kinematic && !is_point {
            return;
        }
        self.force += force;
        if capture {
            self.update_avg_force(force);
        }
    }

    /// Clear the force accumulator before a sub-step
    pub fn reset(&mut self) {
        if self.is_kinematic {
            return;
        }
        self.force = Vec3::ZERO;
        if let MassKind::RigidBody(body) = &mut self.kind {
            body.torque = Vec3::ZERO;
            body.angle_kahan = Vec3::ZERO;
        }
    }

    /// Zero every dynamic accumulator and raise the stop flag
    pub fn stop(&mut self) {
        self.force = Vec3::ZERO;
        self.velocity = Vec3::ZERO;
        self.motor = Vec3::ZERO;
        self.water_motor = Vec3::ZERO;
        self.frame_force_cache = Vec3::ZERO;
        self.period_force_cache = Vec3::ZERO;
        self.is_stopped = true;
        match &mut self.kind {
            MassKind::Verlet(state) => {
                state.prev = self.position;
                state.kahan = Vec3::ZERO;
                state.kahan2 = Vec3::ZERO;
                state.delta_pos = Vec3::ZERO;
            }
            MassKind::RigidBody(body) => {
                body.torque = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
                body.angle_kahan = Vec3::ZERO;
            }
            _ => {}
        }
    }

    /// Shift a scripted mass without giving it velocity
    pub fn kinematic_translate(&mut self, offset: Vec3) {
        match &mut self.kind {
            MassKind::Verlet(state) => {
                self.position += offset;
                state.prev += offset;
            }
            _ => {
                let target = self.position() + offset;
                self.set_position(target);
            }
        }
    }

    /// Stick-slip friction against a surface.
    ///
    /// The tangential part of `velocity` survives only above the static
    /// threshold and then loses the sliding share. Thresholds scale with
    /// the normal speed accumulated over one frame.
    pub fn friction_velocity(&self, velocity: Vec3, velocity_normal: Vec3, frame_delta_time: f32) -> Vec3 {
        let tangent = velocity - velocity_normal;
        let normal_value = velocity_normal.length() * (frame_delta_time / TIME_QUANT);
        let tangent_value = tangent.length();
        if tangent_value > normal_value * self.static_friction {
            let sliding = normal_value * self.sliding_friction;
            if tangent_value > sliding {
                return velocity * ((tangent_value - sliding) / tangent_value);
            }
        }
        Vec3::ZERO
    }

    /// Velocity after touching a surface with `normal`
    fn surface_response(&self, normal: Vec3, frame_delta_time: f32) -> Vec3 {
        let dot = normal.dot(self.velocity);
        let v_normal = normal * dot;
        let bounced = if dot < 0.0 { -v_normal * SURFACE_BOUNCE } else { v_normal };
        self.friction_velocity(self.velocity, v_normal, frame_delta_time) + bounced
    }

    /// Recompute the environment force cache.
    ///
    /// `submerged` ramps weight into buoyancy across the water band and
    /// `under` gates water drag. Air drag applies to the dry share.
    pub(crate) fn refresh_period_force(&mut self, env: &ForceEnvironment, submerged: f32, under: f32) {
        let relative = self.velocity - self.flow_velocity;
        let mut f_weight = -self.weight;
        let mut resistance = 0.0;
        if !self.ignore_env_forces {
            let speed = relative.length().max(env.laminar_water_speed);
            let horizontal = (relative.x * relative.x + relative.z * relative.z).sqrt();
            resistance = self.compound_water_resistance * speed * under;
            let dynamic = clamp_band(
                self.buoyancy_speed_factor * env.buoyancy_speed_factor * horizontal,
                env.max_dynamic_buoyancy,
            );
            f_weight += self.weight * (self.buoyancy + 1.0 + dynamic) * submerged;
        }
        let air = self.air_drag * (1.0 - submerged);

        let water = if matches!(self.kind, MassKind::Verlet(_)) { -relative * resistance } else { Vec3::ZERO };
        self.period_force_cache = water + Vec3::new(0.0, f_weight, 0.0) - (self.velocity - self.wind_velocity) * air;
    }

    /// Force applied every sub-step: cache plus motors
    pub(crate) fn step_force(&self) -> Vec3 {
        let mut force = self.period_force_cache + self.motor;
        if self.position().y <= WATER_BAND {
            force += self.water_motor;
        }
        force
    }

    /// Integrate a plain mass: velocity from force, then position, then contacts.
    pub(crate) fn simulate_plain(&mut self, ctx: &StepContext) {
        if self.is_kinematic {
            if self.collision != CollisionType::FullBody {
                self.ground_point = self.ext_ground_point_interpolated(ctx.progress);
                self.ground_normal = self.ext_ground_normal_interpolated(ctx.progress);
            }
            return;
        }
        if self.is_freeze {
            return;
        }

        if self.force_factor > 0.0 && !approximately(0.0, self.force_factor) {
            self.velocity += self.force * self.inv_mass_delta * self.force_factor;
            self.force_factor = 0.0;
        } else {
            self.velocity += self.force * self.inv_mass_delta;
        }

        let speed = self.velocity.length();
        if self.velocity_limit > 0.0 && speed > self.velocity_limit {
            self.velocity *= self.velocity_limit / speed;
            self.limit_breached = true;
        }

        let mut pos_new = if !self.ignore_env_forces && self.position.y < WATER_BAND {
            self.water_step()
        } else {
            self.position + self.velocity * TIME_QUANT
        };

        self.density = DensityType::None;
        match self.collision {
            CollisionType::FullBody => {
                self.is_collision = false;
                let mut prior = self.position();
                let mut candidate = pos_new + self.visual_offset;
                let colliders = self.colliders.clone();
                for collider in colliders.iter() {
                    let Some(contact) = collider.test_point(candidate, prior) else {
                        continue;
                    };
                    let density = collider.density();
                    self.density = density;
                    let dot = contact.normal.dot(self.velocity);
                    let v_normal = contact.normal * dot;
                    if density == DensityType::Solid {
                        pos_new += contact.push;
                    }
                    if density == DensityType::Sticky {
                        self.velocity += -v_normal * SURFACE_BOUNCE;
                        self.density = match (collider.position(), collider.force_damping()) {
                            (Some(at), Some(damping))
                                if (prior.y - at.y).abs() <= 0.01 && damping.length() > self.drag_force.length() =>
                            {
                                DensityType::Sticky
                            }
                            _ => DensityType::Sparse,
                        };
                    } else if dot < 0.0 {
                        self.velocity += -v_normal * collider.friction_factor();
                    }
                    prior = candidate;
                    candidate = pos_new + self.visual_offset;
                    self.is_collision = true;
                }
                if !self.is_collision {
                    self.reset_drag_force();
                }

                let visible = self.position();
                let hit = self.height_chunk.as_ref().and_then(|chunk| chunk.test_point(candidate, visible));
                if let Some(contact) = hit {
                    pos_new += contact.push;
                    self.velocity = self.surface_response(contact.normal, ctx.frame_delta_time);
                    self.is_collision = true;
                }
            }
            CollisionType::ExternalPlane => {
                self.is_collision = false;
                let depth = (self.ext_ground_point_interpolated(ctx.progress).y - self.position().y).max(0.0);
                if depth > 0.0 {
                    pos_new.y += depth;
                    let normal = self.ext_ground_normal_interpolated(ctx.progress);
                    self.velocity = self.surface_response(normal, ctx.frame_delta_time);
                    self.is_collision = true;
                }
            }
            CollisionType::None | CollisionType::RigidbodyContacts => {}
        }

        if !self.is_trapped() {
            self.position = pos_new;
        }
    }

    /// Semi-implicit water drag for a mass inside the surface band
    fn water_step(&mut self) -> Vec3 {
        let relative = self.velocity - self.flow_velocity;
        let speed = relative.length().min(self.velocity_limit * 0.5).max(0.0);
        let radius_factor = 0.5 * (1.0 - clamp_band(self.position.y, WATER_BAND) / WATER_BAND);
        let resistance = self.compound_water_resistance * radius_factor * self.inv_mass * TIME_QUANT;
        let mut flow_delta = self.flow_velocity * TIME_QUANT;
        if speed < 1.0 {
            self.velocity += relative * (resistance * (0.5 * resistance - 1.0));
            flow_delta += relative * ((1.0 - 0.5 * resistance) * TIME_QUANT);
        } else {
            self.velocity += relative * (1.0 / (1.0 + speed * resistance) - 1.0);
            flow_delta += relative * ((1.0 - 0.5 * speed * resistance) * TIME_QUANT);
        }
        self.position + flow_delta
    }

    /// Pull authoritative state from `source` and hand back local ground data.
    pub(crate) fn sync_main(&mut self, source: &mut Mass, terrain: Option<&dyn Terrain>) {
        source.ext_ground_point = self.ext_ground_point;
        source.ext_ground_point_prev = self.ext_ground_point_prev;
        source.ext_ground_normal = self.ext_ground_normal;
        source.ext_ground_normal_prev = self.ext_ground_normal_prev;
        if let (Some(theirs), Some(ours)) = (source.height_chunk.as_mut(), self.height_chunk.as_mut()) {
            theirs.sync(ours);
        }
        source.colliders.clone_from(&self.colliders);

        self.position = source.position;
        self.velocity = source.velocity;
        self.rotation = source.rotation;
        self.avg_force = source.avg_force;
        self.avg_force_count = source.avg_force_count;
        self.is_stopped = source.is_stopped;
        self.visual_offset = source.visual_offset;
        self.limit_breached = source.limit_breached;
        self.velocity_limit = source.velocity_limit;
        self.delta_limit = source.delta_limit;
        self.is_collision = source.is_collision;
        self.density = source.density;
        self.drag_force = source.drag_force;
        self.source_disabled = source.disable_simulation;

        match (&mut self.kind, &source.kind) {
            (MassKind::Verlet(ours), MassKind::Verlet(theirs)) => {
                if theirs.fish_data.is_some() {
                    ours.fish_data = theirs.fish_data;
                }
            }
            (MassKind::RigidBody(ours), MassKind::RigidBody(theirs)) => {
                ours.inv_rotation = self.rotation.inverse();
                ours.collision_impulse_velocity = theirs.collision_impulse_velocity;
            }
            _ => {}
        }
        if let MassKind::RigidBody(theirs) = &mut source.kind {
            theirs.collision_impulse_velocity = Vec3::ZERO;
        }

        self.update_ground_data(terrain);
        source.ground_point = self.ground_point;
        source.ground_normal = self.ground_normal;
    }
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}-{} Mass:{}({}) Force:{} Velocity:{} AvgForce:({}){} Motor:{}",
            self.mass_type,
            self.uid.0,
            self.mass,
            self.weight,
            self.force,
            self.velocity,
            self.avg_force_count,
            self.avg_force,
            self.motor
        )
    }
}

/// Environment constants read by the force pass
#[derive(Debug, Clone, Copy)]
pub(crate) struct ForceEnvironment {
    pub laminar_water_speed: f32,
    pub buoyancy_speed_factor: f32,
    pub max_dynamic_buoyancy: f32,
}

/// Clamp to `[-band, band]` without panicking on a negative band
fn clamp_band(x: f32, band: f32) -> f32 {
    x.max(-band).min(band)
}

/// Apply `force` to the mass at `key`, forwarding rigid body points to their parent.
pub fn apply_force(arena: &mut MassArena, key: MassKey, force: Vec3, capture: bool) {
    let parent = match arena.get(key).map(|m| &m.kind) {
        Some(MassKind::PointOfRigidBody(point)) => Some((point.parent, point.local_position)),
        Some(_) => None,
        None => return,
    };
    if let Some((parent, local)) = parent {
        if let Some(body) = arena.get_mut(parent) {
            body.apply_force_at(force, local, capture);
        }
    }
    if let Some(mass) = arena.get_mut(key) {
        mass.apply_force(force, capture);
    }
}

/// Advance the mass at `key` by one sub-step.
pub fn simulate(arena: &mut MassArena, key: MassKey, ctx: &StepContext) {
    let variant = match arena.get(key) {
        Some(mass) => mass.variant(),
        None => return,
    };
    match variant {
        MassVariant::Plain => arena[key].simulate_plain(ctx),
        MassVariant::Verlet => verlet::simulate(&mut arena[key], ctx),
        MassVariant::RigidBody => rigid::simulate(&mut arena[key], ctx),
        MassVariant::PointOfRigidBody => point::simulate(arena, key),
    }
}
