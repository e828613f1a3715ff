//! Constraints between masses.
//!
//! A connection joins `mass1` and `mass2` (tetrahedron constraints reach
//! further masses through their own key arrays). Every kind runs `solve`
//! once per sub-step after the force pass. Verlet constraints also run
//! `satisfy` on a staggered cadence after integration.

pub mod bend;
pub mod kinematic;
pub mod magnet;
pub mod parabola;
pub mod roll;
pub mod spring;
pub mod tetra_ball;
pub mod torsion;
pub mod verlet_bend;
pub mod verlet_spring;

use glam::Vec3;
use slotmap::SlotMap;

use crate::ids::{Iid, Uid};
use crate::mass::{MassArena, MassKey};
use crate::simulation::StepContext;

pub use bend::Bend;
pub use kinematic::KinematicConnection;
pub use magnet::Magnet;
pub use parabola::KinematicVerticalParabola;
pub use roll::TetrahedronRollStabilizer;
pub use spring::Spring;
pub use tetra_ball::{TetrahedronWithBall, WaveDeviation};
pub use torsion::TetrahedronTorsionSpring;
pub use verlet_bend::VerletBend;
pub use verlet_spring::VerletSpring;

slotmap::new_key_type! {
    /// Handle to a connection inside a simulation
    pub struct ConnectionKey;
}

pub type ConnectionArena = SlotMap<ConnectionKey, Connection>;

#[derive(Debug, Clone)]
pub enum ConnectionKind {
    Spring(Spring),
    VerletSpring(VerletSpring),
    VerletBend(VerletBend),
    Bend(Bend),
    Magnet(Magnet),
    Kinematic(KinematicConnection),
    KinematicParabola(KinematicVerticalParabola),
    TetraBall(TetrahedronWithBall),
    TetraTorsion(TetrahedronTorsionSpring),
    TetraRoll(TetrahedronRollStabilizer),
}

impl ConnectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionKind::Spring(_) => "Spring",
            ConnectionKind::VerletSpring(_) => "VerletSpring",
            ConnectionKind::VerletBend(_) => "VerletBend",
            ConnectionKind::Bend(_) => "Bend",
            ConnectionKind::Magnet(_) => "Magnet",
            ConnectionKind::Kinematic(_) => "KinematicConnection",
            ConnectionKind::KinematicParabola(_) => "KinematicVerticalParabola",
            ConnectionKind::TetraBall(_) => "TetrahedronWithBall",
            ConnectionKind::TetraTorsion(_) => "TetrahedronTorsionSpring",
            ConnectionKind::TetraRoll(_) => "TetrahedronRollStabilizer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) uid: Uid,
    pub(crate) iid: Iid,
    pub(crate) mass1: MassKey,
    pub(crate) mass2: MassKey,
    pub(crate) kind: ConnectionKind,
}

impl Connection {
    pub(crate) fn new(uid: Uid, iid: Iid, mass1: MassKey, mass2: MassKey, kind: ConnectionKind) -> Self {
        Self { uid, iid, mass1, mass2, kind }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn iid(&self) -> Iid {
        self.iid
    }

    pub fn mass1(&self) -> MassKey {
        self.mass1
    }

    pub fn mass2(&self) -> MassKey {
        self.mass2
    }

    pub fn kind(&self) -> &ConnectionKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ConnectionKind {
        &mut self.kind
    }

    pub fn as_spring(&self) -> Option<&Spring> {
        match &self.kind {
            ConnectionKind::Spring(spring) => Some(spring),
            _ => None,
        }
    }

    pub fn as_spring_mut(&mut self) -> Option<&mut Spring> {
        match &mut self.kind {
            ConnectionKind::Spring(spring) => Some(spring),
            _ => None,
        }
    }

    /// Position level constraint satisfied on the staggered cadence
    pub fn is_verlet_constraint(&self) -> bool {
        matches!(
            self.kind,
            ConnectionKind::VerletSpring(_)
                | ConnectionKind::VerletBend(_)
                | ConnectionKind::TetraBall(_)
                | ConnectionKind::TetraTorsion(_)
                | ConnectionKind::TetraRoll(_)
        )
    }

    pub fn is_impulse_spring(&self) -> bool {
        matches!(self.kind, ConnectionKind::Spring(_))
    }

    /// Every mass the connection touches
    pub fn masses(&self) -> Vec<MassKey> {
        let mut keys = vec![self.mass1, self.mass2];
        match &self.kind {
            ConnectionKind::TetraBall(joint) => {
                keys.extend(joint.tetrahedron1);
                keys.extend(joint.tetrahedron2);
                if let Some((a, b)) = joint.wave.chord {
                    keys.extend([a, b]);
                }
            }
            ConnectionKind::TetraTorsion(spring) => keys.extend(spring.tetrahedron),
            ConnectionKind::TetraRoll(roll) => keys.extend(roll.tetrahedron),
            _ => {}
        }
        keys.dedup();
        keys
    }

    fn masses_present(&self, arena: &MassArena) -> bool {
        self.masses().iter().all(|key| arena.contains_key(*key))
    }

    /// Re-point the endpoints
    pub(crate) fn set_masses(&mut self, mass1: Option<MassKey>, mass2: Option<MassKey>) {
        if let Some(key) = mass1 {
            self.mass1 = key;
        }
        if let Some(key) = mass2 {
            self.mass2 = key;
        }
    }

    /// Force or velocity level step, run every sub-step
    pub(crate) fn solve(&mut self, arena: &mut MassArena, ctx: &StepContext) {
        if !self.masses_present(arena) {
            return;
        }
        let (m1, m2) = (self.mass1, self.mass2);
        match &mut self.kind {
            ConnectionKind::Spring(c) => c.solve(arena, m1, m2, ctx),
            ConnectionKind::VerletSpring(c) => c.solve(arena, m1, m2),
            ConnectionKind::VerletBend(c) => c.solve(arena, m1, m2),
            ConnectionKind::Bend(c) => c.solve(arena, m1, m2),
            ConnectionKind::Magnet(c) => c.solve(arena, m1, m2),
            ConnectionKind::Kinematic(c) => c.solve(arena, m1, ctx),
            ConnectionKind::KinematicParabola(c) => c.solve(arena, m1, m2, ctx),
            ConnectionKind::TetraBall(c) => c.solve(arena),
            ConnectionKind::TetraTorsion(c) => c.solve(arena, m1),
            ConnectionKind::TetraRoll(_) => {}
        }
    }

    /// Position level correction for Verlet constraints
    pub(crate) fn satisfy(&mut self, arena: &mut MassArena) {
        if !self.masses_present(arena) {
            return;
        }
        let (m1, m2) = (self.mass1, self.mass2);
        match &mut self.kind {
            ConnectionKind::VerletSpring(c) => c.satisfy(arena, m1, m2),
            ConnectionKind::VerletBend(c) => c.satisfy(arena, m1, m2),
            ConnectionKind::TetraBall(c) => c.satisfy(arena),
            ConnectionKind::TetraTorsion(c) => c.satisfy(arena, m1),
            ConnectionKind::TetraRoll(c) => c.satisfy(arena),
            _ => {}
        }
    }

    pub fn potential_energy(&self, arena: &MassArena) -> f32 {
        if !self.masses_present(arena) {
            return 0.0;
        }
        match &self.kind {
            ConnectionKind::Spring(spring) => spring.potential_energy(arena, self.mass1, self.mass2),
            _ => 0.0,
        }
    }

    /// True when the spring is stretched past its rest length
    pub fn is_stretched(&self, arena: &MassArena) -> bool {
        let Some(spring) = self.as_spring() else {
            return false;
        };
        match (arena.get(self.mass1), arena.get(self.mass2)) {
            (Some(a), Some(b)) => a.position.distance(b.position) >= spring.spring_length() * 1.0001,
            _ => false,
        }
    }
}

/// Move a mass by `offset` unless it is kinematic
pub(crate) fn nudge(arena: &mut MassArena, key: MassKey, offset: Vec3) {
    if let Some(mass) = arena.get_mut(key) {
        if !mass.is_kinematic {
            mass.position += offset;
        }
    }
}

pub(crate) fn position(arena: &MassArena, key: MassKey) -> Vec3 {
    arena.get(key).map_or(Vec3::ZERO, |m| m.position)
}

pub(crate) fn position_delta(arena: &MassArena, key: MassKey) -> Vec3 {
    arena.get(key).map_or(Vec3::ZERO, |m| m.position_delta())
}
