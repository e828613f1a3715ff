pub mod collider;
pub mod config;
pub mod connection;
pub mod error;
pub mod ids;
pub mod listener;
pub mod mass;
pub mod math;
pub mod object;
pub mod simulation;

pub use collider::{
    BoxCollider, CapsuleCollider, Collider, ColliderMaterial, Contact, DensityType, PlaneSudokuCollider,
    SphereCollider,
};
pub use config::{SimulationConfig, GRAVITY, TIME_QUANT};
pub use connection::{
    Bend, Connection, ConnectionKey, ConnectionKind, KinematicConnection, KinematicVerticalParabola, Magnet, Spring,
    TetrahedronRollStabilizer, TetrahedronTorsionSpring, TetrahedronWithBall, VerletBend, VerletSpring, WaveDeviation,
};
pub use error::{PhysicsError, Result};
pub use ids::{IdSource, Iid, Uid};
pub use listener::{PhysicsEvent, PhysicsListener, RecordingListener};
pub use mass::{
    box_inertia, CollisionType, ContactPoint, FishData, Mass, MassKey, MassKind, MassMut, MassType, MassVariant,
    PointConstraint,
};
pub use math::terrain::FlatTerrain;
pub use math::Terrain;
pub use object::{ObjectKey, ObjectMut, PhysicsObject, PhysicsObjectType};
pub use simulation::{RefLeak, Simulation, StepContext};

// Test helpers module (public for integration tests)
// Always compiled - integration tests are separate crates and need access
pub mod tests;
