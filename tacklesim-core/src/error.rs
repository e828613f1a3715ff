use thiserror::Error;

use crate::ids::Uid;

/// Hard failures raised by the kernel
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("degenerate inertia tensor: {axis} component is {value}")]
    DegenerateInertia { axis: char, value: f32 },

    #[error("angular velocity is not finite: {0:?}")]
    NonFiniteAngularVelocity(glam::Vec3),

    #[error("spring length must be non-negative, got {0}")]
    NegativeSpringLength(f32),

    #[error("bezier spline order must be at least 2, got {0}")]
    InvalidBezierOrder(usize),

    #[error("heightfield needs at least 2x2 samples, got {x}x{z}")]
    DegenerateHeightfield { x: usize, z: usize },

    #[error("unknown mass key")]
    UnknownMass,

    #[error("unknown connection key")]
    UnknownConnection,

    #[error("unknown physics object key")]
    UnknownObject,

    #[error("mass {uid:?} already has {max} colliders")]
    TooManyColliders { uid: Uid, max: usize },

    #[error("{what} capacity of {max} exceeded")]
    CapacityExceeded { what: &'static str, max: usize },

    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
