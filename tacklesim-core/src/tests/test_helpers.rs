//! Test helper utilities for TackleSim tests

use glam::Vec3;

use crate::config::SimulationConfig;
use crate::simulation::Simulation;

/// Check if two floating point values are approximately equal within tolerance
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Check if two f32 values are approximately equal within tolerance
pub fn approx_eq_f32(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol
}

/// Check if every component of two vectors is within tolerance
pub fn vec_approx_eq(a: Vec3, b: Vec3, tol: f32) -> bool {
    (a - b).abs().max_element() <= tol
}

/// Config with every environment force switched off except gravity
pub fn vacuum_config() -> SimulationConfig {
    SimulationConfig {
        water_drag_constant: 0.0,
        air_drag_constant: 0.0,
        buoyancy_speed_factor: 0.0,
        ..SimulationConfig::default()
    }
}

/// Config with gravity switched off as well
pub fn weightless_config() -> SimulationConfig {
    SimulationConfig { gravity: 0.0, ..vacuum_config() }
}

/// Run `frames` updates of `frame_delta_time` seconds
pub fn run_frames(sim: &mut Simulation, frames: usize, frame_delta_time: f32) {
    for _ in 0..frames {
        sim.update(frame_delta_time);
    }
}

/// Visible positions of every registered mass, in insertion order
pub fn positions(sim: &Simulation) -> Vec<Vec3> {
    sim.masses().iter().filter_map(|k| sim.mass(*k)).map(|m| m.position()).collect()
}
