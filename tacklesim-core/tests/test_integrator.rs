//! Unit tests for the fixed-step integrator

use glam::Vec3;
use tacklesim_core::tests::test_helpers::{approx_eq_f32, positions, run_frames, vacuum_config};
use tacklesim_core::{MassType, Simulation, TIME_QUANT};

fn create_test_chain() -> Simulation {
    let mut sim = Simulation::new("chain", vacuum_config());
    let top = sim.add_verlet_mass(MassType::Line, 0.01, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    sim.mass_mut(top).unwrap().set_kinematic(true);
    let mut prior = top;
    for i in 1..6 {
        let next = sim.add_verlet_mass(MassType::Line, 0.01, Vec3::new(0.1 * i as f32, 2.0, 0.0)).unwrap();
        sim.add_verlet_spring(prior, next, 0.1, 0.05, true).unwrap();
        prior = next;
    }
    let sinker = sim.add_mass(MassType::Sinker, 0.02, Vec3::new(0.6, 2.0, 0.0)).unwrap();
    sim.add_spring(prior, sinker, 100.0, 0.1, 0.0).unwrap();
    sim
}

#[test]
fn test_substep_count() {
    let mut sim = Simulation::new("steps", vacuum_config());
    sim.update(1.0 / 60.0);
    // floor(0.01667 / 0.0004) + 1
    assert_eq!(sim.iterations(), 42);
    let ctx = sim.step_context();
    assert_eq!(ctx.iteration_amount, 42);
    assert_eq!(ctx.index, 41);
    assert_eq!(ctx.progress, 1.0);

    sim.update(0.0);
    assert_eq!(sim.iterations(), 43);
    assert!(approx_eq_f32(sim.internal_time(), 43.0 * TIME_QUANT, 1e-7));
}

#[test]
fn test_free_fall() {
    let mut sim = Simulation::new("fall", vacuum_config());
    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 100.0, 0.0)).unwrap();
    for _ in 0..250 {
        sim.update(0.0);
    }

    // Semi-implicit Euler: v_n = -n g dt, y_n = y_0 - g dt^2 n (n + 1) / 2
    let mass = sim.mass(key).unwrap();
    let g = sim.config().gravity;
    assert!(approx_eq_f32(mass.velocity().y, -g * 0.1, 1e-4));
    let expected = 100.0 - g * TIME_QUANT * TIME_QUANT * (250.0 * 251.0 / 2.0);
    assert!(approx_eq_f32(mass.position().y, expected, 1e-3));
    assert_eq!(mass.velocity().x, 0.0);
}

#[test]
fn test_determinism() {
    let mut a = create_test_chain();
    let mut b = create_test_chain();
    run_frames(&mut a, 30, 1.0 / 60.0);
    run_frames(&mut b, 30, 1.0 / 60.0);
    assert_eq!(positions(&a), positions(&b));
    assert_eq!(a.iterations(), b.iterations());
}

#[test]
fn test_chain_falls_under_gravity() {
    let mut sim = create_test_chain();
    let before = positions(&sim);
    run_frames(&mut sim, 10, 1.0 / 60.0);
    let after = positions(&sim);
    // The anchor stays put, everything else sags
    assert_eq!(before[0], after[0]);
    assert!(after[1..].iter().zip(&before[1..]).all(|(a, b)| a.y < b.y));
}

#[test]
fn test_disabled_mass_is_skipped_after_refresh() {
    let mut sim = Simulation::new("disabled", vacuum_config());
    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 10.0, 0.0)).unwrap();
    sim.refresh_object_arrays();
    assert_eq!(sim.dense_masses(), &[key]);

    sim.mass_mut(key).unwrap().set_disable_simulation(true);
    sim.refresh_object_arrays();
    assert!(sim.dense_masses().is_empty());
    run_frames(&mut sim, 5, 1.0 / 60.0);
    assert_eq!(sim.mass(key).unwrap().position(), Vec3::new(0.0, 10.0, 0.0));
}

#[test]
fn test_motor_force() {
    let mut config = vacuum_config();
    config.gravity = 0.0;
    let mut sim = Simulation::new("motor", config);
    let key = sim.add_mass(MassType::Lure, 2.0, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    sim.mass_mut(key).unwrap().set_motor(Vec3::new(4.0, 0.0, 0.0));
    for _ in 0..100 {
        sim.update(0.0);
    }
    // a = F / m = 2 m/s^2 for 100 sub-steps
    let v = sim.mass(key).unwrap().velocity();
    assert!(approx_eq_f32(v.x, 2.0 * 100.0 * TIME_QUANT, 1e-5));
}

#[test]
fn test_velocity_limit() {
    let mut config = vacuum_config();
    config.gravity = 0.0;
    let mut sim = Simulation::new("limit", config);
    let key = sim.add_mass(MassType::Lure, 1.0, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    sim.mass_mut(key).unwrap().set_velocity_limit(5.0);
    sim.mass_mut(key).unwrap().set_velocity(Vec3::new(50.0, 0.0, 0.0));
    sim.update(0.0);
    let mass = sim.mass(key).unwrap();
    assert!(approx_eq_f32(mass.velocity().length(), 5.0, 1e-4));
    assert!(mass.is_limit_breached());
}

#[test]
fn test_nan_position_is_discarded() {
    let mut sim = Simulation::new("nan", vacuum_config());
    let key = sim.add_mass(MassType::Lure, 1.0, Vec3::new(1.0, 2.0, 3.0)).unwrap();
    sim.mass_mut(key).unwrap().set_position(Vec3::new(f32::NAN, 0.0, 0.0));
    assert_eq!(sim.mass(key).unwrap().position(), Vec3::new(1.0, 2.0, 3.0));
}
