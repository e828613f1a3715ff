//! Unit tests for impulse springs

use glam::Vec3;
use tacklesim_core::tests::test_helpers::{approx_eq_f32, run_frames, vacuum_config, weightless_config};
use tacklesim_core::{ConnectionKey, MassKey, MassType, Simulation, TIME_QUANT};

/// Kinematic anchor with a 1 kg bob hanging exactly one metre below
fn create_test_pendulum() -> (Simulation, MassKey, MassKey, ConnectionKey) {
    let mut sim = Simulation::new("pendulum", vacuum_config());
    let anchor = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 3.0, 0.0)).unwrap();
    sim.mass_mut(anchor).unwrap().set_kinematic(true);
    let bob = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    let spring = sim.add_spring(anchor, bob, 100.0, 1.0, 0.0).unwrap();
    (sim, anchor, bob, spring)
}

#[test]
fn test_hanging_bob_holds_rest_length() {
    let (mut sim, anchor, bob, spring) = create_test_pendulum();
    for _ in 0..2500 {
        sim.update(0.0);
    }
    let d = sim.mass(anchor).unwrap().position().distance(sim.mass(bob).unwrap().position());
    assert!((d - 1.0).abs() < 1e-4, "distance {d}");

    // Each sub-step the spring cancels one sub-step of gravity
    let tension = sim.connection(spring).unwrap().as_spring().unwrap().tension();
    let g = sim.config().gravity;
    assert!(tension > 0.0);
    assert!(tension / TIME_QUANT > 0.5 * g && tension / TIME_QUANT < 2.0 * g, "tension {tension}");
}

#[test]
fn test_anchor_is_not_moved() {
    let (mut sim, anchor, _, _) = create_test_pendulum();
    run_frames(&mut sim, 20, 1.0 / 60.0);
    let mass = sim.mass(anchor).unwrap();
    assert_eq!(mass.position(), Vec3::new(0.0, 3.0, 0.0));
    assert_eq!(mass.velocity(), Vec3::ZERO);
}

#[test]
fn test_spring_length_blends_over_frame() {
    let (mut sim, _, _, spring) = create_test_pendulum();
    sim.connection_mut(spring).unwrap().as_spring_mut().unwrap().set_spring_length(2.0).unwrap();
    assert_eq!(sim.connection(spring).unwrap().as_spring().unwrap().current_spring_length(), 1.0);
    sim.update(1.0 / 60.0);
    let s = sim.connection(spring).unwrap().as_spring().unwrap();
    assert_eq!(s.current_spring_length(), 2.0);
    assert_eq!(s.spring_length(), 2.0);
}

#[test]
fn test_negative_length_rejected() {
    let (mut sim, anchor, bob, spring) = create_test_pendulum();
    assert!(sim.add_spring(anchor, bob, 1.0, -1.0, 0.0).is_err());
    let s = sim.connection_mut(spring).unwrap().as_spring_mut().unwrap();
    assert!(s.set_spring_length(-0.5).is_err());
    assert_eq!(s.spring_length(), 1.0);
}

#[test]
fn test_is_tensioned() {
    let mut sim = Simulation::new("tension", weightless_config());
    let a = sim.add_mass(MassType::Line, 1.0, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    let b = sim.add_mass(MassType::Line, 1.0, Vec3::new(2.0, 1.0, 0.0)).unwrap();
    let c = sim.add_mass(MassType::Line, 1.0, Vec3::new(2.5, 1.0, 0.0)).unwrap();
    sim.add_spring(a, b, 10.0, 1.0, 0.0).unwrap();
    assert!(sim.is_tensioned(a));
    assert!(sim.is_tensioned(b));
    assert!(!sim.is_tensioned(c));

    let v = sim.add_verlet_mass(MassType::Line, 1.0, Vec3::new(9.0, 1.0, 0.0)).unwrap();
    sim.add_spring(c, v, 10.0, 1.0, 0.0).unwrap();
    // Verlet masses never report tension
    assert!(!sim.is_tensioned(v));
    assert!(sim.is_tensioned(c));
}

#[test]
fn test_mass_to_mass_spring_distance() {
    let mut sim = Simulation::new("chain", weightless_config());
    let a = sim.add_mass(MassType::Line, 1.0, Vec3::ZERO).unwrap();
    let b = sim.add_mass(MassType::Line, 1.0, Vec3::X).unwrap();
    let c = sim.add_mass(MassType::Line, 1.0, Vec3::X * 3.0).unwrap();
    sim.add_spring(a, b, 100.0, 1.0, 0.0).unwrap();
    sim.add_spring(b, c, 100.0, 2.0, 0.0).unwrap();

    assert!(approx_eq_f32(sim.mass_to_mass_spring_distance(a, c, 0.0), 3.0, 1e-6));
    assert!(approx_eq_f32(sim.mass_to_mass_spring_distance(a, a, 0.0), 0.0, 1e-6));
    // Unreachable against the link direction
    assert_eq!(sim.mass_to_mass_spring_distance(c, a, 0.0), -1.0);
}

#[test]
fn test_mass_to_mass_spring_distance_under_load() {
    let mut sim = Simulation::new("loaded", vacuum_config());
    let a = sim.add_mass(MassType::Line, 1.0, Vec3::ZERO).unwrap();
    let b = sim.add_mass(MassType::Line, 1.0, Vec3::X).unwrap();
    let c = sim.add_mass(MassType::Line, 1.0, Vec3::X * 3.0).unwrap();
    sim.add_spring(a, b, 100.0, 1.0, 0.0).unwrap();
    sim.add_spring(b, c, 100.0, 2.0, 0.0).unwrap();

    // Each spring stretches by g / k under one kilogram
    let g = sim.config().gravity;
    let expected = 3.0 + 2.0 * g / 100.0;
    assert!(approx_eq_f32(sim.mass_to_mass_spring_distance(a, c, 1.0), expected, 1e-5));
}

#[test]
fn test_system_potential_energy() {
    let mut sim = Simulation::new("energy", vacuum_config());
    let a = sim.add_mass(MassType::Line, 1.0, Vec3::ZERO).unwrap();
    let b = sim.add_mass(MassType::Line, 1.0, Vec3::new(3.0, 0.0, 0.0)).unwrap();
    sim.add_spring(a, b, 10.0, 1.0, 0.0).unwrap();
    // k * ext^2 with ext = 2, both masses at zero height
    assert!(approx_eq_f32(sim.system_potential_energy(), 40.0, 1e-4));

    sim.mass_mut(b).unwrap().set_position(Vec3::new(1.0, 0.0, 0.0));
    assert!(approx_eq_f32(sim.system_potential_energy(), 0.0, 1e-6));

    // Lifting a mass adds m g h
    sim.mass_mut(a).unwrap().set_position(Vec3::new(1.0, 2.0, 0.0));
    let g = sim.config().gravity;
    let ext: f32 = 2.0 - 1.0;
    let expected = 10.0 * ext * ext + g * 2.0;
    assert!(approx_eq_f32(sim.system_potential_energy(), expected, 1e-4));
}

#[test]
fn test_removed_spring_unlinks_masses() {
    let (mut sim, anchor, bob, spring) = create_test_pendulum();
    assert_eq!(sim.mass(anchor).unwrap().next_spring(), Some(spring));
    assert_eq!(sim.mass(bob).unwrap().prior_spring(), Some(spring));
    sim.remove_connection(spring).unwrap();
    assert_eq!(sim.mass(anchor).unwrap().next_spring(), None);
    assert_eq!(sim.mass(bob).unwrap().prior_spring(), None);
    assert!(sim.remove_connection(spring).is_err());
}

#[test]
fn test_set_connection_masses_relinks_chain() {
    let (mut sim, anchor, bob, spring) = create_test_pendulum();
    let other = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    sim.set_connection_masses(spring, None, Some(other)).unwrap();
    assert_eq!(sim.connection(spring).unwrap().mass2(), other);
    assert_eq!(sim.mass(bob).unwrap().prior_spring(), None);
    assert_eq!(sim.mass(other).unwrap().prior_spring(), Some(spring));
    assert_eq!(sim.mass(anchor).unwrap().next_spring(), Some(spring));
}
