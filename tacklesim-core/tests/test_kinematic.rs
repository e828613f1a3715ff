//! Unit tests for kinematic masses and kinematic connections

use glam::{Quat, Vec3};
use tacklesim_core::tests::test_helpers::{run_frames, vacuum_config, vec_approx_eq};
use tacklesim_core::{MassType, Simulation};

#[test]
fn test_kinematic_plain_mass_ignores_forces() {
    let mut sim = Simulation::new("plain", vacuum_config());
    let anchor = sim.add_mass(MassType::Rod, 0.5, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    sim.mass_mut(anchor).unwrap().set_kinematic(true);
    sim.mass_mut(anchor).unwrap().set_motor(Vec3::new(10.0, 0.0, 0.0));
    let bob = sim.add_mass(MassType::Sinker, 0.2, Vec3::new(0.5, 2.0, 0.0)).unwrap();
    sim.add_spring(anchor, bob, 50.0, 0.5, 0.01).unwrap();

    run_frames(&mut sim, 30, 1.0 / 60.0);
    let mass = sim.mass(anchor).unwrap();
    assert_eq!(mass.position(), Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(mass.velocity(), Vec3::ZERO);
    assert_eq!(mass.inv_mass(), 0.0);
    // The bob swung down
    assert!(sim.mass(bob).unwrap().position().y < 2.0);
}

#[test]
fn test_kinematic_verlet_mass_ignores_constraints() {
    let mut sim = Simulation::new("verlet", vacuum_config());
    let anchor = sim.add_verlet_mass(MassType::Line, 0.01, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    sim.mass_mut(anchor).unwrap().set_kinematic(true);
    let tip = sim.add_verlet_mass(MassType::Line, 0.01, Vec3::new(0.3, 2.0, 0.0)).unwrap();
    sim.add_verlet_spring(anchor, tip, 0.2, 0.1, false).unwrap();

    run_frames(&mut sim, 30, 1.0 / 60.0);
    let mass = sim.mass(anchor).unwrap();
    assert_eq!(mass.position(), Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(mass.velocity(), Vec3::ZERO);
}

#[test]
fn test_kinematic_translate() {
    let mut sim = Simulation::new("translate", vacuum_config());
    let plain = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    let verlet = sim.add_verlet_mass(MassType::Line, 1.0, Vec3::new(1.0, 2.0, 0.0)).unwrap();
    for key in [plain, verlet] {
        let mut m = sim.mass_mut(key).unwrap();
        m.set_kinematic(true);
        m.kinematic_translate(Vec3::new(0.0, 0.5, 0.0));
    }
    assert_eq!(sim.mass(plain).unwrap().position(), Vec3::new(0.0, 2.5, 0.0));
    assert_eq!(sim.mass(verlet).unwrap().position(), Vec3::new(1.0, 2.5, 0.0));
    // No implied velocity for the Verlet mass
    assert_eq!(sim.mass(verlet).unwrap().position_delta(), Vec3::ZERO);

    sim.update(0.0);
    assert_eq!(sim.mass(verlet).unwrap().position(), Vec3::new(1.0, 2.5, 0.0));
}

#[test]
fn test_kinematic_verlet_position_write_is_interpolated() {
    let mut sim = Simulation::new("interp", vacuum_config());
    let key = sim.add_verlet_mass(MassType::Line, 1.0, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    sim.mass_mut(key).unwrap().set_kinematic(true);
    sim.mass_mut(key).unwrap().set_position(Vec3::new(1.0, 2.0, 0.0));
    // Nothing moves until the next frame is simulated
    assert_eq!(sim.mass(key).unwrap().position(), Vec3::new(0.0, 2.0, 0.0));

    sim.update(1.0 / 60.0);
    assert!(vec_approx_eq(sim.mass(key).unwrap().position(), Vec3::new(1.0, 2.0, 0.0), 1e-6));
}

#[test]
fn test_kinematic_connection_reaches_target() {
    let mut sim = Simulation::new("driver", vacuum_config());
    let rod = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 5.0, 0.0)).unwrap();
    sim.mass_mut(rod).unwrap().set_kinematic(true);
    let driver = sim.add_kinematic_connection(rod, false).unwrap();

    let rotation = Quat::from_rotation_y(0.5);
    sim.set_kinematic_target(driver, Vec3::new(1.0, 5.0, 0.0), rotation, 1.0 / 60.0).unwrap();
    sim.update(1.0 / 60.0);

    let mass = sim.mass(rod).unwrap();
    assert!(vec_approx_eq(mass.position(), Vec3::new(1.0, 5.0, 0.0), 1e-4));
    assert!(mass.rotation().angle_between(rotation) < 1e-3);
    // Moving along +x at the end of the frame
    assert!(mass.velocity().x > 0.0);
}

#[test]
fn test_passive_kinematic_connection_waits() {
    let mut sim = Simulation::new("passive", vacuum_config());
    let rod = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 5.0, 0.0)).unwrap();
    sim.mass_mut(rod).unwrap().set_kinematic(true);
    let driver = sim.add_kinematic_connection(rod, true).unwrap();

    sim.set_kinematic_target(driver, Vec3::new(0.0, 6.0, 0.0), Quat::IDENTITY, 1.0 / 60.0).unwrap();
    sim.update(1.0 / 60.0);
    assert_eq!(sim.mass(rod).unwrap().position(), Vec3::new(0.0, 5.0, 0.0));

    sim.postponed_solve(driver).unwrap();
    assert!(vec_approx_eq(sim.mass(rod).unwrap().position(), Vec3::new(0.0, 6.0, 0.0), 1e-4));
}

#[test]
fn test_kinematic_target_on_wrong_connection() {
    let mut sim = Simulation::new("wrong", vacuum_config());
    let a = sim.add_mass(MassType::Rod, 1.0, Vec3::ZERO).unwrap();
    let b = sim.add_mass(MassType::Rod, 1.0, Vec3::X).unwrap();
    let spring = sim.add_spring(a, b, 1.0, 1.0, 0.0).unwrap();
    assert!(sim.set_kinematic_target(spring, Vec3::Y, Quat::IDENTITY, 1.0 / 60.0).is_err());
}

#[test]
fn test_dynamic_mass_ignores_kinematic_connection() {
    let mut sim = Simulation::new("dynamic", vacuum_config());
    let rod = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 5.0, 0.0)).unwrap();
    let driver = sim.add_kinematic_connection(rod, false).unwrap();
    sim.set_kinematic_target(driver, Vec3::new(3.0, 5.0, 0.0), Quat::IDENTITY, 1.0 / 60.0).unwrap();
    sim.update(1.0 / 60.0);
    // Falls under gravity instead of following the path
    let p = sim.mass(rod).unwrap().position();
    assert_eq!(p.x, 0.0);
    assert!(p.y < 5.0);
}
