//! Unit tests for rigid bodies and their attached points

use glam::Vec3;
use tacklesim_core::mass::rigid::{MAX_ANGULAR_VELOCITY, MAX_CONTACTS};
use tacklesim_core::tests::test_helpers::{approx_eq_f32, vec_approx_eq, weightless_config};
use tacklesim_core::{ContactPoint, MassKey, MassType, PhysicsError, Simulation};

fn create_test_body() -> (Simulation, MassKey) {
    let mut sim = Simulation::new("body", weightless_config());
    let body = sim.add_rigid_body(MassType::Lure, 1.0, Vec3::new(0.0, 5.0, 0.0), 0.1).unwrap();
    (sim, body)
}

#[test]
fn test_zero_mass_body_rejected() {
    let mut sim = Simulation::new("zero", weightless_config());
    let result = sim.add_rigid_body(MassType::Lure, 0.0, Vec3::ZERO, 0.1);
    assert!(matches!(result, Err(PhysicsError::DegenerateInertia { .. })));
    assert!(sim.masses().is_empty());
}

#[test]
fn test_uniform_inertia() {
    let (sim, body) = create_test_body();
    let state = sim.mass(body).unwrap().rigid_body().unwrap();
    assert_eq!(state.inertia_tensor(), Vec3::splat(0.4));
}

#[test]
fn test_degenerate_inertia_tensor_is_restored() {
    let (mut sim, body) = create_test_body();
    let mut m = sim.mass_mut(body).unwrap();
    let result = m.quiet().set_inertia_tensor(Vec3::new(1.0, 0.0, 1.0));
    assert!(matches!(result, Err(PhysicsError::DegenerateInertia { axis: 'y', .. })));
    assert_eq!(m.rigid_body().unwrap().inertia_tensor(), Vec3::splat(0.4));

    m.quiet().set_inertia_tensor(Vec3::new(1.0, 2.0, 3.0)).unwrap();
    assert_eq!(m.rigid_body().unwrap().inertia_tensor(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_constant_spin_rotates_body() {
    let (mut sim, body) = create_test_body();
    let spin = Vec3::new(0.0, 0.0, std::f32::consts::PI);
    sim.mass_mut(body).unwrap().quiet().rigid_body_mut().unwrap().set_angular_velocity(spin);

    // Half a second at pi rad/s is a quarter turn about z
    for _ in 0..1250 {
        sim.update(0.0);
    }
    let mass = sim.mass(body).unwrap();
    assert!(vec_approx_eq(mass.rotation() * Vec3::X, Vec3::Y, 1e-3));
    assert!(vec_approx_eq(mass.rigid_body().unwrap().angular_velocity(), spin, 1e-5));
}

#[test]
fn test_non_finite_angular_velocity_is_discarded() {
    let (mut sim, body) = create_test_body();
    let spin = Vec3::new(0.0, 1.0, 0.0);
    {
        let mut m = sim.mass_mut(body).unwrap();
        let state = m.quiet().rigid_body_mut().unwrap();
        assert!(state.set_angular_velocity(spin));
        assert!(!state.set_angular_velocity(Vec3::new(f32::NAN, 0.0, 0.0)));
        let result = state.try_set_angular_velocity(Vec3::new(0.0, f32::INFINITY, 0.0));
        assert!(matches!(result, Err(PhysicsError::NonFiniteAngularVelocity(_))));
    }
    sim.update(0.0);

    let mass = sim.mass(body).unwrap();
    assert!(vec_approx_eq(mass.rigid_body().unwrap().angular_velocity(), spin, 1e-5));
    assert!(mass.rotation().is_finite());
}

#[test]
fn test_angular_velocity_is_clamped() {
    let (mut sim, body) = create_test_body();
    sim.mass_mut(body).unwrap().quiet().rigid_body_mut().unwrap().set_angular_velocity(Vec3::new(0.0, 100.0, 0.0));
    sim.update(0.0);
    let speed = sim.mass(body).unwrap().rigid_body().unwrap().angular_velocity().length();
    assert!(speed <= MAX_ANGULAR_VELOCITY * 1.0001, "speed {speed}");
    assert!(speed > MAX_ANGULAR_VELOCITY * 0.999);
}

#[test]
fn test_point_motor_drives_parent() {
    let (mut sim, body) = create_test_body();
    let point = sim.add_point_of_rigid_body(body, Vec3::X, None).unwrap();
    assert!(vec_approx_eq(sim.mass(point).unwrap().position(), Vec3::new(1.0, 5.0, 0.0), 1e-6));
    sim.mass_mut(point).unwrap().set_motor(Vec3::Y);

    for _ in 0..250 {
        sim.update(0.0);
    }

    // F = 1 N on 1 kg; torque = X x Y = Z on inertia 0.4
    let parent = sim.mass(body).unwrap();
    assert!(approx_eq_f32(parent.velocity().y, 0.1, 1e-3));
    let omega = parent.rigid_body().unwrap().angular_velocity();
    assert!(approx_eq_f32(omega.z, 0.25, 5e-3), "omega {omega}");
    assert!(omega.x.abs() < 1e-6 && omega.y.abs() < 1e-6);

    let expected = parent.local_to_world(Vec3::X);
    assert!(vec_approx_eq(sim.mass(point).unwrap().position(), expected, 1e-3));
}

#[test]
fn test_point_stays_on_fast_parent() {
    let (mut sim, body) = create_test_body();
    let point = sim.add_point_of_rigid_body(body, Vec3::X, None).unwrap();
    {
        let mut m = sim.mass_mut(body).unwrap();
        m.set_velocity(Vec3::new(15.0, 0.0, 0.0));
        m.quiet().rigid_body_mut().unwrap().set_angular_velocity(Vec3::new(0.0, 0.0, 2.0));
    }

    for _ in 0..10 {
        sim.update(0.0);
        let parent = sim.mass(body).unwrap();
        let expected = parent.local_to_world(Vec3::X);
        let got = sim.mass(point).unwrap().position();
        assert!(vec_approx_eq(got, expected, 1e-5), "expected {expected} got {got}");
        assert!(vec_approx_eq(sim.mass(point).unwrap().velocity(), parent.point_velocity(Vec3::X), 1e-5));
    }
}

#[test]
fn test_point_needs_rigid_parent() {
    let mut sim = Simulation::new("plain", weightless_config());
    let plain = sim.add_mass(MassType::Lure, 1.0, Vec3::ZERO).unwrap();
    let result = sim.add_point_of_rigid_body(plain, Vec3::X, None);
    assert!(matches!(result, Err(PhysicsError::InvalidConnection(_))));
}

#[test]
fn test_contact_buffer_is_capped() {
    let (mut sim, body) = create_test_body();
    let contacts = vec![ContactPoint::default(); MAX_CONTACTS + 5];
    let mut m = sim.mass_mut(body).unwrap();
    let state = m.quiet().rigid_body_mut().unwrap();
    state.set_contacts(&contacts);
    assert_eq!(state.contacts().len(), MAX_CONTACTS);
    assert_eq!(state.take_collision_impulse_velocity(), Vec3::ZERO);
}

#[test]
fn test_impulse_at_offset_spins_body() {
    let (mut sim, body) = create_test_body();
    let mut m = sim.mass_mut(body).unwrap();
    m.quiet().apply_impulse_at(Vec3::Y, Vec3::X);
    assert!(approx_eq_f32(m.velocity().y, 1.0, 1e-6));
    // X x Y = Z over inertia 0.4
    assert!(approx_eq_f32(m.rigid_body().unwrap().angular_velocity().z, 2.5, 1e-5));
}
