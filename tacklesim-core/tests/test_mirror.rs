//! Unit tests for mirror simulations and main state sync

use glam::Vec3;
use tacklesim_core::tests::test_helpers::{positions, run_frames, vacuum_config, weightless_config};
use tacklesim_core::{ConnectionKey, MassKey, MassType, PhysicsError, Simulation};

fn create_test_source() -> (Simulation, [MassKey; 2], ConnectionKey) {
    let mut sim = Simulation::new("rig", vacuum_config());
    let top = sim.add_mass(MassType::Rod, 1.0, Vec3::new(0.0, 3.0, 0.0)).unwrap();
    let bob = sim.add_mass(MassType::Sinker, 0.5, Vec3::new(0.2, 2.0, 0.0)).unwrap();
    sim.mass_mut(top).unwrap().set_kinematic(true);
    let spring = sim.add_spring(top, bob, 100.0, 1.0, 0.0).unwrap();
    (sim, [top, bob], spring)
}

#[test]
fn test_mirror_keeps_uids() {
    let (source, [top, bob], spring) = create_test_source();
    let mirror = Simulation::mirror_of(&source).unwrap();

    assert!(source.is_main());
    assert!(!mirror.is_main());
    assert_eq!(mirror.name(), "rig-mirror");
    for key in [top, bob] {
        let (ours, theirs) = (mirror.mass(key).unwrap(), source.mass(key).unwrap());
        assert_eq!(ours.uid(), theirs.uid());
        assert_eq!(ours.source(), Some(theirs.uid()));
        assert!(ours.iid().0 > 0);
        assert_eq!(theirs.source(), None);
    }
    assert_eq!(mirror.connection(spring).unwrap().uid(), source.connection(spring).unwrap().uid());
    assert_eq!(mirror.dense_masses(), source.dense_masses());
}

#[test]
fn test_mirror_steps_like_source() {
    let (mut source, _, _) = create_test_source();
    let mut mirror = Simulation::mirror_of(&source).unwrap();
    run_frames(&mut source, 10, 1.0 / 60.0);
    run_frames(&mut mirror, 10, 1.0 / 60.0);
    assert_eq!(positions(&mirror), positions(&source));
}

#[test]
fn test_sync_main_copies_state() {
    let (mut source, [_, bob], _) = create_test_source();
    let mut mirror = Simulation::mirror_of(&source).unwrap();
    source.mass_mut(bob).unwrap().set_velocity(Vec3::new(1.0, 0.0, 0.0));
    run_frames(&mut source, 5, 1.0 / 60.0);
    assert_ne!(positions(&mirror), positions(&source));

    mirror.sync_main(&mut source);
    assert_eq!(positions(&mirror), positions(&source));
    assert_eq!(mirror.mass(bob).unwrap().velocity(), source.mass(bob).unwrap().velocity());
}

#[test]
fn test_sync_main_applies_immediate_spring_length() {
    let (mut source, _, spring) = create_test_source();
    let mut mirror = Simulation::mirror_of(&source).unwrap();
    {
        let theirs = source.connection_mut(spring).unwrap().as_spring_mut().unwrap();
        theirs.set_spring_length_immediate(2.0).unwrap();
        theirs.set_spring_constant(250.0);
    }
    mirror.sync_main(&mut source);

    let ours = mirror.connection(spring).unwrap().as_spring().unwrap();
    assert_eq!(ours.current_spring_length(), 2.0);
    assert_eq!(ours.spring_length(), 2.0);
    assert_eq!(ours.spring_constant(), 250.0);
}

#[test]
fn test_source_disable_reaches_mirror() {
    let (mut source, [top, bob], _) = create_test_source();
    let mut mirror = Simulation::mirror_of(&source).unwrap();
    source.mass_mut(bob).unwrap().set_disable_simulation(true);
    mirror.sync_main(&mut source);

    assert!(mirror.mass(bob).unwrap().is_simulation_disabled());
    assert_eq!(mirror.dense_masses(), &[top]);

    // The source drops the mass from its UID lookup once it refreshes
    source.refresh_object_arrays();
    source.mass_mut(bob).unwrap().set_disable_simulation(false);
    mirror.sync_main(&mut source);
    assert_eq!(mirror.dense_masses(), &[top, bob]);
}

#[test]
fn test_mirror_rejects_non_finite_spin() {
    let mut source = Simulation::new("spun", weightless_config());
    let body = source.add_rigid_body(MassType::Lure, 1.0, Vec3::new(0.0, 5.0, 0.0), 0.1).unwrap();
    let point = source.add_point_of_rigid_body(body, Vec3::X, None).unwrap();
    assert!(Simulation::mirror_of(&source).is_ok());

    // A NaN push on an off-centre point reaches the parent as torque
    source.mass_mut(point).unwrap().set_motor(Vec3::new(0.0, f32::NAN, 0.0));
    source.update(0.0);
    assert!(source.mass(body).unwrap().rigid_body().unwrap().angular_velocity().is_nan());

    let result = Simulation::mirror_of(&source);
    assert!(matches!(result, Err(PhysicsError::NonFiniteAngularVelocity(_))));
}
