//! Unit tests for entity registration, dense arrays and leak detection

use glam::Vec3;
use tacklesim_core::tests::test_helpers::{vacuum_config, weightless_config};
use tacklesim_core::{MassKey, MassType, PhysicsError, RefLeak, Simulation, SimulationConfig, Uid};

fn create_test_line(n: usize) -> (Simulation, Vec<MassKey>) {
    let mut sim = Simulation::new("line", weightless_config());
    let keys: Vec<MassKey> = (0..n)
        .map(|i| sim.add_mass(MassType::Line, 0.01, Vec3::new(i as f32 * 0.1, 1.0, 0.0)).unwrap())
        .collect();
    for pair in keys.windows(2) {
        sim.add_spring(pair[0], pair[1], 100.0, 0.1, 0.0).unwrap();
    }
    (sim, keys)
}

#[test]
fn test_first_user_mass_follows_padding() {
    let (sim, keys) = create_test_line(2);
    let first = sim.mass(keys[0]).unwrap();
    assert_eq!(first.uid(), Uid(3));
    assert_eq!(first.iid().0, -4);
    assert_eq!(sim.mass_by_uid(Uid(3)), Some(keys[0]));
    assert_eq!(sim.mass_by_uid(Uid(0)), None);
}

#[test]
fn test_dense_masses_are_padded_to_four() {
    for (n, padded) in [(1, 4), (4, 4), (5, 8), (7, 8)] {
        let (mut sim, keys) = create_test_line(n);
        sim.refresh_object_arrays();
        assert_eq!(sim.dense_masses(), keys.as_slice());
        assert_eq!(sim.padded_dense_masses().len(), padded);
    }
}

#[test]
fn test_padding_is_hidden() {
    let (mut sim, _) = create_test_line(1);
    sim.refresh_object_arrays();
    let pad = sim.padded_dense_masses()[1];
    assert!(sim.mass(pad).is_none());
    assert!(sim.mass_mut(pad).is_none());
    assert!(matches!(sim.remove_mass(pad), Err(PhysicsError::UnknownMass)));
}

#[test]
fn test_containers_agree_after_churn() {
    let (mut sim, keys) = create_test_line(6);
    let springs = sim.connections().to_vec();
    sim.remove_connection(springs[2]).unwrap();
    sim.remove_mass(keys[5]).unwrap();
    sim.remove_connection(springs[4]).unwrap();
    sim.add_mass(MassType::Sinker, 0.02, Vec3::ZERO).unwrap();
    sim.refresh_object_arrays();

    assert_eq!(sim.dense_masses().len(), 6);
    assert_eq!(sim.masses().len(), 6);
    assert_eq!(sim.mass_dict_len(), 6);
    assert_eq!(sim.dense_connections().len(), 3);
    assert_eq!(sim.impulse_springs().len(), 3);
    assert_eq!(sim.connection_dict_len(), 3);
    assert!(sim.detect_ref_leaks().is_empty());
}

#[test]
fn test_disabled_mass_leaves_uid_lookup() {
    let (mut sim, keys) = create_test_line(3);
    let uid = sim.mass(keys[1]).unwrap().uid();
    sim.refresh_object_arrays();
    assert_eq!(sim.mass_by_uid(uid), Some(keys[1]));

    sim.mass_mut(keys[1]).unwrap().set_disable_simulation(true);
    sim.refresh_object_arrays();
    assert_eq!(sim.mass_by_uid(uid), None);
    assert_eq!(sim.mass_dict_len(), 2);
    assert!(sim.dense_connections().is_empty());
    assert!(sim.detect_ref_leaks().is_empty());

    sim.mass_mut(keys[1]).unwrap().set_disable_simulation(false);
    sim.refresh_object_arrays();
    assert_eq!(sim.mass_by_uid(uid), Some(keys[1]));
    assert_eq!(sim.dense_connections().len(), 2);
    assert!(sim.detect_ref_leaks().is_empty());
}

#[test]
fn test_removed_mass_leaves_dangling_spring() {
    let (mut sim, keys) = create_test_line(2);
    sim.remove_mass(keys[1]).unwrap();
    sim.refresh_object_arrays();

    let leaks = sim.detect_ref_leaks();
    assert!(leaks.iter().any(|l| matches!(l, RefLeak::DanglingMass { what: "connection", .. })));
    assert!(leaks.iter().any(|l| matches!(
        l,
        RefLeak::ContainerMismatch { what: "connection", dense: 0, list: 1, dict: 1 }
    )));
    // The surviving mass is still consistent
    assert!(!leaks.iter().any(|l| matches!(l, RefLeak::ContainerMismatch { what: "mass", .. })));
}

#[test]
fn test_capacity_limits() {
    let config = SimulationConfig { max_masses: 2, max_connections: 1, max_objects: 1, ..vacuum_config() };
    let mut sim = Simulation::new("small", config);
    let a = sim.add_mass(MassType::Line, 1.0, Vec3::ZERO).unwrap();
    let b = sim.add_mass(MassType::Line, 1.0, Vec3::X).unwrap();
    assert!(matches!(
        sim.add_mass(MassType::Line, 1.0, Vec3::Y),
        Err(PhysicsError::CapacityExceeded { what: "mass", max: 2 })
    ));

    sim.add_spring(a, b, 1.0, 1.0, 0.0).unwrap();
    assert!(matches!(
        sim.add_verlet_spring(a, b, 1.0, 0.0, true),
        Err(PhysicsError::CapacityExceeded { what: "connection", max: 1 })
    ));

    sim.add_object(Default::default()).unwrap();
    assert!(matches!(
        sim.add_object(Default::default()),
        Err(PhysicsError::CapacityExceeded { what: "object", max: 1 })
    ));

    // Room frees up after removal
    sim.remove_mass(b).unwrap();
    assert!(sim.add_mass(MassType::Line, 1.0, Vec3::Y).is_ok());
}

#[test]
fn test_unknown_keys() {
    let (mut sim, keys) = create_test_line(2);
    sim.remove_mass(keys[1]).unwrap();
    assert!(matches!(sim.remove_mass(keys[1]), Err(PhysicsError::UnknownMass)));
    assert!(matches!(sim.add_spring(keys[0], keys[1], 1.0, 1.0, 0.0), Err(PhysicsError::UnknownMass)));
    assert!(sim.mass(keys[1]).is_none());
}

#[test]
fn test_clear_keeps_padding() {
    let (mut sim, _) = create_test_line(3);
    sim.add_object(Default::default()).unwrap();
    sim.clear();
    assert!(sim.masses().is_empty());
    assert!(sim.connections().is_empty());
    assert!(sim.objects().is_empty());
    assert!(sim.padded_dense_masses().is_empty());

    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    sim.refresh_object_arrays();
    assert_eq!(sim.padded_dense_masses().len(), 4);
    assert!(sim.detect_ref_leaks().is_empty());
    sim.update(1.0 / 60.0);
    assert!(sim.mass(key).is_some());
}

#[test]
fn test_global_reset_and_velocity_limit() {
    let (mut sim, keys) = create_test_line(3);
    for &key in &keys {
        sim.mass_mut(key).unwrap().set_velocity(Vec3::new(1.0, 0.0, 0.0));
    }
    sim.set_global_velocity_limit(3.0);
    sim.global_reset();
    for &key in &keys {
        let mass = sim.mass(key).unwrap();
        assert_eq!(mass.velocity(), Vec3::ZERO);
        assert_eq!(mass.velocity_limit(), 3.0);
        assert!(!mass.is_stopped());
    }
}

#[test]
fn test_visual_offset_keeps_visible_position() {
    let (mut sim, keys) = create_test_line(1);
    sim.set_visual_position_offset(Vec3::new(10.0, 0.0, 0.0));
    let mass = sim.mass(keys[0]).unwrap();
    assert_eq!(mass.position(), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(mass.physical_position(), Vec3::new(-10.0, 1.0, 0.0));

    // New masses take the current offset
    let key = sim.add_mass(MassType::Line, 1.0, Vec3::new(10.0, 2.0, 0.0)).unwrap();
    assert_eq!(sim.mass(key).unwrap().physical_position(), Vec3::new(0.0, 2.0, 0.0));
}
