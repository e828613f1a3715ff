//! Unit tests for collider contacts during integration

use std::rc::Rc;

use glam::{Quat, Vec3};
use tacklesim_core::tests::test_helpers::{approx_eq_f32, vacuum_config};
use tacklesim_core::{
    BoxCollider, CapsuleCollider, Collider, ColliderMaterial, DensityType, MassKey, MassType, PhysicsError,
    PlaneSudokuCollider, Simulation, SphereCollider,
};

fn penetration(collider: &dyn Collider, point: Vec3) -> f32 {
    collider.test_point(point, point).map_or(0.0, |c| c.push.length())
}

fn create_test_floor() -> Rc<BoxCollider> {
    let material = ColliderMaterial { density: DensityType::Solid, friction_factor: 1.0, ..ColliderMaterial::default() };
    Rc::new(BoxCollider::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(5.0, 1.0, 5.0), Quat::IDENTITY).with_material(material))
}

fn create_test_flat_chunk() -> PlaneSudokuCollider {
    PlaneSudokuCollider::from_heights(&[vec![0.0; 3], vec![0.0; 3], vec![0.0; 3]], Vec3::new(-1.0, 0.0, -1.0), 1.0, 1.0)
        .expect("3x3 grid")
}

#[test]
fn test_plain_mass_rests_on_box() {
    let mut sim = Simulation::new("box", vacuum_config());
    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 0.5, 0.0)).unwrap();
    let floor = create_test_floor();
    sim.mass_mut(key).unwrap().quiet().add_collider(floor.clone()).unwrap();

    for _ in 0..2500 {
        sim.update(0.0);
        let p = sim.mass(key).unwrap().position();
        assert!(penetration(&*floor, p) < 1e-4, "penetrated at {p}");
    }
    let mass = sim.mass(key).unwrap();
    assert!(mass.position().y.abs() < 1e-3);
    assert!(mass.velocity().y.abs() < 1e-3);
    assert!(mass.is_collision());
    assert_eq!(mass.density(), DensityType::Solid);
}

#[test]
fn test_verlet_mass_rests_on_sphere() {
    let mut sim = Simulation::new("sphere", vacuum_config());
    let key = sim.add_verlet_mass(MassType::Line, 0.1, Vec3::new(0.0, 1.5, 0.0)).unwrap();
    let ball = Rc::new(SphereCollider::new(Vec3::ZERO, 1.0));
    sim.mass_mut(key).unwrap().quiet().add_collider(ball.clone()).unwrap();

    for _ in 0..2500 {
        sim.update(0.0);
        let p = sim.mass(key).unwrap().position();
        assert!(penetration(&*ball, p) < 1e-4, "penetrated at {p}");
    }
    let p = sim.mass(key).unwrap().position();
    assert!(approx_eq_f32(p.length(), 1.0, 1e-3));
}

#[test]
fn test_mass_bounces_on_height_chunk() {
    let mut sim = Simulation::new("bounce", vacuum_config());
    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    sim.mass_mut(key).unwrap().quiet().set_height_chunk(Some(create_test_flat_chunk()));

    let mut first_bounce = None;
    let mut prev = 0.0f32;
    for _ in 0..5000 {
        sim.update(0.0);
        let v = sim.mass(key).unwrap().velocity().y;
        if first_bounce.is_none() && prev < 0.0 && v > 0.0 {
            first_bounce = Some((prev, v));
        }
        prev = v;
    }

    let (before, after) = first_bounce.expect("mass never bounced");
    // Dropped from one metre: about 4.4 m/s at impact
    assert!(before < -4.0);
    assert!(after <= 0.151 * (before.abs() + 0.004), "bounce {after} from {before}");

    let mass = sim.mass(key).unwrap();
    assert!(mass.velocity().length() < 1e-3);
    assert!(approx_eq_f32(mass.position().y, 0.0, 1e-4));
}

#[test]
fn test_verlet_line_lands_on_height_chunk() {
    let mut sim = Simulation::new("landing", vacuum_config());
    let key = sim.add_verlet_mass(MassType::Line, 0.1, Vec3::new(0.0, 0.5, 0.0)).unwrap();
    sim.mass_mut(key).unwrap().quiet().set_height_chunk(Some(create_test_flat_chunk()));

    for _ in 0..2500 {
        sim.update(0.0);
        let y = sim.mass(key).unwrap().position().y;
        assert!(y >= -1e-3, "fell through at {y}");
    }
    assert!(sim.mass(key).unwrap().position().y < 0.05);
}

#[test]
fn test_collision_off_falls_through() {
    let mut sim = Simulation::new("through", vacuum_config());
    let key = sim.add_mass(MassType::Sinker, 1.0, Vec3::new(0.0, 0.1, 0.0)).unwrap();
    {
        let mut m = sim.mass_mut(key).unwrap();
        m.quiet().add_collider(create_test_floor()).unwrap();
        m.set_collision(tacklesim_core::CollisionType::None);
    }
    for _ in 0..1000 {
        sim.update(0.0);
    }
    assert!(sim.mass(key).unwrap().position().y < -0.5);
}

#[test]
fn test_collider_limit() {
    let mut sim = Simulation::new("limit", vacuum_config());
    let key: MassKey = sim.add_mass(MassType::Lure, 1.0, Vec3::ZERO).unwrap();
    let mut m = sim.mass_mut(key).unwrap();
    for i in 0..6 {
        let sphere = SphereCollider::new(Vec3::new(i as f32 * 3.0, -5.0, 0.0), 1.0);
        m.quiet().add_collider(Rc::new(sphere)).unwrap();
    }
    let extra = m.quiet().add_collider(Rc::new(SphereCollider::new(Vec3::ZERO, 1.0)));
    assert!(matches!(extra, Err(PhysicsError::TooManyColliders { max: 6, .. })));
    assert_eq!(m.colliders().len(), 6);
}

#[test]
fn test_box_pushes_through_nearest_face() {
    let floor = create_test_floor();
    let contact = floor.test_point(Vec3::new(0.0, -0.1, 0.0), Vec3::ZERO).expect("inside");
    assert!(approx_eq_f32(contact.push.y, 0.1, 1e-6));
    assert!((contact.normal - Vec3::Y).length() < 1e-6);
    assert!(floor.test_point(Vec3::new(0.0, 0.1, 0.0), Vec3::ZERO).is_none());
}

#[test]
fn test_capsule_push_out() {
    let capsule = CapsuleCollider::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 0.5);
    let contact = capsule.test_point(Vec3::new(1.0, 0.25, 0.0), Vec3::ZERO).expect("inside");
    assert!(approx_eq_f32(contact.push.y, 0.25, 1e-6));
    assert!(capsule.test_point(Vec3::new(1.0, 0.75, 0.0), Vec3::ZERO).is_none());
}

#[test]
fn test_height_chunk_outside_footprint() {
    let chunk = create_test_flat_chunk();
    assert!(chunk.test_point(Vec3::new(0.0, -0.5, 0.0), Vec3::ZERO).is_some());
    // Beyond the grid on x
    assert!(chunk.test_point(Vec3::new(1.5, -0.5, 0.0), Vec3::ZERO).is_none());
}
