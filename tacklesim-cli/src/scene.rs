//! JSON scene files for the runner and the viewer.
//!
//! A scene lists colliders, masses and connections. Masses refer to
//! colliders and connections refer to masses by their index in the file.

use std::error::Error;
use std::path::Path;
use std::rc::Rc;

use glam::{Quat, Vec3};
use serde::Deserialize;
use tacklesim_core::{
    BoxCollider, CapsuleCollider, Collider, ColliderMaterial, CollisionType, MassKey, MassType, PlaneSudokuCollider,
    Simulation, SimulationConfig, SphereCollider,
};
use tracing::info;

fn default_dt() -> f32 {
    1.0 / 60.0
}

fn default_frames() -> usize {
    300
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub config: SimulationConfig,
    /// Frame delta handed to every update
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_frames")]
    pub frames: usize,
    #[serde(default)]
    pub colliders: Vec<ColliderSpec>,
    #[serde(default)]
    pub masses: Vec<MassSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassVariantSpec {
    #[default]
    Plain,
    Verlet,
    Rigid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MassSpec {
    #[serde(rename = "type", default)]
    pub mass_type: MassType,
    #[serde(default)]
    pub variant: MassVariantSpec,
    pub mass: f32,
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default)]
    pub motor: Vec3,
    /// Rigid bodies only
    pub angular_velocity: Option<Vec3>,
    #[serde(default)]
    pub kinematic: bool,
    pub radius: Option<f32>,
    pub collision: Option<CollisionType>,
    /// Indices into the scene colliders. A heightfield becomes the height chunk.
    #[serde(default)]
    pub colliders: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionSpec {
    Spring {
        a: usize,
        b: usize,
        k: f32,
        length: f32,
        #[serde(default)]
        friction: f32,
    },
    VerletSpring {
        a: usize,
        b: usize,
        length: f32,
        #[serde(default)]
        friction: f32,
        #[serde(default)]
        compressible: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColliderSpec {
    Box {
        center: Vec3,
        half_extents: Vec3,
        #[serde(default)]
        rotation: Quat,
        #[serde(default)]
        material: ColliderMaterial,
    },
    Sphere {
        center: Vec3,
        radius: f32,
        #[serde(default)]
        material: ColliderMaterial,
    },
    Capsule {
        start: Vec3,
        end: Vec3,
        radius: f32,
        #[serde(default)]
        material: ColliderMaterial,
    },
    Heightfield {
        origin: Vec3,
        heights: Vec<Vec<f32>>,
        #[serde(default = "default_one")]
        horizontal_scale: f32,
        #[serde(default = "default_one")]
        vertical_scale: f32,
    },
}

enum BuiltCollider {
    Shape(Rc<dyn Collider>),
    Chunk(PlaneSudokuCollider),
}

/// A simulation built from a scene, with its masses in file order
pub struct LoadedScene {
    pub sim: Simulation,
    pub masses: Vec<MassKey>,
    pub dt: f32,
    pub frames: usize,
}

impl Scene {
    pub fn from_json_str(src: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let src = std::fs::read_to_string(path)?;
        Self::from_json_str(&src)
    }

    pub fn build(&self, name: &str) -> Result<LoadedScene, Box<dyn Error>> {
        let colliders = self.colliders.iter().map(ColliderSpec::build).collect::<Result<Vec<_>, _>>()?;
        let mut sim = Simulation::new(name, self.config.clone());

        let mut masses = Vec::with_capacity(self.masses.len());
        for (index, entry) in self.masses.iter().enumerate() {
            let key = match entry.variant {
                MassVariantSpec::Plain => sim.add_mass(entry.mass_type, entry.mass, entry.position)?,
                MassVariantSpec::Verlet => sim.add_verlet_mass(entry.mass_type, entry.mass, entry.position)?,
                MassVariantSpec::Rigid => {
                    sim.add_rigid_body(entry.mass_type, entry.mass, entry.position, entry.radius.unwrap_or(0.1))?
                }
            };
            let mut m = sim.mass_mut(key).ok_or("mass vanished while loading")?;
            m.set_velocity(entry.velocity);
            m.set_motor(entry.motor);
            m.set_kinematic(entry.kinematic);
            if let Some(collision) = entry.collision {
                m.set_collision(collision);
            }
            let raw = m.quiet();
            if let Some(radius) = entry.radius {
                raw.set_radius(radius);
            }
            if let Some(omega) = entry.angular_velocity {
                let body = raw.rigid_body_mut().ok_or_else(|| format!("mass {index} is not a rigid body"))?;
                body.try_set_angular_velocity(omega)?;
            }
            for &c in &entry.colliders {
                match colliders.get(c) {
                    Some(BuiltCollider::Shape(shape)) => raw.add_collider(Rc::clone(shape))?,
                    Some(BuiltCollider::Chunk(chunk)) => raw.set_height_chunk(Some(chunk.clone())),
                    None => return Err(format!("mass {index} refers to missing collider {c}").into()),
                }
            }
            masses.push(key);
        }

        for (index, entry) in self.connections.iter().enumerate() {
            let lookup = |i: usize| {
                masses.get(i).copied().ok_or_else(|| format!("connection {index} refers to missing mass {i}"))
            };
            match *entry {
                ConnectionSpec::Spring { a, b, k, length, friction } => {
                    sim.add_spring(lookup(a)?, lookup(b)?, k, length, friction)?;
                }
                ConnectionSpec::VerletSpring { a, b, length, friction, compressible } => {
                    sim.add_verlet_spring(lookup(a)?, lookup(b)?, length, friction, compressible)?;
                }
            }
        }
        sim.refresh_object_arrays();

        info!(
            scene = name,
            masses = masses.len(),
            connections = self.connections.len(),
            colliders = colliders.len(),
            "scene loaded"
        );
        Ok(LoadedScene { sim, masses, dt: self.dt, frames: self.frames })
    }
}

impl ColliderSpec {
    fn build(&self) -> Result<BuiltCollider, Box<dyn Error>> {
        Ok(match self {
            ColliderSpec::Box { center, half_extents, rotation, material } => BuiltCollider::Shape(Rc::new(
                BoxCollider::new(*center, *half_extents, *rotation).with_material(*material),
            )),
            ColliderSpec::Sphere { center, radius, material } => {
                BuiltCollider::Shape(Rc::new(SphereCollider::new(*center, *radius).with_material(*material)))
            }
            ColliderSpec::Capsule { start, end, radius, material } => {
                BuiltCollider::Shape(Rc::new(CapsuleCollider::new(*start, *end, *radius).with_material(*material)))
            }
            ColliderSpec::Heightfield { origin, heights, horizontal_scale, vertical_scale } => BuiltCollider::Chunk(
                PlaneSudokuCollider::from_heights(heights, *origin, *horizontal_scale, *vertical_scale)?,
            ),
        })
    }
}

/// Load and build a scene file in one go
pub fn load(path: &Path) -> Result<LoadedScene, Box<dyn Error>> {
    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("scene");
    Scene::from_path(path)?.build(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENDULUM: &str = r#"{
        "dt": 0.02,
        "frames": 10,
        "colliders": [
            { "type": "box", "center": [0, -1, 0], "half_extents": [5, 1, 5] },
            { "type": "heightfield", "origin": [-1, 0, -1], "heights": [[0, 0], [0, 0]] }
        ],
        "masses": [
            { "type": "Rod", "mass": 1.0, "position": [0, 3, 0], "kinematic": true },
            { "type": "Sinker", "mass": 0.5, "position": [0, 2, 0], "colliders": [0, 1] }
        ],
        "connections": [
            { "type": "spring", "a": 0, "b": 1, "k": 100, "length": 1.0 }
        ]
    }"#;

    #[test]
    fn test_scene_builds_simulation() {
        let loaded = Scene::from_json_str(PENDULUM).unwrap().build("pendulum").unwrap();
        assert_eq!(loaded.masses.len(), 2);
        assert_eq!(loaded.dt, 0.02);
        assert_eq!(loaded.frames, 10);
        assert_eq!(loaded.sim.connections().len(), 1);

        let top = loaded.sim.mass(loaded.masses[0]).unwrap();
        assert!(top.is_kinematic());
        let bob = loaded.sim.mass(loaded.masses[1]).unwrap();
        assert_eq!(bob.mass_type(), MassType::Sinker);
        assert_eq!(bob.colliders().len(), 1);
        assert!(bob.height_chunk().is_some());
    }

    #[test]
    fn test_missing_mass_index_is_reported() {
        let src = r#"{
            "masses": [{ "mass": 1.0, "position": [0, 0, 0] }],
            "connections": [{ "type": "spring", "a": 0, "b": 3, "k": 1, "length": 1 }]
        }"#;
        let err = Scene::from_json_str(src).unwrap().build("broken").err().unwrap();
        assert!(err.to_string().contains("missing mass 3"));
    }

    #[test]
    fn test_rigid_body_spin() {
        let spun = r#"{ "masses": [
            { "variant": "rigid", "mass": 1.0, "position": [0, 1, 0], "angular_velocity": [0, 2, 0] }
        ] }"#;
        let loaded = Scene::from_json_str(spun).unwrap().build("spun").unwrap();
        let body = loaded.sim.mass(loaded.masses[0]).unwrap().rigid_body().unwrap();
        assert_eq!(body.angular_velocity(), Vec3::new(0.0, 2.0, 0.0));

        // 1e39 overflows f32 to infinity
        let broken = r#"{ "masses": [
            { "variant": "rigid", "mass": 1.0, "position": [0, 1, 0], "angular_velocity": [0, 1e39, 0] }
        ] }"#;
        let err = Scene::from_json_str(broken).unwrap().build("broken").err().unwrap();
        assert!(err.to_string().contains("angular velocity is not finite"), "{err}");

        let plain = r#"{ "masses": [{ "mass": 1.0, "position": [0, 1, 0], "angular_velocity": [0, 1, 0] }] }"#;
        let err = Scene::from_json_str(plain).unwrap().build("plain").err().unwrap();
        assert!(err.to_string().contains("not a rigid body"));
    }

    #[test]
    fn test_demo_scenes_load() {
        for src in [include_str!("../../demos/pendulum.json"), include_str!("../../demos/line_on_floor.json")] {
            let mut loaded = Scene::from_json_str(src).unwrap().build("demo").unwrap();
            for _ in 0..10 {
                loaded.sim.update(loaded.dt);
            }
            assert!(loaded.masses.iter().all(|k| loaded.sim.mass(*k).unwrap().position().is_finite()));
        }
    }

    #[test]
    fn test_defaults() {
        let scene = Scene::from_json_str("{}").unwrap();
        assert_eq!(scene.frames, 300);
        assert!(scene.masses.is_empty());
        assert_eq!(scene.config, SimulationConfig::default());
    }
}
