//! Ground height queries against a host-supplied terrain.

use glam::Vec3;

use crate::collider::PlaneSudokuCollider;

/// Height returned when no terrain can answer
pub const NO_GROUND_HEIGHT: f32 = -1000.0;

/// Lift applied by `modify` queries so masses rest on top of the surface
const GROUND_LIFT: f32 = 0.0125;

/// Sample spacing of a mass's private height chunk
pub const HEIGHT_CHUNK_DELTA: f32 = 0.5 / 3.0;

/// Offset written into height chunk samples above the sampled ground
const HEIGHT_CHUNK_LIFT: f32 = 0.02;

/// Terrain provider consulted when no better ground source is available
pub trait Terrain {
    fn is_valid(&self) -> bool;
    fn height(&self, pos: Vec3) -> f32;
    fn normal(&self, pos: Vec3) -> Vec3;
}

/// Infinite horizontal ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain {
    pub height: f32,
}

impl Terrain for FlatTerrain {
    fn is_valid(&self) -> bool {
        true
    }

    fn height(&self, _pos: Vec3) -> f32 {
        self.height
    }

    fn normal(&self, _pos: Vec3) -> Vec3 {
        Vec3::Y
    }
}

/// Ground height below `pos`, or [`NO_GROUND_HEIGHT`] without a valid terrain
pub fn ground_height(terrain: Option<&dyn Terrain>, pos: Vec3, modify: bool) -> f32 {
    match terrain {
        Some(t) if t.is_valid() => t.height(pos) + if modify { GROUND_LIFT } else { 0.0 },
        _ => NO_GROUND_HEIGHT,
    }
}

/// Ground point and normal below `origin`
pub fn ground_collision(terrain: Option<&dyn Terrain>, origin: Vec3) -> (Vec3, Vec3) {
    match terrain {
        Some(t) if t.is_valid() => (Vec3::new(origin.x, t.height(origin), origin.z), t.normal(origin)),
        _ => (Vec3::new(origin.x, NO_GROUND_HEIGHT, origin.z), Vec3::Y),
    }
}

/// Re-sample `chunk` around `position` when the mass enters a new 0.1 unit cell.
///
/// Returns `true` when the chunk moved.
pub fn update_height_chunk(
    position: Vec3,
    terrain: Option<&dyn Terrain>,
    chunk: &mut PlaneSudokuCollider,
    modify: bool,
) -> bool {
    let half = (chunk.size_x() - 1) as f32 * HEIGHT_CHUNK_DELTA * 0.5;
    let corner = Vec3::new(position.x - half, 0.0, position.z - half);
    let index_x = (corner.x * 10.0) as i32;
    let index_z = (corner.z * 10.0) as i32;
    if index_x == chunk.index_x() && index_z == chunk.index_z() {
        return false;
    }

    chunk.move_to(corner, HEIGHT_CHUNK_DELTA, index_x, index_z);
    for i in 0..chunk.size_x() {
        for j in 0..chunk.size_z() {
            let sample = corner + Vec3::new(i as f32 * HEIGHT_CHUNK_DELTA, 0.0, j as f32 * HEIGHT_CHUNK_DELTA);
            chunk.set_height(i, j, ground_height(terrain, sample, modify) + HEIGHT_CHUNK_LIFT);
        }
    }
    chunk.recompute_dimensions();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_terrain_falls_back() {
        assert_eq!(ground_height(None, Vec3::ZERO, false), NO_GROUND_HEIGHT);
        let flat = FlatTerrain { height: 2.0 };
        assert_eq!(ground_height(Some(&flat), Vec3::ZERO, false), 2.0);
        assert!((ground_height(Some(&flat), Vec3::ZERO, true) - 2.0125).abs() < 1e-6);
    }

    #[test]
    fn test_height_chunk_only_moves_between_cells() {
        let flat = FlatTerrain { height: -0.5 };
        let mut chunk = PlaneSudokuCollider::new(4, 4, Vec3::ZERO, 1.0, 1.0).unwrap();
        assert!(update_height_chunk(Vec3::new(1.0, 0.0, 1.0), Some(&flat), &mut chunk, false));
        assert!(!update_height_chunk(Vec3::new(1.001, 0.0, 1.001), Some(&flat), &mut chunk, false));
        let h = chunk.height_at_point(Vec3::new(1.0, 0.0, 1.0));
        assert!((h - (-0.48)).abs() < 1e-5, "height was {h}");
    }
}
