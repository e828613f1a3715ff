use glam::Vec3;

use super::{Collider, Contact, DensityType};
use crate::error::{PhysicsError, Result};

/// Regular height grid anchored at its minimum corner.
///
/// Cells are split into two triangles along the `(0,0)-(1,1)` diagonal.
/// Samples are stored in grid units and scaled by `scale.y`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSudokuCollider {
    data: Vec<f32>,
    size_x: usize,
    size_z: usize,
    position: Vec3,
    scale: Vec3,
    dimensions: Vec3,
    index_x: i32,
    index_z: i32,
    dirty: bool,
}

impl PlaneSudokuCollider {
    /// Flat grid of `size_x` by `size_z` zero samples
    pub fn new(size_x: usize, size_z: usize, position: Vec3, horizontal_scale: f32, vertical_scale: f32) -> Result<Self> {
        if size_x < 2 || size_z < 2 {
            return Err(PhysicsError::DegenerateHeightfield { x: size_x, z: size_z });
        }
        let mut grid = Self {
            data: vec![0.0; size_x * size_z],
            size_x,
            size_z,
            position,
            scale: Vec3::new(horizontal_scale, vertical_scale, horizontal_scale),
            dimensions: Vec3::ZERO,
            index_x: -1,
            index_z: -1,
            dirty: false,
        };
        grid.recompute_dimensions();
        Ok(grid)
    }

    /// Grid from rows of samples indexed `[x][z]`
    pub fn from_heights(heights: &[Vec<f32>], position: Vec3, horizontal_scale: f32, vertical_scale: f32) -> Result<Self> {
        let size_x = heights.len();
        let size_z = heights.first().map_or(0, Vec::len);
        let mut grid = Self::new(size_x, size_z, position, horizontal_scale, vertical_scale)?;
        for (i, row) in heights.iter().enumerate() {
            if row.len() != size_z {
                return Err(PhysicsError::DegenerateHeightfield { x: size_x, z: row.len() });
            }
            for (j, &h) in row.iter().enumerate() {
                grid.data[i * size_z + j] = h;
            }
        }
        grid.recompute_dimensions();
        Ok(grid)
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_z(&self) -> usize {
        self.size_z
    }

    pub fn index_x(&self) -> i32 {
        self.index_x
    }

    pub fn index_z(&self) -> i32 {
        self.index_z
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn dimensions(&self) -> Vec3 {
        self.dimensions
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn height(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.size_z + j]
    }

    pub fn set_height(&mut self, i: usize, j: usize, value: f32) {
        self.data[i * self.size_z + j] = value;
        self.dirty = true;
    }

    /// Refresh the bounding extents after samples changed
    pub fn recompute_dimensions(&mut self) {
        let max = self.data.iter().copied().fold(self.data[0], f32::max);
        self.dimensions = Vec3::new(
            self.scale.x * (self.size_x - 1) as f32,
            self.scale.y * max,
            self.scale.z * (self.size_z - 1) as f32,
        );
    }

    /// Re-anchor the grid. Samples are left for the caller to refill.
    pub fn move_to(&mut self, position: Vec3, horizontal_scale: f32, index_x: i32, index_z: i32) {
        self.position = position;
        self.scale.x = horizontal_scale;
        self.scale.z = horizontal_scale;
        self.index_x = index_x;
        self.index_z = index_z;
        self.dirty = true;
    }

    /// Copy `source` if it changed since its last sync, then mark it clean.
    pub fn sync(&mut self, source: &mut PlaneSudokuCollider) {
        if !source.dirty {
            return;
        }
        self.position = source.position;
        self.scale = source.scale;
        self.index_x = source.index_x;
        self.index_z = source.index_z;
        self.size_x = source.size_x;
        self.size_z = source.size_z;
        self.data.clone_from(&source.data);
        self.recompute_dimensions();
        source.dirty = false;
    }

    /// Cell indices and in-cell fractions for a local point.
    ///
    /// Fractions come from the unclamped cell so points just outside the
    /// grid extrapolate the border cell.
    fn locate(&self, local: Vec3) -> (usize, usize, f32, f32) {
        let gx = local.x / self.scale.x;
        let gz = local.z / self.scale.z;
        let ix = gx as i32;
        let iz = gz as i32;
        let fx = gx - ix as f32;
        let fz = gz - iz as f32;
        let cx = ix.clamp(0, self.size_x as i32 - 2) as usize;
        let cz = iz.clamp(0, self.size_z as i32 - 2) as usize;
        (cx, cz, fx, fz)
    }

    /// Surface height relative to the grid anchor
    fn local_height(&self, local: Vec3) -> f32 {
        let (i, j, fx, fz) = self.locate(local);
        let v = self.scale.y;
        let h00 = self.height(i, j) * v;
        let h11 = self.height(i + 1, j + 1) * v;
        if fx < fz {
            let h01 = self.height(i, j + 1) * v;
            h00 + (h11 - h01) * fx + (h01 - h00) * fz
        } else {
            let h10 = self.height(i + 1, j) * v;
            h00 + (h10 - h00) * fx + (h11 - h10) * fz
        }
    }

    /// World height of the surface below `point`
    pub fn height_at_point(&self, point: Vec3) -> f32 {
        self.position.y + self.local_height(point - self.position)
    }

    /// Upward normal of the triangle below `point`
    pub fn normal_at_point(&self, point: Vec3) -> Vec3 {
        let (i, j, fx, fz) = self.locate(point - self.position);
        let v = self.scale.y;
        let h00 = self.height(i, j) * v;
        let h11 = self.height(i + 1, j + 1) * v;
        let (dx, dz) = if fx < fz {
            let h01 = self.height(i, j + 1) * v;
            (h11 - h01, h01 - h00)
        } else {
            let h10 = self.height(i + 1, j) * v;
            (h10 - h00, h11 - h10)
        };
        Vec3::new(-dx / self.scale.x, 1.0, -dz / self.scale.z).normalize()
    }

    /// True when all four corners lie on the same side of zero
    pub fn is_normal(&self) -> bool {
        let s = |h: f32| if h > 0.0 { 1 } else if h < 0.0 { -1 } else { 0 };
        let p0 = s(self.height(0, 0));
        p0 == s(self.height(0, self.size_z - 1))
            && p0 == s(self.height(self.size_x - 1, 0))
            && p0 == s(self.height(self.size_x - 1, self.size_z - 1))
    }
}

impl Collider for PlaneSudokuCollider {
    fn test_point(&self, point: Vec3, _prior: Vec3) -> Option<Contact> {
        let local = point - self.position;
        let inside = local.x >= 0.0
            && local.x < self.dimensions.x
            && local.z >= 0.0
            && local.z < self.dimensions.z
            && local.y <= self.dimensions.y;
        if !inside {
            return None;
        }
        let depth = self.local_height(local) - local.y;
        if depth > 0.0 {
            Some(Contact { push: Vec3::Y * depth, normal: Vec3::Y })
        } else {
            None
        }
    }

    fn density(&self) -> DensityType {
        DensityType::None
    }

    fn friction_factor(&self) -> f32 {
        0.0
    }
}
