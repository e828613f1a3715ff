use glam::{Vec2, Vec3};

use super::normalize_or_zero;

/// Parabola in the vertical plane through a start and an end point, with
/// its midpoint lifted to a given height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalParabola {
    a: f32,
    b: f32,
    x_end: f32,
    x_axis: Vec3,
    pivot: Vec3,
    pub start: Vec3,
    pub end: Vec3,
    pub mid_y: f32,
}

impl VerticalParabola {
    pub fn new(start: Vec3, end: Vec3, mid_y: f32) -> Self {
        let mut x_axis = normalize_or_zero(end - start);
        x_axis -= Vec3::Y * x_axis.dot(Vec3::Y);
        let x_axis = normalize_or_zero(x_axis);

        let mut parabola = Self { a: 0.0, b: 0.0, x_end: 0.0, x_axis, pivot: start, start, end, mid_y };

        let mut mid = (start + end) * 0.5;
        mid += Vec3::Y * (mid_y - mid.y);
        let m = parabola.space_to_plane(mid);
        let e = parabola.space_to_plane(end);
        parabola.x_end = e.x;
        if m.x == 0.0 {
            // Purely vertical launch, nothing to fit
            return parabola;
        }

        let k = -(e.x - m.x) / m.x;
        let denom = k * m.x * m.x + (e.x * e.x - m.x * m.x);
        let numer = k * m.y + (e.y - m.y);
        parabola.a = if denom != 0.0 { numer / denom } else { 0.0 };
        parabola.b = (m.y - m.x * m.x * parabola.a) / m.x;
        parabola
    }

    /// Copy another parabola's shape
    pub fn sync(&mut self, source: &VerticalParabola) {
        *self = *source;
    }

    /// Point at fraction `t` of the horizontal run
    pub fn point(&self, t: f32) -> Vec3 {
        let x = t * self.x_end;
        let y = self.a * x * x + self.b * x;
        self.plane_to_space(Vec2::new(x, y))
    }

    /// Slope dy/dx at fraction `t`
    pub fn derivative(&self, t: f32) -> f32 {
        let x = t * self.x_end;
        2.0 * self.a * x + self.b
    }

    fn space_to_plane(&self, point: Vec3) -> Vec2 {
        let rel = point - self.pivot;
        Vec2::new(self.x_axis.dot(rel), rel.y)
    }

    fn plane_to_space(&self, point: Vec2) -> Vec3 {
        self.pivot + self.x_axis * point.x + Vec3::Y * point.y
    }
}
