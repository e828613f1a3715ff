//! Line, plane and triangle queries used for trajectory shaping.

use glam::{Vec2, Vec3};

use super::approximately;

/// Where a point projected onto a segment's line falls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSide {
    Inside,
    BeforeStart,
    AfterEnd,
}

/// Result of [`segment_sphere_intersection`], as segment parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SphereHits {
    None,
    One(f32),
    Two(f32, f32),
}

/// Line shared by two planes, as `(point, direction)`
pub fn plane_plane_intersection(n1: Vec3, p1: Vec3, n2: Vec3, p2: Vec3) -> Option<(Vec3, Vec3)> {
    let dir = n1.cross(n2);
    let towards = n2.cross(dir);
    let denom = n1.dot(towards);
    if denom.abs() <= 0.006 {
        return None;
    }
    let t = n1.dot(p1 - p2) / denom;
    Some((p2 + towards * t, dir))
}

pub fn line_plane_intersection(line_point: Vec3, line_vec: Vec3, plane_normal: Vec3, plane_point: Vec3) -> Option<Vec3> {
    let denom = line_vec.dot(plane_normal);
    if denom == 0.0 {
        return None;
    }
    let t = (plane_point - line_point).dot(plane_normal) / denom;
    Some(line_point + line_vec * t)
}

/// Crossing of segment `a..b` with a plane.
///
/// Misses past `b` report `None`; the crossing is taken along the segment
/// direction so points before `a` are still returned.
pub fn segment_plane_intersection(a: Vec3, b: Vec3, plane_normal: Vec3, plane_point: Vec3) -> Option<Vec3> {
    let len = (b - a).length();
    if len == 0.0 {
        return None;
    }
    let dir = (b - a) / len;
    let denom = dir.dot(plane_normal);
    if denom == 0.0 {
        return None;
    }
    let t = (plane_point - a).dot(plane_normal) / denom;
    if t > len {
        return None;
    }
    Some(a + dir * t)
}

pub fn segment_sphere_intersection(a: Vec3, b: Vec3, center: Vec3, radius: f32) -> SphereHits {
    let m = a - center;
    let d = b - a;
    let qa = d.length_squared();
    let qb = 2.0 * d.dot(m);
    let qc = m.length_squared() - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 || qa == 0.0 {
        return SphereHits::None;
    }
    if approximately(disc, 0.0) {
        return SphereHits::One(-0.5 * qb / qa);
    }
    let root = disc.sqrt();
    SphereHits::Two(0.5 * (-qb - root) / qa, 0.5 * (-qb + root) / qa)
}

/// Closest pair of points between two infinite lines. `None` when parallel.
pub fn closest_points_on_lines(p1: Vec3, v1: Vec3, p2: Vec3, v2: Vec3) -> Option<(Vec3, Vec3)> {
    let a = v1.dot(v1);
    let b = v1.dot(v2);
    let e = v2.dot(v2);
    let d = a * e - b * b;
    if d == 0.0 {
        return None;
    }
    let r = p1 - p2;
    let c = v1.dot(r);
    let f = v2.dot(r);
    let s = (b * f - c * e) / d;
    let t = (a * f - c * b) / d;
    Some((p1 + v1 * s, p2 + v2 * t))
}

/// Projection onto a line through `line_point` with unit direction `line_dir`
pub fn project_point_on_line(line_point: Vec3, line_dir: Vec3, point: Vec3) -> Vec3 {
    line_point + line_dir * (point - line_point).dot(line_dir)
}

pub fn point_side_of_segment(a: Vec3, b: Vec3, point: Vec3) -> SegmentSide {
    let seg = b - a;
    let rel = point - a;
    if rel.dot(seg) > 0.0 {
        if rel.length() <= seg.length() {
            SegmentSide::Inside
        } else {
            SegmentSide::AfterEnd
        }
    } else {
        SegmentSide::BeforeStart
    }
}

pub fn project_point_on_segment(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    let projected = project_point_on_line(a, (b - a).normalize_or_zero(), point);
    match point_side_of_segment(a, b, projected) {
        SegmentSide::Inside => projected,
        SegmentSide::BeforeStart => a,
        SegmentSide::AfterEnd => b,
    }
}

pub fn signed_distance_plane_point(plane_normal: Vec3, plane_point: Vec3, point: Vec3) -> f32 {
    plane_normal.dot(point - plane_point)
}

pub fn project_point_on_plane(plane_normal: Vec3, plane_point: Vec3, point: Vec3) -> Vec3 {
    let dist = signed_distance_plane_point(plane_normal, plane_point, point);
    point - plane_normal.normalize_or_zero() * dist
}

pub fn project_vector_on_plane(plane_normal: Vec3, v: Vec3) -> Vec3 {
    v - plane_normal * v.dot(plane_normal)
}

/// Angle from `v1` to `v2` in radians, signed by rotation sense around `n`
pub fn signed_angle(v1: Vec3, v2: Vec3, n: Vec3) -> f32 {
    n.dot(v1.cross(v2)).atan2(v1.dot(v2))
}

pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let len = (b - a).length();
    if len == 0.0 {
        return a;
    }
    let dir = (b - a) / len;
    a + dir * (p - a).dot(dir).clamp(0.0, len)
}

pub fn point_to_segment_distance(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    (closest_point_on_segment(p, a, b) - p).length()
}

fn cross_xz(a: Vec3, b: Vec3) -> f32 {
    a.x * b.z - a.z * b.x
}

/// Strict containment of `p` in triangle `abc`, projected onto the XZ plane
pub fn point_in_triangle_xz(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let ca = a - c;
    let cb = b - c;
    let denom = cross_xz(ca, cb);
    if denom == 0.0 {
        return false;
    }
    let u = (cross_xz(p, cb) - cross_xz(c, cb)) / denom;
    let v = -(cross_xz(p, ca) - cross_xz(c, ca)) / denom;
    u > 0.0 && v > 0.0 && u + v < 1.0
}

pub fn rotate_2d(x: f32, y: f32, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(x * cos - y * sin, x * sin + y * cos)
}

/// Rotate `p` around the world Y axis through the origin
pub fn rotate_around_y(p: Vec3, angle: f32) -> Vec3 {
    let r = rotate_2d(p.x, p.z, angle);
    Vec3::new(r.x, p.y, r.y)
}

/// Wrap an angle in degrees into `[-180, 180]`
pub fn clamp_angle_to_180(angle: f32) -> f32 {
    if angle.abs() <= 180.0 {
        angle
    } else if angle > 0.0 {
        angle - 360.0
    } else {
        angle + 360.0
    }
}

/// Reduce an angle in degrees below one turn and clamp it to `[min, max]`
pub fn clamp_angle(angle: f32, min: f32, max: f32) -> f32 {
    let wrapped = if angle.abs() <= 360.0 { angle } else { angle % 360.0 };
    wrapped.clamp(min, max)
}
