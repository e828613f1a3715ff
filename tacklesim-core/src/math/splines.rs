//! Polyline smoothing for drawing chains of masses.

use glam::Vec3;

use super::approximately;

const MAX_TOTAL_LENGTH: f32 = 100.0;
const MAX_SEGMENT_LENGTH: f32 = 0.05;
const MIN_SEGMENT_COUNT: usize = 2;

/// Upper bound on vertices produced by [`catmull_rom`]
pub const MAX_CATMULL_ROM_POINTS: usize = 1000;

/// Cubic Hermite interpolation through `points`, finished with `end`.
///
/// Each segment is split into pieces no longer than 5 cm until the
/// accumulated length passes 100 units, after which segments get two pieces.
pub fn hermite(points: &[Vec3], end: Vec3) -> Vec<Vec3> {
    if points.len() < 2 {
        return points.iter().copied().chain(std::iter::once(end)).collect();
    }

    let mut counts = Vec::with_capacity(points.len() - 1);
    let mut length = 0.0;
    for pair in points.windows(2) {
        let distance = (pair[1] - pair[0]).length();
        length += distance;
        let count = if length < MAX_TOTAL_LENGTH {
            (distance / MAX_SEGMENT_LENGTH) as usize + 1
        } else {
            MIN_SEGMENT_COUNT
        };
        counts.push(count);
    }

    let last = points.len() - 2;
    let mut out = Vec::with_capacity(counts.iter().sum::<usize>() + 1);
    for (i, &count) in counts.iter().enumerate() {
        let p0 = points[i];
        let p1 = points[i + 1];
        let m0 = if i == 0 { p1 - p0 } else { 0.5 * (p1 - points[i - 1]) };
        let m1 = if i >= last { p1 - p0 } else { 0.5 * (points[i + 2] - p0) };
        // The final segment reaches its end point exactly
        let inv = if i == last && count > 1 { 1.0 / (count - 1) as f32 } else { 1.0 / count as f32 };
        for j in 0..count {
            let t = j as f32 * inv;
            let t2 = t * t;
            let t3 = t2 * t;
            out.push(
                (2.0 * t3 - 3.0 * t2 + 1.0) * p0
                    + (t3 - 2.0 * t2 + t) * m0
                    + (-2.0 * t3 + 3.0 * t2) * p1
                    + (t3 - t2) * m1,
            );
        }
    }
    out.push(end);
    out
}

/// Catmull-Rom curve through `points` with knot exponent `alpha`
/// (0.5 is centripetal). The ends are extrapolated linearly.
pub fn catmull_rom(points: &[Vec3], alpha: f32, vertices_per_segment: usize) -> Vec<Vec3> {
    let n = points.len();
    if n < 2 {
        return points.to_vec();
    }
    let extra_left = 2.0 * points[0] - points[1];
    let extra_right = 2.0 * points[n - 1] - points[n - 2];
    catmull_rom_with_ends(extra_left, extra_right, points, alpha, vertices_per_segment)
}

/// [`catmull_rom`] with explicit phantom end points
pub fn catmull_rom_with_ends(
    extra_left: Vec3,
    extra_right: Vec3,
    points: &[Vec3],
    alpha: f32,
    vertices_per_segment: usize,
) -> Vec<Vec3> {
    let mut ctrl = Vec::with_capacity(points.len() + 2);
    ctrl.push(extra_left);
    ctrl.extend_from_slice(points);
    ctrl.push(extra_right);
    let total = ctrl.len();
    if total < 4 {
        return points.to_vec();
    }

    let mut knots = vec![0.0f32; total];
    for j in 0..total - 1 {
        knots[j + 1] = knots[j] + (ctrl[j + 1] - ctrl[j]).length_squared().powf(alpha * 0.5);
    }

    let segments = total - 3;
    let mut per_segment = vertices_per_segment;
    if total - 2 + segments * per_segment >= MAX_CATMULL_ROM_POINTS {
        per_segment = (MAX_CATMULL_ROM_POINTS - (total - 2)) / segments;
    }

    let mut out = Vec::with_capacity(total - 2 + segments * per_segment);
    for k in 0..segments {
        let (p0, p1, p2, p3) = (ctrl[k], ctrl[k + 1], ctrl[k + 2], ctrl[k + 3]);
        let (t0, t1, t2, t3) = (knots[k], knots[k + 1], knots[k + 2], knots[k + 3]);
        out.push(p1);
        let degenerate = approximately(t0, t1) || approximately(t1, t2) || approximately(t2, t3);
        for l in 1..=per_segment {
            if degenerate {
                out.push(p1);
                continue;
            }
            let t = t1 + l as f32 * (t2 - t1) / (per_segment + 1) as f32;
            let a1 = p0 * (t1 - t) / (t1 - t0) + p1 * (t - t0) / (t1 - t0);
            let a2 = p1 * (t2 - t) / (t2 - t1) + p2 * (t - t1) / (t2 - t1);
            let a3 = p2 * (t3 - t) / (t3 - t2) + p3 * (t - t2) / (t3 - t2);
            let b1 = a1 * (t2 - t) / (t2 - t0) + a2 * (t - t0) / (t2 - t0);
            let b2 = a2 * (t3 - t) / (t3 - t1) + a3 * (t - t1) / (t3 - t1);
            out.push(b1 * (t2 - t) / (t2 - t1) + b2 * (t - t1) / (t2 - t1));
        }
    }
    out.push(ctrl[total - 2]);
    out
}
