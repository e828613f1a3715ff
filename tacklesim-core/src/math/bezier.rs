use glam::{Quat, Vec3};
use tracing::error;

use super::{approximately, look_rotation, normalize_or_zero};
use crate::error::{PhysicsError, Result};

/// Bezier curve of arbitrary order with optional arc-length reparametrisation
#[derive(Debug, Clone)]
pub struct BezierSpline {
    order: usize,
    pub points: Vec<Vec3>,
    combination_factors: Vec<f32>,
    derivative_factors: Vec<f32>,
    samples: Vec<f32>,
}

fn binomial_row(n: usize) -> Vec<f32> {
    let mut row = vec![1.0f32; n + 1];
    for i in 1..n {
        row[i] = row[i - 1] * (n + 1 - i) as f32 / i as f32;
    }
    row
}

impl BezierSpline {
    pub fn new(order: usize) -> Result<Self> {
        if order < 2 {
            return Err(PhysicsError::InvalidBezierOrder(order));
        }
        Ok(Self {
            order,
            points: vec![Vec3::ZERO; order + 1],
            combination_factors: binomial_row(order),
            derivative_factors: binomial_row(order - 1),
            samples: Vec::new(),
        })
    }

    /// Quadratic curve through three control points
    pub fn quadratic(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self {
            order: 2,
            points: vec![p0, p1, p2],
            combination_factors: binomial_row(2),
            derivative_factors: binomial_row(1),
            samples: Vec::new(),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn point_count(&self) -> usize {
        self.order + 1
    }

    pub fn combination_factors(&self) -> &[f32] {
        &self.combination_factors
    }

    fn powers(&self, t: f32) -> (Vec<f32>, Vec<f32>) {
        let s = 1.0 - t;
        let mut up = Vec::with_capacity(self.order + 1);
        let mut down = Vec::with_capacity(self.order + 1);
        let (mut a, mut b) = (1.0f32, 1.0f32);
        up.push(a);
        down.push(b);
        for _ in 0..self.order {
            a *= t;
            b *= s;
            up.push(a);
            down.push(b);
        }
        (up, down)
    }

    pub fn point(&self, t: f32) -> Vec3 {
        let (up, down) = self.powers(t);
        let n = self.order;
        (0..=n).fold(Vec3::ZERO, |acc, i| acc + self.points[i] * (self.combination_factors[i] * up[i] * down[n - i]))
    }

    /// Derivative without the leading `order` factor
    pub fn point_derivative(&self, t: f32) -> Vec3 {
        let (up, down) = self.powers(t);
        let n = self.order;
        (0..n).fold(Vec3::ZERO, |acc, i| {
            acc + (self.points[i + 1] - self.points[i]) * (self.derivative_factors[i] * up[i] * down[n - 1 - i])
        })
    }

    pub fn derivative(&self, t: f32) -> Vec3 {
        self.point_derivative(t) * self.order as f32
    }

    /// Orientation looking along the tangent at `t`
    pub fn rotation(&self, t: f32) -> Quat {
        let forward = normalize_or_zero(self.derivative(t));
        let up = normalize_or_zero(forward.cross(Vec3::X));
        if approximately(up.length(), 0.0) {
            return Quat::IDENTITY;
        }
        look_rotation(forward, up)
    }

    /// Arc length by summing `iterations` tangent samples; also returns the
    /// cumulative length at each sample boundary.
    pub fn sample_length(&self, iterations: usize) -> (f32, Vec<f32>) {
        let iterations = iterations.max(1);
        let step = 1.0 / iterations as f32;
        let mut cumulative = Vec::with_capacity(iterations + 1);
        cumulative.push(0.0);
        let mut length = 0.0;
        for i in 0..iterations {
            length += self.derivative(step * i as f32).length() * step;
            cumulative.push(length);
        }
        (length, cumulative)
    }

    /// Build a `size + 1` entry table mapping arc-length fraction to curve parameter.
    pub fn build(&mut self, size: usize, iterations: usize) {
        let iterations = iterations.max(1);
        let (length, cumulative) = self.sample_length(iterations);
        self.samples = vec![0.0; size + 1];
        if length <= 0.0 {
            return;
        }
        let mut count = 1;
        for i in 0..size {
            let fraction = i as f32 / size as f32;
            while fraction > cumulative[count] / length {
                count += 1;
                if count >= cumulative.len() {
                    error!(fraction, "arc length table cannot reach fraction");
                    return;
                }
            }
            let t0 = (count - 1) as f32 / iterations as f32;
            let t1 = count as f32 / iterations as f32;
            let f0 = cumulative[count - 1] / length;
            let f1 = cumulative[count] / length;
            let k = if f1 > f0 { (fraction - f0) / (f1 - f0) } else { 0.0 };
            self.samples[i] = t0 + (t1 - t0) * k;
        }
        self.samples[size] = 1.0;
    }

    /// Curve parameter at arc-length fraction `pos`, after [`build`](Self::build)
    pub fn reparametrize(&self, pos: f32) -> f32 {
        match self.samples.len() {
            0 => return 0.0,
            1 => return self.samples[0],
            _ => {}
        }
        if pos <= 0.0 {
            return self.samples[0];
        }
        if pos >= 1.0 {
            return self.samples[self.samples.len() - 1];
        }
        let scaled = pos * (self.samples.len() - 1) as f32;
        let index = scaled as usize;
        let frac = scaled - index as f32;
        self.samples[index] + (self.samples[index + 1] - self.samples[index]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_order_below_two_is_rejected() {
        assert!(matches!(BezierSpline::new(1), Err(PhysicsError::InvalidBezierOrder(1))));
    }

    #[test]
    fn test_combination_factors_are_binomial() {
        let spline = BezierSpline::new(4).unwrap();
        assert_eq!(spline.combination_factors(), &[1.0, 4.0, 6.0, 4.0, 1.0]);
    }

    #[test]
    fn test_quadratic_point_and_derivative() {
        let spline = BezierSpline::quadratic(Vec3::ZERO, Vec3::new(1.0, 2.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(spline.point(0.5), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(spline.derivative(0.0), Vec3::new(2.0, 4.0, 0.0));
        assert_eq!(spline.point(1.0), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_straight_cubic_reparametrizes_to_identity() {
        let mut spline = BezierSpline::new(3).unwrap();
        spline.points = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0];
        let (length, _) = spline.sample_length(100);
        assert_relative_eq!(length, 3.0, epsilon = 1e-4);
        spline.build(10, 100);
        assert_relative_eq!(spline.reparametrize(0.5), 0.5, epsilon = 1e-3);
        assert_eq!(spline.reparametrize(2.0), 1.0);
    }
}
