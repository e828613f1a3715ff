use glam::Vec3;

use crate::config::TIME_QUANT;
use crate::mass::{MassArena, MassKey};
use crate::math::{lerp_vec3, VerticalParabola};
use crate::simulation::StepContext;

const COMPENSATION_FACTOR: f32 = 0.8;
const COMPENSATION_MAX: f32 = 0.5;

/// Launches kinematic mass1 along a vertical parabola.
///
/// Mass2 drags the flight sideways a little, and the end of the flight
/// blends into `end_position`.
#[derive(Debug, Clone)]
pub struct KinematicVerticalParabola {
    pub parabola: VerticalParabola,
    pub end_position: Vec3,
    last_position: Vec3,
    duration: f32,
    start_time: Option<f32>,
    time_power: f32,
}

impl KinematicVerticalParabola {
    pub fn new(parabola: VerticalParabola, duration: f32, time_power: f32) -> Self {
        let end = parabola.end;
        Self { parabola, end_position: end, last_position: end, duration, start_time: None, time_power }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Retarget the landing point; the old one is kept for blending.
    pub fn set_end_position(&mut self, position: Vec3) {
        self.last_position = self.end_position;
        self.end_position = position;
    }

    /// Flight progress at `internal_time`, shaped by the time power
    pub fn progress(&self, internal_time: f32) -> f32 {
        let start = self.start_time.unwrap_or(internal_time);
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((internal_time - start) / self.duration).max(0.0).powf(self.time_power)
    }

    pub(crate) fn solve(&mut self, arena: &mut MassArena, mass1: MassKey, mass2: MassKey, ctx: &StepContext) {
        if !arena[mass1].is_kinematic {
            return;
        }
        let start = *self.start_time.get_or_insert(ctx.internal_time);
        if ctx.internal_time > start + self.duration {
            return;
        }
        let progress = self.progress(ctx.internal_time);

        let position = arena[mass1].position();
        let mut compensation = arena[mass2].position() - position;
        compensation.y = 0.0;
        compensation *= COMPENSATION_FACTOR * progress.powf(0.2);
        compensation = compensation.clamp_length_max(COMPENSATION_MAX);

        let point = self.parabola.point(progress);
        let landing = lerp_vec3(self.last_position, self.end_position, ctx.progress);
        let target = lerp_vec3(point + compensation, landing, progress.powi(4));

        let m = &mut arena[mass1];
        if progress < 0.5 || position.y >= m.ground_height() {
            m.set_position(target);
            let mut velocity = (target - position) / TIME_QUANT;
            let limit = m.velocity_limit;
            if limit > 0.0 {
                velocity = velocity.clamp_length_max(limit);
            }
            m.velocity = velocity;
        }
    }
}
