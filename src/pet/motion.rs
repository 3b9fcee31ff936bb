use glam::Vec2;

use crate::config::MotionConfig;
use crate::pet::Facing;

/// Horizontal delta below which facing is left alone while walking.
pub const WALK_FACING_DEADZONE: f32 = 0.5;
/// Same, while being dragged around.
pub const DRAG_FACING_DEADZONE: f32 = 0.4;

/// Outcome of one motion tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stride {
    pub position: Vec2,
    pub arrived: bool,
}

/// Advance one tick toward `target` with an accelerating straight-line step.
///
/// `speed` ramps by `accel_per_tick`, never below `start_speed` nor above
/// `max_speed`. If the pet is within `arrive_within`, or the step would reach
/// or pass the target, it lands exactly on `target` and `speed` drops back
/// to zero.
pub fn step_toward(
    position: Vec2,
    target: Vec2,
    arrive_within: f32,
    speed: &mut f32,
    tuning: &MotionConfig,
) -> Stride {
    let delta = target - position;
    let distance = delta.length();

    *speed = (*speed + tuning.accel_per_tick)
        .max(tuning.start_speed)
        .min(tuning.max_speed);
    let step = distance.min(*speed);

    if distance <= arrive_within || step >= distance {
        *speed = 0.0;
        return Stride {
            position: target,
            arrived: true,
        };
    }

    Stride {
        position: position + delta / distance * step,
        arrived: false,
    }
}

/// New facing for a horizontal move of `dx`; unchanged inside the dead zone.
pub fn facing_for(dx: f32, current: Facing, deadzone: f32) -> Facing {
    if dx.abs() <= deadzone {
        current
    } else if dx > 0.0 {
        Facing::Right
    } else {
        Facing::Left
    }
}

/// Facing toward a point, ties to the right.
pub fn facing_toward(from: Vec2, to: Vec2) -> Facing {
    if to.x >= from.x {
        Facing::Right
    } else {
        Facing::Left
    }
}

/// Head tilt toward a pointer, in degrees.
pub fn look_angle(pet_x: f32, pointer_x: f32) -> f32 {
    ((pointer_x - pet_x) / 9.0).clamp(-14.0, 14.0)
}
