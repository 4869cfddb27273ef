//! Trapezoidal timing calculator
//!
//! Computes a symmetric accelerate/cruise/decelerate profile for a move of a
//! given step count. Moves too short to reach the commanded speed degenerate
//! to a triangular profile.

use libm::{round, sqrt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Microseconds per second, as a double for the profile math
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Timing estimate for one planned move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingEstimate {
    /// Total steps in the move
    pub total_steps: u32,
    /// Steps spent in each acceleration ramp
    pub accel_steps: u32,
    /// Steps spent cruising at the commanded speed (0 for triangular moves)
    pub cruise_steps: u32,
    /// Estimated total move duration in microseconds
    pub total_duration_us: u32,
}

/// Compute the trapezoidal profile for `steps` at `speed_hz` / `acceleration`
///
/// Returns an all-zero estimate (except `total_steps`) when the move cannot
/// be profiled: zero steps, or a non-positive speed or acceleration.
///
/// The profile is symmetric: ramp up at `acceleration` to `speed_hz`, cruise,
/// ramp down at the same rate. When `steps` is smaller than both ramps the
/// move peaks below the commanded speed and has no cruise section.
pub fn compute_timing(steps: u32, speed_hz: i32, acceleration: i32) -> TimingEstimate {
    let mut timing = TimingEstimate {
        total_steps: steps,
        ..TimingEstimate::default()
    };

    if steps == 0 || speed_hz <= 0 || acceleration <= 0 {
        return timing;
    }

    let v = f64::from(speed_hz);
    let a = f64::from(acceleration);

    // Steps consumed by one full ramp from standstill to v
    let ramp_steps = 0.5 * (v * v) / a;

    let total_seconds = if f64::from(steps) >= 2.0 * ramp_steps {
        let cruise_steps = f64::from(steps) - 2.0 * ramp_steps;
        let t_accel = v / a;
        let t_cruise = cruise_steps / v;

        timing.accel_steps = round(ramp_steps) as u32;
        timing.cruise_steps = round(cruise_steps) as u32;
        (2.0 * t_accel) + t_cruise
    } else {
        // Triangular: never reaches the commanded speed
        let peak_velocity = sqrt(f64::from(steps) * a);
        let t_accel = peak_velocity / a;

        timing.accel_steps = steps / 2;
        timing.cruise_steps = 0;
        2.0 * t_accel
    };

    timing.total_duration_us = round(total_seconds * MICROS_PER_SECOND) as u32;
    timing
}

/// Half of the step period for `speed_hz`, in microseconds
///
/// The half period is the STEP-high and STEP-low dwell time the generator
/// uses. Never returns 0; non-positive speeds are treated as 1 Hz.
pub fn step_half_period_us(speed_hz: i32) -> u32 {
    let speed = f64::from(speed_hz.max(1));
    let period_us = round((MICROS_PER_SECOND / speed).max(1.0)) as u32;
    (period_us / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_trapezoid() {
        // 2400 steps at 4000 Hz / 16000 steps/s^2: 500-step ramps,
        // 1400-step cruise, 850 ms total.
        let timing = compute_timing(2400, 4000, 16_000);

        assert_eq!(timing.total_steps, 2400);
        assert!(timing.accel_steps.abs_diff(500) <= 5);
        assert!(timing.cruise_steps > 0);
        assert!(timing.total_duration_us.abs_diff(850_000) <= 2);
    }

    #[test]
    fn test_triangular_profile_has_no_cruise() {
        // 100 steps cannot reach 4000 Hz within the 500-step ramp
        let timing = compute_timing(100, 4000, 16_000);

        assert_eq!(timing.total_steps, 100);
        assert_eq!(timing.accel_steps, 50);
        assert_eq!(timing.cruise_steps, 0);
        assert!(timing.total_duration_us > 0);
        // 2 * sqrt(steps / a) seconds = 158113.8 us
        assert!(timing.total_duration_us.abs_diff(158_114) <= 2);
    }

    #[test]
    fn test_degenerate_inputs_are_zero() {
        assert_eq!(compute_timing(0, 4000, 16_000), TimingEstimate::default());

        let no_speed = compute_timing(100, 0, 16_000);
        assert_eq!(no_speed.total_steps, 100);
        assert_eq!(no_speed.total_duration_us, 0);

        let no_accel = compute_timing(100, 4000, -5);
        assert_eq!(no_accel.total_steps, 100);
        assert_eq!(no_accel.total_duration_us, 0);
    }

    #[test]
    fn test_timing_is_deterministic() {
        let a = compute_timing(1234, 3000, 9000);
        let b = compute_timing(1234, 3000, 9000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_half_period() {
        // 4000 Hz -> 250 us period -> 125 us half period
        assert_eq!(step_half_period_us(4000), 125);
        // 1 Hz -> 1 s period -> 500 ms half period
        assert_eq!(step_half_period_us(1), 500_000);
        // Degenerate speeds clamp to 1 Hz
        assert_eq!(step_half_period_us(0), 500_000);
        assert_eq!(step_half_period_us(-20), 500_000);
        // Very fast rates never collapse to zero
        assert_eq!(step_half_period_us(2_000_000), 1);
    }
}
