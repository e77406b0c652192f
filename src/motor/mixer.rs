// Velocity mixer for the 4-wheel omnidirectional base
// Converts a planar velocity command (forward, lateral, rotation) to normalized wheel speeds.

use crate::config::COMB_LIMIT;

/// One row per wheel: [forward, lateral, rotation] contribution
pub type WheelLayout = [[f64; 3]; 4];

/// Motor layout (up is forward):
///
/// ```text
/// 4 2
/// 3 1
/// ```
///
/// Adjacent wheels are mirrored on each axis, so pure rotation drives all
/// four wheels at the same magnitude.
pub const DEFAULT_LAYOUT: WheelLayout = [
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
];

/// Normalized wheel speeds. Peak magnitude is at most the combination limit.
pub type WheelSpeeds = [f64; 4];

/// Mix a planar velocity with the default layout and combination limit
///
/// # Arguments
/// * `vx` - Forward, fraction of full speed (clamped to [-1, 1])
/// * `vy` - Lateral, fraction of full speed (clamped to [-1, 1])
/// * `vr` - Rotation, fraction of full speed (clamped to [-1, 1])
pub fn mix(vx: f64, vy: f64, vr: f64) -> WheelSpeeds {
    mix_with_params(vx, vy, vr, &DEFAULT_LAYOUT, COMB_LIMIT)
}

/// Mix a planar velocity with a custom layout and combination limit
pub fn mix_with_params(
    vx: f64,
    vy: f64,
    vr: f64,
    layout: &WheelLayout,
    comb_limit: f64,
) -> WheelSpeeds {
    let velocity = [vx.clamp(-1.0, 1.0), vy.clamp(-1.0, 1.0), vr.clamp(-1.0, 1.0)];

    let mut wheels = [0.0f64; 4];
    for (speed, row) in wheels.iter_mut().zip(layout) {
        *speed = row[0] * velocity[0] + row[1] * velocity[1] + row[2] * velocity[2];
    }

    // Throttle uniformly so the fastest wheel stays within the combination limit
    let amplitude = wheels.iter().fold(0.0f64, |acc, w| acc.max(w.abs())) / comb_limit;
    if amplitude > 1.0 {
        for speed in &mut wheels {
            *speed /= amplitude;
        }
    }

    wheels
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: WheelSpeeds, expected: WheelSpeeds) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < EPS, "got {:?}, expected {:?}", actual, expected);
        }
    }

    #[test]
    fn test_zero_velocity() {
        assert_eq!(mix(0.0, 0.0, 0.0), [0.0; 4]);
    }

    #[test]
    fn test_forward_motion() {
        assert_close(mix(1.0, 0.0, 0.0), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_strafe_motion() {
        assert_close(mix(0.0, 0.5, 0.0), [-0.5, 0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_rotation_only() {
        for r in [-1.0, -0.3, 0.25, 1.0] {
            let wheels = mix(0.0, 0.0, r);
            for w in wheels {
                assert!((w.abs() - f64::abs(r)).abs() < EPS, "wheels {:?} for r={}", wheels, r);
            }
            // Front-right pair against rear-left pair
            assert!(wheels[0] * wheels[2] < 0.0);
            assert!(wheels[1] * wheels[3] < 0.0);
        }
    }

    #[test]
    fn test_inputs_are_clamped() {
        assert_close(mix(5.0, 0.0, 0.0), mix(1.0, 0.0, 0.0));
        assert_close(mix(0.0, -3.0, 0.0), mix(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_linear_below_saturation() {
        let base = mix(0.6, -0.4, 0.3);
        for k in [0.1, 0.5, 0.9, 1.0] {
            let scaled = mix(0.6 * k, -0.4 * k, 0.3 * k);
            assert_close(scaled, base.map(|w| w * k));
        }
    }

    #[test]
    fn test_translation_plus_rotation_at_limit() {
        // Peak is exactly the combination limit, so nothing is rescaled
        assert_close(mix(1.0, 0.0, 1.0), [0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_saturation_preserves_ratios() {
        // Raw speeds [-1, 1, 3, 1], peak 3 > 2 -> divided by 1.5
        let wheels = mix(1.0, 1.0, 1.0);
        assert_close(wheels, [-2.0 / 3.0, 2.0 / 3.0, 2.0, 2.0 / 3.0]);
        assert!((wheels[2] / wheels[1] - 3.0).abs() < EPS);
    }

    #[test]
    fn test_custom_comb_limit() {
        let wheels = mix_with_params(1.0, 0.0, 0.0, &DEFAULT_LAYOUT, 0.5);
        assert_close(wheels, [0.5; 4]);
    }
}
