// Maps normalized wheel speeds to PWM-style motor commands centered on neutral

use crate::config::VelocityLimits;

use super::mixer::WheelSpeeds;

/// Hard safety envelope for every transmitted motor value
pub const ENVELOPE_MIN: u16 = 1400;
pub const ENVELOPE_MAX: u16 = 1600;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("Motor {motor} abnormal value: {value}")]
    OutOfEnvelope { motor: usize, value: f64 },
}

/// Actuator values for the four base motors, in layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand(pub [u16; 4]);

impl MotorCommand {
    /// All motors at neutral
    pub fn neutral(limits: &VelocityLimits) -> Self {
        Self([limits.neutral; 4])
    }

    pub fn as_array(&self) -> [u16; 4] {
        self.0
    }
}

/// Encode wheel speeds into motor commands
///
/// Each value is `round(neutral + max_velocity * w)`, clamped to
/// `neutral +/- max_velocity * comb_limit`, then checked against the
/// [`ENVELOPE_MIN`, `ENVELOPE_MAX`] envelope. Nothing is returned unless all
/// four values pass.
pub fn encode(wheels: &WheelSpeeds, limits: &VelocityLimits) -> Result<MotorCommand, EncodeError> {
    let mut motors = [limits.neutral; 4];

    for (motor, (&w, out)) in wheels.iter().zip(motors.iter_mut()).enumerate() {
        let cmd = (limits.neutral as f64 + limits.max_velocity * w).round();
        let cmd = cmd.clamp(limits.min_command(), limits.max_command());

        // NaN survives the clamp and lands here
        if !(ENVELOPE_MIN as f64..=ENVELOPE_MAX as f64).contains(&cmd) {
            return Err(EncodeError::OutOfEnvelope { motor, value: cmd });
        }
        *out = cmd as u16;
    }

    Ok(MotorCommand(motors))
}
