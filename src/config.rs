// Timing, topics, serial link and drive limits
use std::time::Duration;

use crate::motor::mixer::{DEFAULT_LAYOUT, WheelLayout};

// Scheduler period (serial in, command out, telemetry queries)
pub const LOOP_PERIOD: Duration = Duration::from_millis(50);

// Startup / shutdown holds
pub const SETTLE_DELAY: Duration = Duration::from_secs(2); // after opening the port
pub const NEUTRAL_DELAY: Duration = Duration::from_secs(1); // around the neutral command

// Zenoh topics (relative to the topic prefix)
pub const TOPIC_VELOCITY_SET: &str = "velocity/set"; // commands
pub const TOPIC_VELOCITY_GET: &str = "velocity/get"; // echoed commands
pub const TOPIC_IMU_ACC: &str = "imu/acc"; // raw accel + gyro
pub const TOPIC_IMU_ATT: &str = "imu/att"; // attitude
pub const TOPIC_HEALTH: &str = "state/health"; // health status

pub const DEFAULT_TOPIC_PREFIX: &str = "base";

// Serial link to the motor controller
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 115_200;

/// Actuator value for zero commanded speed
pub const NEUTRAL: u16 = 1500;

/// Full-scale deflection from neutral for a single-axis command
pub const MAX_VELOCITY: f64 = 50.0;

/// A single wheel can top out at this many times `MAX_VELOCITY`.
/// This lets the base reach the same translation speed in every direction
/// while rotating.
pub const COMB_LIMIT: f64 = 2.0;

/// Scaling from normalized wheel speed to actuator values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimits {
    pub neutral: u16,
    pub max_velocity: f64,
    pub comb_limit: f64,
}

impl VelocityLimits {
    /// Lowest value the encoder may emit
    pub fn min_command(&self) -> f64 {
        self.neutral as f64 - self.max_velocity * self.comb_limit
    }

    /// Highest value the encoder may emit
    pub fn max_command(&self) -> f64 {
        self.neutral as f64 + self.max_velocity * self.comb_limit
    }
}

impl Default for VelocityLimits {
    fn default() -> Self {
        Self {
            neutral: NEUTRAL,
            max_velocity: MAX_VELOCITY,
            comb_limit: COMB_LIMIT,
        }
    }
}

/// Everything the runtime needs, built once at startup
#[derive(Debug, Clone)]
pub struct BaseConfig {
    pub port: String,
    pub baud: u32,
    pub topic_prefix: String,
    pub layout: WheelLayout,
    pub limits: VelocityLimits,
    pub loop_period: Duration,
    pub settle_delay: Duration,
    pub neutral_delay: Duration,
}

impl BaseConfig {
    /// Full key expression for a topic under the configured prefix
    pub fn topic(&self, name: &str) -> String {
        if self.topic_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.topic_prefix.trim_end_matches('/'), name)
        }
    }
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUD,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            layout: DEFAULT_LAYOUT,
            limits: VelocityLimits::default(),
            loop_period: LOOP_PERIOD,
            settle_delay: SETTLE_DELAY,
            neutral_delay: NEUTRAL_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_envelope() {
        let limits = VelocityLimits::default();
        assert_eq!(limits.min_command(), 1400.0);
        assert_eq!(limits.max_command(), 1600.0);
    }

    #[test]
    fn test_topic_prefix() {
        let mut config = BaseConfig::default();
        assert_eq!(config.topic(TOPIC_VELOCITY_SET), "base/velocity/set");

        config.topic_prefix = "rover/".to_string();
        assert_eq!(config.topic(TOPIC_IMU_ATT), "rover/imu/att");

        config.topic_prefix.clear();
        assert_eq!(config.topic(TOPIC_HEALTH), "state/health");
    }
}
