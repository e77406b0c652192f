// Message types exchanged with the bus

use serde::{Deserialize, Serialize};

// Command from teleop/planner -> runtime, also echoed back after transmission
// Each axis is a fraction of full speed in [-1, 1]; missing axes default to 0
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct VelocityCommand {
    pub vx: f64, // forward
    pub vy: f64, // lateral
    pub vr: f64, // rotation
}

impl VelocityCommand {
    pub fn new(vx: f64, vy: f64, vr: f64) -> Self {
        Self { vx, vy, vr }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Raw accelerometer (`linear`) and gyroscope (`angular`) sample, controller units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ImuTelemetry {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Attitude sample, controller units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct AttitudeTelemetry {
    pub angx: f64,
    pub angy: f64,
    pub heading: f64,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CommandRejected,
}
