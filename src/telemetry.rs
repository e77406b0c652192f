// Controller responses -> bus telemetry records
// Fields are copied as-is; values stay in the controller's native units.

use crate::messages::{AttitudeTelemetry, ImuTelemetry, Vector3};
use crate::motor::msp::{Attitude, RawImu, Response};

/// One decoded telemetry sample, ready to publish
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Telemetry {
    Imu(ImuTelemetry),
    Attitude(AttitudeTelemetry),
}

impl From<&RawImu> for ImuTelemetry {
    fn from(imu: &RawImu) -> Self {
        Self {
            linear: Vector3::new(imu.acc[0].into(), imu.acc[1].into(), imu.acc[2].into()),
            angular: Vector3::new(imu.gyro[0].into(), imu.gyro[1].into(), imu.gyro[2].into()),
        }
    }
}

impl From<&Attitude> for AttitudeTelemetry {
    fn from(att: &Attitude) -> Self {
        Self {
            angx: att.angx.into(),
            angy: att.angy.into(),
            heading: att.heading.into(),
        }
    }
}

/// Map a controller response to telemetry. Acknowledgements carry none.
pub fn decode(response: &Response) -> Option<Telemetry> {
    match response {
        Response::RawImu(imu) => Some(Telemetry::Imu(imu.into())),
        Response::Attitude(att) => Some(Telemetry::Attitude(att.into())),
        Response::MotorAck => None,
    }
}
