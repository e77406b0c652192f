// High-level driver for the omnidirectional base
//
// Combines the mixer, encoder and MSP codec over a byte transport to provide
// a simple API for commanding the base and collecting its telemetry.

use tracing::{debug, info, trace, warn};

use crate::config::{BaseConfig, VelocityLimits};
use crate::messages::VelocityCommand;
use crate::telemetry::{self, Telemetry};

use super::encoder::{EncodeError, MotorCommand, encode};
use super::mixer::{WheelLayout, mix_with_params};
use super::msp::{self, Command, Receiver};
use super::transport::{SerialTransport, Transport};

/// Bytes pulled from the transport per read
const READ_CHUNK: usize = 64;

/// Error types for the base driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rejected motor command: {0}")]
    Encode(#[from] EncodeError),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Owns the link to the motor controller and the inbound parser state
pub struct BaseDriver<T: Transport> {
    transport: T,
    receiver: Receiver,
    layout: WheelLayout,
    limits: VelocityLimits,
}

impl BaseDriver<SerialTransport> {
    /// Open the configured serial port
    pub fn open(config: &BaseConfig) -> Result<Self> {
        info!(
            "Opening serial port {}, baudrate {}",
            config.port, config.baud
        );
        let transport = SerialTransport::open(&config.port, config.baud)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> BaseDriver<T> {
    pub fn with_transport(transport: T, config: &BaseConfig) -> Self {
        Self {
            transport,
            receiver: Receiver::new(),
            layout: config.layout,
            limits: config.limits,
        }
    }

    /// Drop stale inbound bytes and any half-parsed frame
    pub fn flush_input(&mut self) -> Result<()> {
        debug!("Flushing serial input");
        self.transport.discard_buffers()?;
        self.receiver.reset();
        Ok(())
    }

    /// Mix, encode and transmit a planar velocity command
    ///
    /// Nothing is written if the encoded command falls outside the safety
    /// envelope; the motors keep their last command.
    pub fn set_velocity(&mut self, cmd: &VelocityCommand) -> Result<MotorCommand> {
        let wheels = mix_with_params(
            cmd.vx,
            cmd.vy,
            cmd.vr,
            &self.layout,
            self.limits.comb_limit,
        );
        let motors = encode(&wheels, &self.limits)?;
        self.send_motors(motors)?;
        Ok(motors)
    }

    /// Transmit already-encoded motor values
    pub fn send_motors(&mut self, motors: MotorCommand) -> Result<()> {
        debug!("Setting motors: {:?}", motors.as_array());
        self.transport.send(&msp::set_motor(&motors))?;
        Ok(())
    }

    /// Command every motor to neutral
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping all motors");
        self.send_motors(MotorCommand::neutral(&self.limits))
    }

    /// Ask the controller for the next IMU and attitude samples
    pub fn request_telemetry(&mut self) -> Result<()> {
        self.transport.send(&msp::query(Command::RawImu))?;
        self.transport.send(&msp::query(Command::Attitude))?;
        Ok(())
    }

    /// Parse every byte already available and append decoded telemetry to `out`
    ///
    /// Frames that fail to decode are skipped. Partial frames stay in the
    /// receiver until the next call.
    pub fn drain(&mut self, out: &mut Vec<Telemetry>) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self.transport.read_available(&mut buf)?;
            if n == 0 {
                return Ok(());
            }

            for &byte in &buf[..n] {
                if !self.receiver.feed(byte) {
                    continue;
                }
                match self.receiver.response() {
                    Ok(response) => match telemetry::decode(&response) {
                        Some(sample) => out.push(sample),
                        None => trace!("Controller acknowledged {:?}", response),
                    },
                    Err(e) => debug!("Skipping frame: {}", e),
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Drop for BaseDriver<T> {
    fn drop(&mut self) {
        // Leave the base at neutral whichever way the driver goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{AttitudeTelemetry, ImuTelemetry, Vector3};
    use crate::motor::msp::{Attitude, Direction, RawImu, Response};
    use crate::motor::transport::MemoryTransport;

    fn driver() -> BaseDriver<MemoryTransport> {
        BaseDriver::with_transport(MemoryTransport::default(), &BaseConfig::default())
    }

    /// Split written bytes back into (direction, command, payload) frames
    fn sent_frames(bytes: &[u8]) -> Vec<(Direction, u8, Vec<u8>)> {
        let mut receiver = Receiver::new();
        let mut frames = Vec::new();
        for &b in bytes {
            if receiver.feed(b) {
                let frame = receiver.frame().unwrap();
                frames.push((frame.direction(), frame.command(), frame.payload().to_vec()));
            }
        }
        frames
    }

    #[test]
    fn test_set_velocity_writes_set_motor() {
        let mut driver = driver();
        let motors = driver
            .set_velocity(&VelocityCommand::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(motors.as_array(), [1550; 4]);

        let frames = sent_frames(&driver.transport_mut().take_outbound());
        assert_eq!(frames.len(), 1);
        let (direction, command, payload) = &frames[0];
        assert_eq!(*direction, Direction::Request);
        assert_eq!(*command, Command::SetMotor as u8);
        assert_eq!(
            msp::motor_slots(payload).unwrap(),
            [1550, 1550, 1550, 1550, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_rejected_command_is_not_sent() {
        let mut driver = driver();
        driver.stop().unwrap();
        driver.transport_mut().take_outbound();

        let err = driver
            .set_velocity(&VelocityCommand::new(f64::NAN, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, DriverError::Encode(_)));
        assert!(driver.transport_mut().take_outbound().is_empty());
    }

    #[test]
    fn test_request_telemetry_sends_both_queries() {
        let mut driver = driver();
        driver.request_telemetry().unwrap();

        let frames = sent_frames(&driver.transport_mut().take_outbound());
        assert_eq!(
            frames,
            vec![
                (Direction::Request, Command::RawImu as u8, vec![]),
                (Direction::Request, Command::Attitude as u8, vec![]),
            ]
        );
    }

    #[test]
    fn test_drain_decodes_all_frames() {
        let mut driver = driver();
        let imu = RawImu {
            acc: [1, 2, 3],
            gyro: [4, 5, 6],
            mag: [0; 3],
        };
        let att = Attitude {
            angx: 7,
            angy: 8,
            heading: 9,
        };

        let mut stream = Response::RawImu(imu).to_frame();
        stream.extend(Response::MotorAck.to_frame());
        stream.extend([0xAA, 0x55]); // line noise
        stream.extend(Response::Attitude(att).to_frame());
        // Longer than one read chunk
        for _ in 0..4 {
            stream.extend(Response::RawImu(imu).to_frame());
        }
        driver.transport_mut().push_inbound(&stream);

        let mut out = Vec::new();
        driver.drain(&mut out).unwrap();

        let expected_imu = Telemetry::Imu(ImuTelemetry {
            linear: Vector3::new(1.0, 2.0, 3.0),
            angular: Vector3::new(4.0, 5.0, 6.0),
        });
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], expected_imu);
        assert_eq!(
            out[1],
            Telemetry::Attitude(AttitudeTelemetry {
                angx: 7.0,
                angy: 8.0,
                heading: 9.0,
            })
        );
        assert!(out[2..].iter().all(|t| *t == expected_imu));
    }

    #[test]
    fn test_drain_keeps_partial_frame() {
        let mut driver = driver();
        let att = Attitude {
            angx: 1,
            angy: 2,
            heading: 3,
        };
        let bytes = Response::Attitude(att).to_frame();

        driver.transport_mut().push_inbound(&bytes[..5]);
        let mut out = Vec::new();
        driver.drain(&mut out).unwrap();
        assert!(out.is_empty());

        driver.transport_mut().push_inbound(&bytes[5..]);
        driver.drain(&mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_flush_discards_stale_bytes() {
        let mut driver = driver();
        let bytes = Response::MotorAck.to_frame();
        driver.transport_mut().push_inbound(&bytes[..3]);
        let mut out = Vec::new();
        driver.drain(&mut out).unwrap();

        driver.flush_input().unwrap();
        // Tail of the flushed frame must not be stitched to new bytes
        driver.transport_mut().push_inbound(&bytes[3..]);
        driver.drain(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut driver = driver();
        driver.transport_mut().fail_writes = true;
        let err = driver.request_telemetry().unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
        assert!(driver.transport_mut().take_outbound().is_empty());
    }
}
