// MultiWii Serial Protocol (v1) codec
//
// Frame format: ['$', 'M', Direction, Size, Command, Payload..., Checksum]
// Checksum is the XOR of size, command and every payload byte.
// Multi-byte payload fields are little-endian.

use tracing::trace;

use super::encoder::MotorCommand;

/// Frame preamble bytes
const PREAMBLE: [u8; 2] = [b'$', b'M'];

/// Preamble + direction + size + command + checksum
pub const FRAME_OVERHEAD: usize = 6;

/// Largest payload the receiver accepts; longer frames are dropped
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Motor slots carried by a SET_MOTOR payload
pub const MOTOR_SLOTS: usize = 8;

/// Who a frame is addressed to
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request = b'<',  // host -> controller
    Response = b'>', // controller -> host
    Error = b'!',    // controller rejected the request
}

impl Direction {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'<' => Some(Direction::Request),
            b'>' => Some(Direction::Response),
            b'!' => Some(Direction::Error),
            _ => None,
        }
    }
}

/// Command set used by the base
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RawImu = 102,   // 9 x i16: acc, gyro, mag
    Attitude = 108, // 3 x i16: angx, angy, heading
    SetMotor = 214, // 8 x u16 motor values
}

impl TryFrom<u8> for Command {
    type Error = MspError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            102 => Ok(Command::RawImu),
            108 => Ok(Command::Attitude),
            214 => Ok(Command::SetMotor),
            other => Err(MspError::UnknownCommand(other)),
        }
    }
}

/// Errors raised while interpreting a complete frame
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MspError {
    #[error("No complete frame available")]
    NoFrame,

    #[error("Unknown command {0}")]
    UnknownCommand(u8),

    #[error("Unexpected {direction:?} frame for command {command}")]
    UnexpectedDirection { command: u8, direction: Direction },

    #[error("Command {command} payload has {len} bytes, expected {expected}")]
    PayloadLength {
        command: u8,
        len: usize,
        expected: usize,
    },
}

pub type Result<T> = std::result::Result<T, MspError>;

/// XOR checksum over size, command and payload
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc ^ b)
}

/// Build a frame with preamble and checksum
pub fn encode_frame(direction: Direction, command: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u8::MAX as usize);
    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());

    frame.extend_from_slice(&PREAMBLE);
    frame.push(direction as u8);
    frame.push(payload.len() as u8);
    frame.push(command);
    frame.extend_from_slice(payload);

    // Checksum over size, command, payload
    let sum = checksum(&frame[3..]);
    frame.push(sum);

    frame
}

/// Empty-payload query for a telemetry command
pub fn query(command: Command) -> Vec<u8> {
    encode_frame(Direction::Request, command as u8, &[])
}

/// SET_MOTOR request; slots past the base motors are sent as 0
pub fn set_motor(motors: &MotorCommand) -> Vec<u8> {
    let mut slots = [0u16; MOTOR_SLOTS];
    slots[..4].copy_from_slice(&motors.as_array());

    let payload: Vec<u8> = slots.iter().flat_map(|v| v.to_le_bytes()).collect();
    encode_frame(Direction::Request, Command::SetMotor as u8, &payload)
}

/// Decode the motor slots of a SET_MOTOR payload
#[cfg(test)]
pub(crate) fn motor_slots(payload: &[u8]) -> Result<[u16; MOTOR_SLOTS]> {
    expect_len(Command::SetMotor, payload, MOTOR_SLOTS * 2)?;
    let mut slots = [0u16; MOTOR_SLOTS];
    for (slot, bytes) in slots.iter_mut().zip(payload.chunks_exact(2)) {
        *slot = u16::from_le_bytes([bytes[0], bytes[1]]);
    }
    Ok(slots)
}

fn expect_len(command: Command, payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(MspError::PayloadLength {
            command: command as u8,
            len: payload.len(),
            expected,
        });
    }
    Ok(())
}

fn read_i16s<const N: usize>(payload: &[u8]) -> [i16; N] {
    let mut values = [0i16; N];
    for (value, bytes) in values.iter_mut().zip(payload.chunks_exact(2)) {
        *value = i16::from_le_bytes([bytes[0], bytes[1]]);
    }
    values
}

#[cfg(test)]
fn write_i16s(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// RAW_IMU response payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawImu {
    pub acc: [i16; 3],
    pub gyro: [i16; 3],
    pub mag: [i16; 3],
}

impl RawImu {
    pub const PAYLOAD_LEN: usize = 18;

    pub fn decode(payload: &[u8]) -> Result<Self> {
        expect_len(Command::RawImu, payload, Self::PAYLOAD_LEN)?;
        let v: [i16; 9] = read_i16s(payload);
        Ok(Self {
            acc: [v[0], v[1], v[2]],
            gyro: [v[3], v[4], v[5]],
            mag: [v[6], v[7], v[8]],
        })
    }

    #[cfg(test)]
    pub(crate) fn to_payload(&self) -> Vec<u8> {
        let mut values = Vec::with_capacity(9);
        values.extend_from_slice(&self.acc);
        values.extend_from_slice(&self.gyro);
        values.extend_from_slice(&self.mag);
        write_i16s(&values)
    }
}

/// ATTITUDE response payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attitude {
    pub angx: i16,
    pub angy: i16,
    pub heading: i16,
}

impl Attitude {
    pub const PAYLOAD_LEN: usize = 6;

    pub fn decode(payload: &[u8]) -> Result<Self> {
        expect_len(Command::Attitude, payload, Self::PAYLOAD_LEN)?;
        let [angx, angy, heading]: [i16; 3] = read_i16s(payload);
        Ok(Self {
            angx,
            angy,
            heading,
        })
    }

    #[cfg(test)]
    pub(crate) fn to_payload(&self) -> Vec<u8> {
        write_i16s(&[self.angx, self.angy, self.heading])
    }
}

/// Decoded controller response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    RawImu(RawImu),
    Attitude(Attitude),
    /// Header-only acknowledgement of a SET_MOTOR request
    MotorAck,
}

#[cfg(test)]
impl Response {
    /// Encode as a controller -> host frame
    pub(crate) fn to_frame(&self) -> Vec<u8> {
        match self {
            Response::RawImu(imu) => {
                encode_frame(Direction::Response, Command::RawImu as u8, &imu.to_payload())
            }
            Response::Attitude(att) => {
                encode_frame(Direction::Response, Command::Attitude as u8, &att.to_payload())
            }
            Response::MotorAck => encode_frame(Direction::Response, Command::SetMotor as u8, &[]),
        }
    }
}

/// One complete, checksum-valid frame
#[derive(Debug, Clone)]
pub struct Frame {
    direction: Direction,
    command: u8,
    len: usize,
    payload: [u8; MAX_PAYLOAD_LEN],
}

impl Frame {
    fn empty() -> Self {
        Self {
            direction: Direction::Request,
            command: 0,
            len: 0,
            payload: [0; MAX_PAYLOAD_LEN],
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    /// Does this frame carry `command`?
    pub fn matches(&self, command: Command) -> bool {
        self.command == command as u8
    }

    /// Interpret the frame as a controller response
    pub fn response(&self) -> Result<Response> {
        let command = Command::try_from(self.command)?;
        if self.direction != Direction::Response {
            return Err(MspError::UnexpectedDirection {
                command: self.command,
                direction: self.direction,
            });
        }

        match command {
            Command::RawImu => RawImu::decode(self.payload()).map(Response::RawImu),
            Command::Attitude => Attitude::decode(self.payload()).map(Response::Attitude),
            Command::SetMotor => {
                expect_len(Command::SetMotor, self.payload(), 0)?;
                Ok(Response::MotorAck)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Preamble,
    Direction,
    Size,
    Command,
    Payload,
    Checksum,
}

/// Incremental frame parser, fed one byte at a time
///
/// State survives between calls, so a frame may arrive split across several
/// reads. Malformed frames are dropped silently and parsing resumes at the
/// next `$`.
#[derive(Debug, Clone)]
pub struct Receiver {
    state: State,
    expected_len: usize,
    checksum: u8,
    frame: Frame,
    complete: bool,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            expected_len: 0,
            checksum: 0,
            frame: Frame::empty(),
            complete: false,
        }
    }

    /// Consume one byte. Returns true when it completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> bool {
        self.complete = false;

        match self.state {
            State::Idle => {
                if byte == PREAMBLE[0] {
                    self.state = State::Preamble;
                }
            }
            State::Preamble => {
                if byte == PREAMBLE[1] {
                    self.state = State::Direction;
                } else {
                    self.restart(byte);
                }
            }
            State::Direction => match Direction::from_byte(byte) {
                Some(direction) => {
                    self.frame.direction = direction;
                    self.state = State::Size;
                }
                None => self.restart(byte),
            },
            State::Size => {
                let len = byte as usize;
                if len > MAX_PAYLOAD_LEN {
                    trace!("Dropping frame with oversized payload ({} bytes)", len);
                    self.state = State::Idle;
                } else {
                    self.expected_len = len;
                    self.checksum = byte;
                    self.state = State::Command;
                }
            }
            State::Command => {
                self.frame.command = byte;
                self.frame.len = 0;
                self.checksum ^= byte;
                self.state = if self.expected_len == 0 {
                    State::Checksum
                } else {
                    State::Payload
                };
            }
            State::Payload => {
                self.frame.payload[self.frame.len] = byte;
                self.frame.len += 1;
                self.checksum ^= byte;
                if self.frame.len == self.expected_len {
                    self.state = State::Checksum;
                }
            }
            State::Checksum => {
                self.state = State::Idle;
                if byte == self.checksum {
                    self.complete = true;
                } else {
                    trace!(
                        "Checksum mismatch for command {}: expected 0x{:02X}, got 0x{:02X}",
                        self.frame.command,
                        self.checksum,
                        byte
                    );
                }
            }
        }

        self.complete
    }

    /// The frame completed by the last `feed`, if any
    pub fn frame(&self) -> Option<&Frame> {
        self.complete.then_some(&self.frame)
    }

    /// Decode the frame completed by the last `feed`
    pub fn response(&self) -> Result<Response> {
        self.frame().ok_or(MspError::NoFrame)?.response()
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.complete = false;
    }

    // A byte that broke the header may itself start the next frame
    fn restart(&mut self, byte: u8) {
        self.state = if byte == PREAMBLE[0] {
            State::Preamble
        } else {
            State::Idle
        };
    }
}
