// Motor control module for the omnidirectional base
//
// Provides:
// - Velocity mixing (planar velocity -> wheel speeds)
// - Motor command encoding with a hard safety envelope
// - MultiWii Serial Protocol codec
// - High-level driver over a byte transport

mod driver;
pub mod encoder;
pub mod mixer;
pub mod msp;
pub mod transport;

pub use driver::{BaseDriver, DriverError};
pub use encoder::{EncodeError, MotorCommand, encode};
pub use mixer::{DEFAULT_LAYOUT, WheelLayout, mix};
pub use transport::{SerialTransport, Transport};
