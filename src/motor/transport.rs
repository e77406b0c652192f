// Byte transport between the runtime and the motor controller

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Read timeout for the serial port. Reads only ever ask for bytes that are
/// already buffered, so this is never hit in the scheduler loop.
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// Ordered byte link to the controller
pub trait Transport: Send {
    /// Read bytes that are already available without waiting.
    /// Returns `Ok(0)` when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a complete frame
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Throw away anything buffered in either direction
    fn discard_buffers(&mut self) -> io::Result<()>;
}

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = pending.min(buf.len());
        match self.port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// In-memory transport: tests queue inbound bytes and inspect what was sent.
/// The outbound buffer is shared so writes stay visible after the transport
/// itself has been dropped.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryTransport {
    pub inbound: std::collections::VecDeque<u8>,
    pub outbound: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl MemoryTransport {
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Take everything written so far
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.outbound.lock().unwrap())
    }
}

#[cfg(test)]
impl Transport for MemoryTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.inbound.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"));
        }
        self.outbound.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        self.inbound.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport_reads_in_chunks() {
        let mut transport = MemoryTransport::default();
        transport.push_inbound(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(transport.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_writes_outlive_transport() {
        let mut transport = MemoryTransport::default();
        let outbound = std::sync::Arc::clone(&transport.outbound);
        transport.send(&[1, 2]).unwrap();
        transport.discard_buffers().unwrap();
        transport.send(&[3]).unwrap();
        drop(transport);

        assert_eq!(*outbound.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_open_missing_port_fails() {
        assert!(SerialTransport::open("/dev/does-not-exist-base", 115_200).is_err());
    }
}
