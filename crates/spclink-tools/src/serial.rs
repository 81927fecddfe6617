use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use spclink::link::{Transport, TransportError};

/// Bounded wait for inbound bytes and drain completion, so a dead device
/// surfaces as an error instead of a hung session.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// `Transport` implementation over a serial port.
pub struct SerialTransport {
    path: String,
    baud: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        SerialTransport {
            path: path.into(),
            baud,
            port: None,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let port = serialport::new(self.path.as_str(), self.baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open(e.to_string()))?;
        self.port = Some(port);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port()?
            .write_all(bytes)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn drain(&mut self) -> Result<(), TransportError> {
        // flush blocks until the output buffer is fully transmitted.
        self.port()?
            .flush()
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn recv_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        match self.port()?.read_exact(&mut byte) {
            Ok(()) => Ok(byte[0]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::TimedOut),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}
