//! The byte-stream transport facade.
//!
//! The protocol driver requires exactly one thing from the outside world:
//! an ordered, reliable byte stream with flow-controlled writes and a
//! blocking, bounded read. Everything device-specific about the physical
//! link (serial port parameters, OS handles, timeouts) lives behind this
//! trait; the `spclink-tools` crate provides a serial-port implementation,
//! and tests drive the protocol against scripted in-memory transports.
use std::fmt;

/// Error type reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying stream could not be opened.
    Open(String),
    /// A read or write on the open stream failed.
    Io(String),
    /// The stream was closed while an operation was pending.
    Closed,
    /// The bounded wait for inbound data or drain completion elapsed.
    TimedOut,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Open(msg) => write!(f, "failed to open transport: {}", msg),
            TransportError::Io(msg) => write!(f, "transport i/o error: {}", msg),
            TransportError::Closed => write!(f, "transport closed"),
            TransportError::TimedOut => write!(f, "transport timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

/// An ordered, reliable byte stream to the device.
///
/// Contract for implementations:
///
/// - `send` submits one physical write transaction. Callers never pass more
///   than [`crate::link::frame::MAX_TRANSACTION`] bytes per call.
/// - `drain` blocks until the previously sent transaction is fully
///   transmitted. This is the driver's backpressure point: the next `send`
///   is only issued after `drain` returns.
/// - `recv_byte` blocks until the next inbound byte arrives. It must return
///   an error — never hang indefinitely — when the stream closes or the
///   implementation's bounded wait elapses, so a pending acknowledgement
///   wait fails instead of deadlocking the session.
///
/// A transport is exclusively owned by one driver for the session's
/// lifetime; no other component may write to the stream.
pub trait Transport {
    /// Open the underlying byte stream.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Submit one physical write transaction.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block until the last transaction is fully transmitted.
    fn drain(&mut self) -> Result<(), TransportError>;

    /// Block until the next inbound byte arrives, with a bounded wait.
    fn recv_byte(&mut self) -> Result<u8, TransportError>;
}
