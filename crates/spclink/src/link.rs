//! Serial-link protocol: framing, the byte-stream transport facade, and the
//! driver that sequences the device through its boot states.
pub mod driver;
pub mod frame;
pub mod transport;

pub use driver::{DspInitReason, LinkError, LinkState, ProtocolError, SpcLink};
pub use frame::{CHUNK_LEN, MAX_TRANSACTION, Opcode, Response, checksum};
pub use transport::{Transport, TransportError};
