//! The transport protocol driver.
//!
//! `SpcLink` sequences the device through its boot and playback states with
//! exactly one outstanding request at a time. Every payload-carrying frame
//! is checksum-appended, split into write transactions of at most
//! [`MAX_TRANSACTION`] bytes (each drained before the next — the
//! backpressure point), and acknowledged by a single response byte before
//! anything else is sent. The device has no request identifiers, so
//! correctness depends on this strict response-to-request pairing by
//! arrival order.
//!
//! State machine:
//!
//! ```text
//! Disconnected -> AwaitingReady -> Ready -> { Resetting, LoadingDsp,
//!     LoadingImage, Playing } -> Ready
//!                                    |
//!                                    v (any protocol violation)
//!                                 Faulted   (terminal for the session)
//! ```
//!
//! There is no automatic retry and no partial-chunk resumption: a rejected
//! frame faults the driver and surfaces to the caller with the response
//! code (and the offending address for chunk failures). Closing the byte
//! stream fails any pending wait with a transport error rather than
//! hanging.
use log::{info, trace};
use std::fmt;

use crate::image::ComposedImage;
use crate::link::frame::{
    self, CHUNK_LEN, IMAGE_BODY_START, MAX_TRANSACTION, Opcode, Response, ZERO_PAGE_END,
    ZERO_PAGE_START,
};
use crate::link::transport::{Transport, TransportError};
use crate::spc::{DSP_LEN, RAM_LEN};

/// Driver states. `Faulted` is terminal: once a protocol violation is
/// observed the session is unrecoverable and every further operation is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    AwaitingReady,
    Ready,
    Resetting,
    LoadingDsp,
    LoadingImage,
    Playing,
    Faulted,
}

/// A frame the device rejected or misreported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The device rejected a payload checksum.
    BadChecksum,
    /// The device reported a generic failure.
    Fail,
    /// A byte that is not a known response code (or not the expected one)
    /// arrived.
    UnexpectedByte(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::BadChecksum => write!(f, "device rejected the payload checksum"),
            ProtocolError::Fail => write!(f, "device reported failure"),
            ProtocolError::UnexpectedByte(b) => {
                write!(f, "unexpected response byte 0x{:02X}", b)
            }
        }
    }
}

/// Why DSP initialization failed, distinguishing a checksum-rejected
/// payload from any other rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspInitReason {
    BadChecksum,
    Unknown,
}

/// Error type returned by driver operations.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The underlying byte stream failed (open error, I/O error, closure
    /// mid-wait, bounded-wait expiry).
    Transport(TransportError),
    /// The device violated the protocol outside a named operation (e.g. a
    /// non-READY byte during the post-open wait).
    Protocol(ProtocolError),
    ResetFailed(ProtocolError),
    DspInitFailed { reason: DspInitReason },
    /// A chunk (or the zero-page frame) was rejected; `address` is the
    /// first image address of the failing transfer unit.
    ImageLoadFailed { address: u16, reason: ProtocolError },
    PlayFailed(ProtocolError),
    /// The operation is not legal in the driver's current state.
    BadState {
        operation: &'static str,
        state: LinkState,
    },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Transport(e) => write!(f, "{}", e),
            LinkError::Protocol(p) => write!(f, "protocol violation: {}", p),
            LinkError::ResetFailed(p) => write!(f, "reset rejected: {}", p),
            LinkError::DspInitFailed { reason } => match reason {
                DspInitReason::BadChecksum => {
                    write!(f, "dsp init failed: device rejected a checksum")
                }
                DspInitReason::Unknown => write!(f, "dsp init failed"),
            },
            LinkError::ImageLoadFailed { address, reason } => {
                write!(f, "image load failed at {:#06X}: {}", address, reason)
            }
            LinkError::PlayFailed(p) => write!(f, "play rejected: {}", p),
            LinkError::BadState { operation, state } => {
                write!(f, "{} issued in state {:?}", operation, state)
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// Outcome of the internal send-and-await-acknowledge primitive, before it
/// is mapped to an operation-specific error.
enum AckError {
    Transport(TransportError),
    Rejected(ProtocolError),
}

/// The protocol driver. Owns its transport exclusively for the session's
/// lifetime; commands are strictly sequential.
pub struct SpcLink<T> {
    transport: T,
    state: LinkState,
}

impl<T: Transport> SpcLink<T> {
    /// Wrap a transport. The driver starts `Disconnected`; call [`open`]
    /// before anything else.
    ///
    /// [`open`]: SpcLink::open
    pub fn new(transport: T) -> Self {
        SpcLink {
            transport,
            state: LinkState::Disconnected,
        }
    }

    /// Current driver state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Consume the driver and return the transport, ending the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Open the underlying byte stream, then block until the device's
    /// power-on READY byte is observed.
    ///
    /// Fails with `Transport` if the stream reports an error first, and
    /// with `Protocol(UnexpectedByte)` if anything other than READY
    /// arrives.
    pub fn open(&mut self) -> Result<(), LinkError> {
        if self.state != LinkState::Disconnected {
            return Err(LinkError::BadState {
                operation: "open",
                state: self.state,
            });
        }
        self.transport.open().map_err(LinkError::Transport)?;
        self.state = LinkState::AwaitingReady;

        let byte = match self.transport.recv_byte() {
            Ok(b) => b,
            Err(e) => {
                self.state = LinkState::Faulted;
                return Err(LinkError::Transport(e));
            }
        };
        match Response::from_byte(byte) {
            Some(Response::Ready) => {
                info!("device ready");
                self.state = LinkState::Ready;
                Ok(())
            }
            _ => {
                self.state = LinkState::Faulted;
                Err(LinkError::Protocol(ProtocolError::UnexpectedByte(byte)))
            }
        }
    }

    /// Send the single-byte Reset command and await OKAY.
    pub fn reset(&mut self) -> Result<(), LinkError> {
        self.require_ready("reset")?;
        self.state = LinkState::Resetting;
        info!("reset");
        match self.send_and_await_ack(&[Opcode::Reset as u8]) {
            Ok(()) => {
                self.state = LinkState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail(LinkError::ResetFailed, e)),
        }
    }

    /// Transfer the DSP-restore stub, then the 128-byte DSP register bank,
    /// each awaiting OKAY. The register frame carries no opcode: after
    /// accepting the stub the device is already primed for the bank.
    pub fn load_dsp_state(&mut self, stub: &[u8], dsp: &[u8; DSP_LEN]) -> Result<(), LinkError> {
        self.require_ready("load_dsp_state")?;
        self.state = LinkState::LoadingDsp;
        info!("loading dsp state ({} stub bytes + {} registers)", stub.len(), DSP_LEN);

        if let Err(e) = self.send_and_await_ack(&frame::opcode_frame(Opcode::LoadDsp, stub)) {
            return Err(self.fail_dsp(e));
        }
        if let Err(e) = self.send_and_await_ack(&frame::raw_frame(dsp)) {
            return Err(self.fail_dsp(e));
        }
        self.state = LinkState::Ready;
        Ok(())
    }

    /// Transfer a finalized 64 KB image.
    ///
    /// Zero-page phase first: image bytes `[2, 0xEF)` as one frame tagged
    /// with the begin-image-load opcode. Then the body: ascending,
    /// non-overlapping 128-byte chunks covering `[0x100, 0x10000)`, each as
    /// an address-tagged header frame followed by the chunk payload, both
    /// acknowledged. The first rejection aborts the whole load.
    pub fn load_image(&mut self, image: &[u8; RAM_LEN]) -> Result<(), LinkError> {
        self.require_ready("load_image")?;
        self.state = LinkState::LoadingImage;

        let zero_page = &image[ZERO_PAGE_START..ZERO_PAGE_END];
        info!("image load: zero page ({} bytes)", zero_page.len());
        if let Err(e) = self.send_and_await_ack(&frame::opcode_frame(Opcode::BeginImage, zero_page))
        {
            return Err(self.fail_image(ZERO_PAGE_START as u16, e));
        }

        for address in (IMAGE_BODY_START..RAM_LEN).step_by(CHUNK_LEN) {
            trace!("image chunk {:#06X}", address);
            let header = [address as u8, (address >> 8) as u8, CHUNK_LEN as u8];
            if let Err(e) = self.send_and_await_ack(&frame::opcode_frame(Opcode::ImageChunk, &header))
            {
                return Err(self.fail_image(address as u16, e));
            }
            let body = &image[address..address + CHUNK_LEN];
            if let Err(e) = self.send_and_await_ack(&frame::raw_frame(body)) {
                return Err(self.fail_image(address as u16, e));
            }
        }
        self.state = LinkState::Ready;
        Ok(())
    }

    /// Send the Play command: boot entry address plus the four port bytes
    /// the host presents while the resumed program starts.
    pub fn play(&mut self, entry: u16, ports: [u8; 4]) -> Result<(), LinkError> {
        self.require_ready("play")?;
        self.state = LinkState::Playing;
        info!("play: entry {:#06X}", entry);

        let payload = [
            entry as u8,
            (entry >> 8) as u8,
            ports[0],
            ports[1],
            ports[2],
            ports[3],
        ];
        match self.send_and_await_ack(&frame::opcode_frame(Opcode::Play, &payload)) {
            Ok(()) => {
                self.state = LinkState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail(LinkError::PlayFailed, e)),
        }
    }

    /// Run the full boot sequence for one composed set:
    /// reset -> DSP state -> image -> play, stopping at the first failure.
    /// The link must already be open.
    pub fn boot(&mut self, set: &ComposedImage) -> Result<(), LinkError> {
        self.reset()?;
        self.load_dsp_state(&set.dsp_stub, &set.dsp_registers)?;
        self.load_image(&set.image)?;
        self.play(set.boot_entry, set.port_values)
    }

    fn require_ready(&self, operation: &'static str) -> Result<(), LinkError> {
        if self.state != LinkState::Ready {
            return Err(LinkError::BadState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Write `bytes` in transactions of at most [`MAX_TRANSACTION`] bytes,
    /// draining after each, then block for exactly one response byte. OKAY
    /// resolves; anything else rejects with the code as payload.
    fn send_and_await_ack(&mut self, bytes: &[u8]) -> Result<(), AckError> {
        for slice in bytes.chunks(MAX_TRANSACTION) {
            self.transport.send(slice).map_err(AckError::Transport)?;
            self.transport.drain().map_err(AckError::Transport)?;
        }
        let byte = self.transport.recv_byte().map_err(AckError::Transport)?;
        match Response::from_byte(byte) {
            Some(Response::Okay) => Ok(()),
            Some(Response::Fail) => Err(AckError::Rejected(ProtocolError::Fail)),
            Some(Response::BadChecksum) => Err(AckError::Rejected(ProtocolError::BadChecksum)),
            _ => Err(AckError::Rejected(ProtocolError::UnexpectedByte(byte))),
        }
    }

    /// Fault the driver and map an acknowledgement failure into the
    /// operation's error variant (transport failures stay transport
    /// failures).
    fn fail<F>(&mut self, map: F, err: AckError) -> LinkError
    where
        F: FnOnce(ProtocolError) -> LinkError,
    {
        self.state = LinkState::Faulted;
        match err {
            AckError::Transport(e) => LinkError::Transport(e),
            AckError::Rejected(p) => map(p),
        }
    }

    fn fail_dsp(&mut self, err: AckError) -> LinkError {
        self.fail(
            |p| LinkError::DspInitFailed {
                reason: match p {
                    ProtocolError::BadChecksum => DspInitReason::BadChecksum,
                    _ => DspInitReason::Unknown,
                },
            },
            err,
        )
    }

    fn fail_image(&mut self, address: u16, err: AckError) -> LinkError {
        self.fail(|p| LinkError::ImageLoadFailed { address, reason: p }, err)
    }
}
