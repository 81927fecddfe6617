#![doc = include_str!("../README.md")]
//! spclink — parser, image composer and link driver for SPC snapshot playback
//!
//! Key features:
//! - Parser support to read `.spc` dumps into a structured [`Snapshot`]
//!   (program memory, DSP register bank, CPU registers, ID666 metadata).
//! - A Binary Image Composer that locates free space in the 64 KB image,
//!   injects a patched boot stub, rebuilds the call stack, and produces the
//!   DSP-restore stub and register bank for transfer.
//! - A Transport Protocol Driver that sequences the device over any
//!   [`Transport`] implementation: checksummed frames, 64-byte write
//!   pacing, one outstanding request at a time.
//!
//! Example: compose a transfer set from a snapshot
//!
//! ```rust
//! use spclink::image::{BOOT_STUB_LEN, ComposeOptions, compose};
//! use spclink::spc::Snapshot;
//!
//! // A blank capture: memory is one long filler run, so the boot stub
//! // lands at the top of the scannable range.
//! let snapshot = Snapshot::new();
//! let set = compose(&snapshot, &ComposeOptions::default()).unwrap();
//! assert_eq!(set.boot_entry as usize, 0xFFBF - BOOT_STUB_LEN);
//! // The injected stub is part of the finalized image.
//! let entry = set.boot_entry as usize;
//! assert_eq!(&set.image[entry..entry + BOOT_STUB_LEN], &set.boot_stub[..]);
//! ```
//!
//! Example: drive a device through the full boot sequence
//!
//! ```no_run
//! use spclink::image::{ComposeOptions, compose};
//! use spclink::link::{SpcLink, Transport, TransportError};
//! use spclink::spc::Snapshot;
//!
//! // Any ordered, reliable byte stream works; spclink-tools ships a
//! // serial-port implementation.
//! struct Loopback;
//! impl Transport for Loopback {
//!     fn open(&mut self) -> Result<(), TransportError> { Ok(()) }
//!     fn send(&mut self, _bytes: &[u8]) -> Result<(), TransportError> { Ok(()) }
//!     fn drain(&mut self) -> Result<(), TransportError> { Ok(()) }
//!     fn recv_byte(&mut self) -> Result<u8, TransportError> { Ok(0x01) }
//! }
//!
//! let snapshot = Snapshot::new();
//! let set = compose(&snapshot, &ComposeOptions::default())?;
//!
//! let mut link = SpcLink::new(Loopback);
//! link.open()?; // blocks until the device announces READY
//! link.boot(&set)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod binutil;
pub mod image;
pub mod link;
pub mod meta;
pub mod spc;

pub use binutil::ParseError;
pub use image::{ComposeError, ComposeOptions, ComposedImage, compose};
pub use link::{LinkError, SpcLink, Transport, TransportError};
pub use meta::Id666;
pub use spc::Snapshot;
