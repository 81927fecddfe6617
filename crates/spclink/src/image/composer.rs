//! The Binary Image Composer.
//!
//! Turns a parsed `Snapshot` into everything a play session transfers to the
//! device, with no device interaction of its own:
//!
//! - a patched boot stub (injected into the memory image, started by the
//!   play command),
//! - a patched DSP-restore stub (transferred with the load-DSP command),
//! - the DSP register bank copy handed to the driver (optionally with all
//!   voices muted so nothing sounds before the resumed program re-keys
//!   them),
//! - a finalized 64 KB image with the boot stub injected at a located
//!   free-space offset and the call stack rebuilt to emulate a
//!   post-interrupt return.
//!
//! Free space is found by scanning for a maximal run of one repeated byte
//! value: captures contain long runs of a constant filler byte in unused
//! memory, and reusing such a run avoids corrupting live data without a
//! relocation table. The scan prefers the highest-address run and never
//! touches the DSP echo buffer.
use log::{debug, info};
use std::fmt;

use crate::binutil::{write_slice, write_u8};
use crate::image::stubs::{
    BOOT_SLOT_CONTROL, BOOT_SLOT_DSP_ADDR, BOOT_SLOT_DSP_EFB, BOOT_SLOT_DSP_FLAGS, BOOT_SLOT_PORT0,
    BOOT_SLOT_PORT3, BOOT_SLOT_ZP0, BOOT_SLOT_ZP1, BOOT_STUB, BOOT_STUB_LEN,
    DSP_SLOT_STACK_POINTER, DSP_SLOT_TIMER0, DSP_SLOT_TIMER1, DSP_SLOT_TIMER2, DSP_STUB,
    DSP_STUB_LEN, PORT_SENTINEL,
};
use crate::spc::{DSP_LEN, RAM_LEN, Snapshot};

/// Highest address a candidate run may end at; above this sits the boot ROM
/// shadow region.
const SCAN_TOP: usize = 0xFFBF;

/// Lowest address injectable code may start at; below this are the I/O
/// ports, fast-access variables and the stack page.
const IMAGE_FLOOR: usize = 0x100;

/// DSP register holding the echo buffer start page.
const DSP_ECHO_START: usize = 0x6D;
/// DSP register holding the echo delay (buffer size in 0x800-byte steps).
const DSP_ECHO_DELAY: usize = 0x7D;
/// DSP flags register (reset/mute/echo-disable).
const DSP_FLAGS: usize = 0x6C;
/// DSP key-on register.
const DSP_KEY_ON: usize = 0x4C;
/// Flags value with the mute bit set and echo writes disabled.
const DSP_FLAGS_MUTED: u8 = 0x60;

/// Error type returned by the composer.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeError {
    /// No repeated-byte run large enough for the boot stub exists outside
    /// the echo buffer. Fatal for this snapshot; there is no fallback
    /// relocation strategy.
    NoSpaceForStub { stub_len: usize },
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::NoSpaceForStub { stub_len } => {
                write!(f, "no free run of {} bytes for the boot stub", stub_len)
            }
        }
    }
}

impl std::error::Error for ComposeError {}

/// The DSP echo buffer region, derived from the captured register bank.
/// Injected code must never overlap it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoRegion {
    pub start: usize,
    pub size: usize,
}

impl EchoRegion {
    /// Derive the echo region from DSP registers 0x6D (start page) and
    /// 0x7D (delay, in 2 KB steps).
    pub fn from_dsp(dsp: &[u8; DSP_LEN]) -> Self {
        EchoRegion {
            start: dsp[DSP_ECHO_START] as usize * 0x100,
            size: dsp[DSP_ECHO_DELAY] as usize * 0x800,
        }
    }

    /// Whether `[lo, hi]` (inclusive) touches `[start, start+size]`.
    fn intersects(&self, lo: usize, hi: usize) -> bool {
        lo <= self.start + self.size && self.start <= hi
    }
}

/// Options for [`compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Mute all voices in the transferred DSP register bank so audio does
    /// not glitch before the resumed program re-enables them itself. Policy,
    /// not correctness; on by default.
    pub mute_voices: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        ComposeOptions { mute_voices: true }
    }
}

/// Everything a play session transfers, bundled so callers cannot
/// mis-sequence the parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedImage {
    pub boot_stub: [u8; BOOT_STUB_LEN],
    pub dsp_stub: [u8; DSP_STUB_LEN],
    /// DSP register bank to transfer (a copy; muted when the option is on).
    pub dsp_registers: [u8; DSP_LEN],
    /// Finalized program memory with the boot stub injected.
    pub image: Box<[u8; RAM_LEN]>,
    /// Address of the injected boot stub; the play command's entry point.
    pub boot_entry: u16,
    /// Captured port bytes for the play command, verbatim.
    pub port_values: [u8; 4],
}

/// Reserve six bytes below the captured stack pointer for the emulated
/// return frame (A, X, Y, PSW, PC-low, PC-high). Wraps within the one-page
/// stack like the hardware does.
pub fn compute_stack_pointer(sp: u8) -> u8 {
    sp.wrapping_sub(6)
}

/// Scan program memory for the highest-address window of `stub_len` bytes
/// that holds a single repeated byte value, outside the echo region and
/// inside `[0x100, 0xFFBF]`.
///
/// At each candidate end address `end` (from 0xFFBF downward) the window
/// `[end - stub_len, end)` qualifies when every byte in it equals
/// `ram[end]`, i.e. the window sits inside a maximal run of one filler
/// byte. The first match wins, so ties break toward the highest address.
/// Returns the run's start offset, or `NoSpaceForStub` when the scan
/// exhausts the range.
pub fn locate_injection_site(
    ram: &[u8; RAM_LEN],
    stub_len: usize,
    echo: &EchoRegion,
) -> Result<u16, ComposeError> {
    for end in (IMAGE_FLOOR + stub_len..=SCAN_TOP).rev() {
        let start = end - stub_len;
        if echo.intersects(start, end) {
            continue;
        }
        let fill = ram[end];
        if ram[start..end].iter().all(|&b| b == fill) {
            debug!("injection site {:#06X}, fill byte {:#04X}", start, fill);
            return Ok(start as u16);
        }
    }
    Err(ComposeError::NoSpaceForStub { stub_len })
}

/// Copy the boot-stub template and fill its patch slots from the snapshot.
///
/// Slots: the original bytes at program addresses 0x00/0x01 (the loader
/// uses them as scratch), the control byte `ram[0xF1] & 0xCF` (mask clears
/// the two port-reset bits so they are not force-reset at boot), the
/// captured port latches at 0xF4/0xF7, DSP flags `dsp[0x6C]`, echo feedback
/// `dsp[0x47]`, and the captured DSP address register `ram[0xF2]`.
///
/// Special case: when all four port-input bytes 0xF4..=0xF7 are zero, the
/// port-0 slot gets [`PORT_SENTINEL`] instead, because zero is ambiguous
/// with "not yet written" on the real hardware.
pub fn build_boot_stub(snapshot: &Snapshot) -> [u8; BOOT_STUB_LEN] {
    let mut stub = BOOT_STUB;
    stub[BOOT_SLOT_ZP0] = snapshot.ram[0x00];
    stub[BOOT_SLOT_ZP1] = snapshot.ram[0x01];
    stub[BOOT_SLOT_CONTROL] = snapshot.ram[0xF1] & 0xCF;
    stub[BOOT_SLOT_DSP_FLAGS] = snapshot.dsp[DSP_FLAGS];

    let ports = snapshot.port_values();
    stub[BOOT_SLOT_PORT0] = if ports == [0, 0, 0, 0] {
        PORT_SENTINEL
    } else {
        ports[0]
    };
    stub[BOOT_SLOT_PORT3] = ports[3];

    stub[BOOT_SLOT_DSP_EFB] = snapshot.dsp[0x47];
    stub[BOOT_SLOT_DSP_ADDR] = snapshot.ram[0xF2];
    stub
}

/// Copy the DSP-restore-stub template and fill its patch slots: the three
/// timer reload values from `ram[0xFA..0xFD]` and the adjusted stack
/// pointer.
pub fn build_dsp_stub(snapshot: &Snapshot, stack_pointer: u8) -> [u8; DSP_STUB_LEN] {
    let mut stub = DSP_STUB;
    stub[DSP_SLOT_STACK_POINTER] = stack_pointer;
    stub[DSP_SLOT_TIMER0] = snapshot.ram[0xFA];
    stub[DSP_SLOT_TIMER1] = snapshot.ram[0xFB];
    stub[DSP_SLOT_TIMER2] = snapshot.ram[0xFC];
    stub
}

/// Copy program memory, inject the boot stub at `site`, mirror the adjusted
/// stack pointer into `ram[0xFF]`, and write the six-byte return frame
/// `{A, X, Y, PSW, PC-low, PC-high}` into stack page one at
/// `(stack_pointer+1)..=(stack_pointer+6)` (indices wrap within the page).
pub fn finalize_image(
    snapshot: &Snapshot,
    boot_stub: &[u8; BOOT_STUB_LEN],
    site: u16,
    stack_pointer: u8,
) -> Box<[u8; RAM_LEN]> {
    let mut image = snapshot.ram.clone();
    write_slice(&mut image[..], site as usize, boot_stub);
    write_u8(&mut image[..], 0xFF, stack_pointer);

    let frame = [
        snapshot.a,
        snapshot.x,
        snapshot.y,
        snapshot.psw,
        (snapshot.pc & 0xFF) as u8,
        (snapshot.pc >> 8) as u8,
    ];
    for (k, &byte) in frame.iter().enumerate() {
        let slot = 0x100 + ((stack_pointer as usize + 1 + k) & 0xFF);
        image[slot] = byte;
    }
    image
}

/// Produce the complete transfer set for one play session.
///
/// Fails with [`ComposeError::NoSpaceForStub`] when no injection site
/// exists; that is fatal for this snapshot.
pub fn compose(snapshot: &Snapshot, options: &ComposeOptions) -> Result<ComposedImage, ComposeError> {
    let echo = EchoRegion::from_dsp(&snapshot.dsp);
    let site = locate_injection_site(&snapshot.ram, BOOT_STUB_LEN, &echo)?;
    let stack_pointer = compute_stack_pointer(snapshot.sp);

    let boot_stub = build_boot_stub(snapshot);
    let dsp_stub = build_dsp_stub(snapshot, stack_pointer);
    let image = finalize_image(snapshot, &boot_stub, site, stack_pointer);

    let mut dsp_registers = snapshot.dsp;
    if options.mute_voices {
        dsp_registers[DSP_FLAGS] = DSP_FLAGS_MUTED;
        dsp_registers[DSP_KEY_ON] = 0x00;
    }

    info!(
        "composed image: boot stub at {:#06X}, echo {:#06X}+{:#X}, sp {:#04X}",
        site, echo.start, echo.size, stack_pointer
    );

    Ok(ComposedImage {
        boot_stub,
        dsp_stub,
        dsp_registers,
        image,
        boot_entry: site,
        port_values: snapshot.port_values(),
    })
}
