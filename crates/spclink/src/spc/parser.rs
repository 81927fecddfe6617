//! SPC file parser.
//!
//! Parses the standard SPC file layout into a `Snapshot`:
//!
//! - 0x00..0x21: 33-byte ASCII ident (`SNES-SPC700 Sound File Data v0.30`)
//! - 0x21..0x23: two 0x1A header-terminator bytes
//! - 0x23: ID666 presence marker (0x1A = present, 0x1B = absent)
//! - 0x25..0x2C: CPU register block (PC lo/hi, A, X, Y, PSW, SP)
//! - 0x2E..0x100: text-format ID666 tag block (see `crate::meta`)
//! - 0x100..0x10100: 64 KB program memory
//! - 0x10100..0x10180: 128 DSP registers
//!
//! The parser performs strict validation and returns `ParseError` for
//! invalid input (short buffers, wrong ident, missing header markers).
//! Trailing sections past the DSP bank (shadow RAM, extended tags) are
//! ignored: nothing in them affects playback.
use log::debug;

use crate::binutil::{ParseError, read_slice, read_u8_at, read_u16_le_at};
use crate::meta::parse_id666;
use crate::spc::snapshot::{DSP_LEN, RAM_LEN, Snapshot};

/// The 33-byte ident every SPC file starts with.
pub(crate) const SPC_IDENT: &[u8; 33] = b"SNES-SPC700 Sound File Data v0.30";

/// Header-terminator byte, doubled at 0x21 and reused as the ID666 marker.
const HEADER_MARK: u8 = 0x1A;

const OFF_HEADER_MARK: usize = 0x21;
const OFF_HAS_ID666: usize = 0x23;
const OFF_PC: usize = 0x25;
const OFF_A: usize = 0x27;
const OFF_X: usize = 0x28;
const OFF_Y: usize = 0x29;
const OFF_PSW: usize = 0x2A;
const OFF_SP: usize = 0x2B;
const OFF_RAM: usize = 0x100;
const OFF_DSP: usize = OFF_RAM + RAM_LEN;

/// Minimum file length: header + program memory + DSP register bank.
pub(crate) const SPC_MIN_LEN: usize = OFF_DSP + DSP_LEN;

/// Parse a complete SPC file from a byte slice into a `Snapshot`.
///
/// High-level parsing steps:
/// 1. Check the total length against `SPC_MIN_LEN` before any field read.
/// 2. Verify the 33-byte ident and the doubled 0x1A header terminator.
/// 3. Extract the CPU register block.
/// 4. Copy program memory and the DSP register bank.
/// 5. Parse the ID666 tag block when the presence marker says one exists.
///
/// Returns `Ok(Snapshot)` on success or a `ParseError` naming the first
/// malformed field.
pub(crate) fn parse_spc(bytes: &[u8]) -> Result<Snapshot, ParseError> {
    if bytes.len() < SPC_MIN_LEN {
        return Err(ParseError::HeaderTooShort(format!(
            "spc: header + ram + dsp (0x{:X} bytes)",
            SPC_MIN_LEN
        )));
    }

    let ident = read_slice(bytes, 0x00, SPC_IDENT.len())?;
    if ident != SPC_IDENT {
        return Err(ParseError::InvalidIdent(
            String::from_utf8_lossy(ident).into_owned(),
        ));
    }

    if read_u8_at(bytes, OFF_HEADER_MARK)? != HEADER_MARK
        || read_u8_at(bytes, OFF_HEADER_MARK + 1)? != HEADER_MARK
    {
        return Err(ParseError::Other(format!(
            "spc: missing 0x1A,0x1A header terminator at 0x{:X}",
            OFF_HEADER_MARK
        )));
    }

    let pc = read_u16_le_at(bytes, OFF_PC)?;
    let a = read_u8_at(bytes, OFF_A)?;
    let x = read_u8_at(bytes, OFF_X)?;
    let y = read_u8_at(bytes, OFF_Y)?;
    let psw = read_u8_at(bytes, OFF_PSW)?;
    let sp = read_u8_at(bytes, OFF_SP)?;

    let mut ram = Box::new([0u8; RAM_LEN]);
    ram.copy_from_slice(read_slice(bytes, OFF_RAM, RAM_LEN)?);

    let mut dsp = [0u8; DSP_LEN];
    dsp.copy_from_slice(read_slice(bytes, OFF_DSP, DSP_LEN)?);

    let id666 = if read_u8_at(bytes, OFF_HAS_ID666)? == HEADER_MARK {
        Some(parse_id666(bytes)?)
    } else {
        None
    };

    debug!(
        "parsed spc dump: pc={:#06X} sp={:#04X} id666={}",
        pc,
        sp,
        id666.is_some()
    );

    Ok(Snapshot {
        ram,
        dsp,
        a,
        x,
        y,
        psw,
        sp,
        pc,
        id666,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build the smallest well-formed SPC byte buffer.
    pub(crate) fn synthetic_spc() -> Vec<u8> {
        let mut bytes = vec![0u8; SPC_MIN_LEN];
        bytes[..SPC_IDENT.len()].copy_from_slice(SPC_IDENT);
        bytes[OFF_HEADER_MARK] = HEADER_MARK;
        bytes[OFF_HEADER_MARK + 1] = HEADER_MARK;
        bytes[OFF_HAS_ID666] = 0x1B;
        bytes
    }

    #[test]
    fn parses_register_block() {
        let mut bytes = synthetic_spc();
        bytes[OFF_PC] = 0x34;
        bytes[OFF_PC + 1] = 0x12;
        bytes[OFF_A] = 0xAA;
        bytes[OFF_X] = 0xBB;
        bytes[OFF_Y] = 0xCC;
        bytes[OFF_PSW] = 0x02;
        bytes[OFF_SP] = 0xCD;

        let snapshot = parse_spc(&bytes).unwrap();
        assert_eq!(snapshot.pc, 0x1234);
        assert_eq!(snapshot.a, 0xAA);
        assert_eq!(snapshot.x, 0xBB);
        assert_eq!(snapshot.y, 0xCC);
        assert_eq!(snapshot.psw, 0x02);
        assert_eq!(snapshot.sp, 0xCD);
        assert_eq!(snapshot.id666, None);
    }

    #[test]
    fn copies_ram_and_dsp() {
        let mut bytes = synthetic_spc();
        bytes[OFF_RAM + 0x8000] = 0x5A;
        bytes[OFF_DSP + 0x6D] = 0x7E;

        let snapshot = parse_spc(&bytes).unwrap();
        assert_eq!(snapshot.ram[0x8000], 0x5A);
        assert_eq!(snapshot.dsp[0x6D], 0x7E);
    }

    #[test]
    fn rejects_bad_ident() {
        let mut bytes = synthetic_spc();
        bytes[0] = b'X';
        match parse_spc(&bytes) {
            Err(ParseError::InvalidIdent(_)) => {}
            other => panic!("expected InvalidIdent, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_file() {
        let bytes = vec![0u8; 0x100];
        match parse_spc(&bytes) {
            Err(ParseError::HeaderTooShort(_)) => {}
            other => panic!("expected HeaderTooShort, got {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_header_mark() {
        let mut bytes = synthetic_spc();
        bytes[OFF_HEADER_MARK + 1] = 0x00;
        assert!(matches!(parse_spc(&bytes), Err(ParseError::Other(_))));
    }

    #[test]
    fn id666_marker_gates_metadata() {
        let mut bytes = synthetic_spc();
        bytes[OFF_HAS_ID666] = HEADER_MARK;
        bytes[0x2E..0x2E + 4].copy_from_slice(b"Song");

        let snapshot = parse_spc(&bytes).unwrap();
        let id666 = snapshot.id666.expect("marker set, metadata expected");
        assert_eq!(id666.song_title.as_deref(), Some("Song"));
    }
}
