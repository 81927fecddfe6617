//! Wire framing: command opcodes, response codes, and the modulo-256
//! checksum appended to every payload-carrying frame.
//!
//! Frame shapes (byte-exact):
//!
//! | Frame             | Bytes                                                |
//! |-------------------|------------------------------------------------------|
//! | Reset             | `[1]`                                                |
//! | Load-DSP          | `[2, stub..., ck]` then `[dsp(128), ck]`             |
//! | Begin-image-load  | `[3, zeroPage(237), ck]`                             |
//! | Image chunk header| `[4, addrLow, addrHigh, len, ck]`                    |
//! | Image chunk body  | `[chunk(<=128), ck]`                                 |
//! | Play              | `[5, entryLow, entryHigh, p0, p1, p2, p3, ck]`       |
//!
//! The checksum covers the frame's payload bytes only — the opcode, when
//! present, is excluded.

/// Maximum bytes per physical write transaction. Larger frames are split
/// into slices of at most this size, each drained before the next is sent.
pub const MAX_TRANSACTION: usize = 64;

/// Image body chunk size in bytes.
pub const CHUNK_LEN: usize = 128;

/// First address of the image body phase; below it sit the I/O ports,
/// zero page and stack page handled by the zero-page phase.
pub const IMAGE_BODY_START: usize = 0x100;

/// Zero-page phase extraction range: image bytes `[2, 0xEF)`, skipping the
/// two I/O scratch bytes and the reserved bytes below the stack page.
pub const ZERO_PAGE_START: usize = 0x02;
pub const ZERO_PAGE_END: usize = 0xEF;

/// Command opcodes, one per frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Reset = 1,
    LoadDsp = 2,
    BeginImage = 3,
    ImageChunk = 4,
    Play = 5,
}

/// Single-byte response codes read from the device after each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Okay,        // 0x01
    Fail,        // 0x02
    BadChecksum, // 0x03
    Ready,       // 0x56
}

impl Response {
    /// Decode a response byte; `None` for anything the device never sends.
    pub fn from_byte(byte: u8) -> Option<Response> {
        match byte {
            0x01 => Some(Response::Okay),
            0x02 => Some(Response::Fail),
            0x03 => Some(Response::BadChecksum),
            0x56 => Some(Response::Ready),
            _ => None,
        }
    }
}

/// Sum of `payload` modulo 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build `[opcode, payload..., checksum(payload)]`.
pub fn opcode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(opcode as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

/// Build `[payload..., checksum(payload)]` for opcode-less frames (the DSP
/// register bank and image chunk bodies; the device is already primed for
/// the payload).
pub fn raw_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sum_mod_256() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 0x06);
        assert_eq!(checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(checksum(&[0x80, 0x80, 0x80]), 0x80);
    }

    #[test]
    fn checksum_over_appended_checksum_doubles() {
        // Recomputing over payload + [ck] yields (2 * ck) mod 256, a fixed
        // relation usable to validate framing.
        for payload in [&[0x12u8, 0x34, 0x56][..], &[0xF0, 0xF0][..], &[][..]] {
            let ck = checksum(payload);
            let framed = raw_frame(payload);
            assert_eq!(checksum(&framed), ck.wrapping_mul(2));
        }
    }

    #[test]
    fn opcode_is_excluded_from_checksum() {
        let frame = opcode_frame(Opcode::Play, &[0x10, 0x20]);
        assert_eq!(frame, vec![5, 0x10, 0x20, 0x30]);
    }

    #[test]
    fn response_decoding() {
        assert_eq!(Response::from_byte(0x01), Some(Response::Okay));
        assert_eq!(Response::from_byte(0x02), Some(Response::Fail));
        assert_eq!(Response::from_byte(0x03), Some(Response::BadChecksum));
        assert_eq!(Response::from_byte(86), Some(Response::Ready));
        assert_eq!(Response::from_byte(0x00), None);
        assert_eq!(Response::from_byte(0x57), None);
    }
}
