//! Utilities used by parsers: parse error type and byte readers/writers.
use std::fmt;

/// Error type returned by the parsing helpers in this module.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// An attempted read was outside the available buffer range.
    ///
    /// - `offset` is the index that was attempted to be accessed.
    /// - `needed` is the number of bytes required for the operation.
    /// - `available` is the current buffer length.
    /// - `context` is an optional string describing the logical location
    ///   (for example `"spc:ram"` or `"id666:artist"`) where the access
    ///   was attempted.
    OffsetOutOfRange {
        offset: usize,
        needed: usize,
        available: usize,
        context: Option<String>,
    },

    /// The leading file identifier did not match the expected ASCII string.
    ///
    /// The contained string is a lossy rendering of the bytes that were read.
    InvalidIdent(String),

    /// A header was shorter than the minimum required length.
    ///
    /// The contained `String` identifies which header or field was too short.
    HeaderTooShort(String),

    /// A generic error with a human-readable message.
    Other(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::OffsetOutOfRange {
                offset,
                needed,
                available,
                context,
            } => {
                if let Some(ctx) = context {
                    write!(
                        f,
                        "offset out of range at {}: 0x{:X} (needed {} bytes, available {})",
                        ctx, offset, needed, available
                    )
                } else {
                    write!(
                        f,
                        "offset out of range: 0x{:X} (needed {} bytes, available {})",
                        offset, needed, available
                    )
                }
            }
            ParseError::InvalidIdent(id) => write!(f, "invalid ident: {:?}", id),
            ParseError::HeaderTooShort(name) => write!(f, "header too short: {}", name),
            ParseError::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Read a 16-bit little-endian unsigned integer from `bytes` at `off`.
///
/// Returns `Ok(u16)` when the two bytes starting at `off` are available and
/// were successfully interpreted as a little-endian `u16`. Returns
/// `Err(ParseError::OffsetOutOfRange)` when the buffer is too short.
pub fn read_u16_le_at(bytes: &[u8], off: usize) -> Result<u16, ParseError> {
    if bytes.len() < off + 2 {
        return Err(ParseError::OffsetOutOfRange {
            offset: off,
            needed: 2,
            available: bytes.len(),
            context: None,
        });
    }
    let mut tmp: [u8; 2] = [0; 2];
    tmp.copy_from_slice(&bytes[off..off + 2]);
    Ok(u16::from_le_bytes(tmp))
}

/// Read a single byte from `bytes` at `off`.
///
/// Returns `Ok(u8)` when `off` is a valid index into `bytes`. Returns
/// `Err(ParseError::OffsetOutOfRange)` when `off` is out of bounds.
pub fn read_u8_at(bytes: &[u8], off: usize) -> Result<u8, ParseError> {
    if bytes.len() <= off {
        return Err(ParseError::OffsetOutOfRange {
            offset: off,
            needed: 1,
            available: bytes.len(),
            context: None,
        });
    }
    Ok(bytes[off])
}

/// Return a borrowed slice of length `len` starting at `off` from `bytes`.
///
/// Returns `Ok(&[u8])` that borrows from the input slice when the requested
/// range is within bounds. Returns `Err(ParseError::OffsetOutOfRange)` when the
/// requested range exceeds the available buffer.
pub fn read_slice(bytes: &[u8], off: usize, len: usize) -> Result<&[u8], ParseError> {
    if bytes.len() < off + len {
        return Err(ParseError::OffsetOutOfRange {
            offset: off,
            needed: len,
            // Report the remaining number of bytes from `off` to the end of the buffer.
            available: bytes.len().saturating_sub(off),
            context: Some("read_slice".into()),
        });
    }
    Ok(&bytes[off..off + len])
}

/// Read a fixed-width, nul/space-padded ASCII field from `bytes` at `off`.
///
/// The field ends at the first nul byte or at `len`, whichever comes first;
/// trailing padding is trimmed and non-ASCII bytes are decoded lossily.
/// Returns `Ok(None)` when the trimmed field is empty, and
/// `Err(ParseError::OffsetOutOfRange)` when the field exceeds the buffer.
pub fn read_padded_str(bytes: &[u8], off: usize, len: usize) -> Result<Option<String>, ParseError> {
    let raw = read_slice(bytes, off, len)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let s = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    Ok((!s.is_empty()).then_some(s))
}

/// Write a single byte `v` into `buf` at `off`.
///
/// This function writes `v` to `buf[off]`. It does not perform bounds
/// checking; callers must ensure `off` is a valid index.
pub fn write_u8(buf: &mut [u8], off: usize, v: u8) {
    buf[off] = v;
}

/// Copy the contents of `s` into `buf` starting at `off`.
///
/// This function copies `s.len()` bytes into `buf[off..off+s.len()]`. It does
/// not perform bounds checking; callers must ensure the destination range is
/// valid.
pub fn write_slice(buf: &mut [u8], off: usize, s: &[u8]) {
    buf[off..off + s.len()].copy_from_slice(s);
}
