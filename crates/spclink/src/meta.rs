//! ID666 metadata parsing utilities.
//!
//! This module provides the `Id666` struct and the parser for the text-format
//! ID666 tag block embedded in SPC files. The block lives at fixed offsets
//! inside the 0x100-byte file header: a sequence of fixed-width, nul/space
//! padded ASCII fields (song title, game title, dumper, comments, dump date,
//! play length, fade length, artist).
//!
//! Use `parse_id666(bytes)` with the full file buffer; field offsets are
//! absolute. The parser is tolerant: blank or padding-only fields become
//! `None`, non-ASCII bytes are decoded lossily, and numeric fields that do
//! not parse as decimal digits become `None` rather than an error.
use crate::binutil::{ParseError, read_padded_str, read_slice};

const OFF_SONG_TITLE: usize = 0x2E;
const OFF_GAME_TITLE: usize = 0x4E;
const OFF_DUMPER: usize = 0x6E;
const OFF_COMMENTS: usize = 0x7E;
const OFF_DUMP_DATE: usize = 0x9E;
const OFF_SECONDS: usize = 0xA9;
const OFF_FADE_MS: usize = 0xAC;
const OFF_ARTIST: usize = 0xB1;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Id666 {
    pub song_title: Option<String>,
    pub game_title: Option<String>,
    pub dumper: Option<String>,
    pub comments: Option<String>,
    pub dump_date: Option<String>,
    /// Play length before fade-out, in seconds.
    pub seconds: Option<u32>,
    /// Fade-out length in milliseconds.
    pub fade_ms: Option<u32>,
    pub artist: Option<String>,
}

/// Parse the text-format ID666 block from a full SPC file buffer.
/// Returns a populated `Id666` or a `ParseError` on a short buffer.
pub(crate) fn parse_id666(bytes: &[u8]) -> Result<Id666, ParseError> {
    Ok(Id666 {
        song_title: read_padded_str(bytes, OFF_SONG_TITLE, 32)?,
        game_title: read_padded_str(bytes, OFF_GAME_TITLE, 32)?,
        dumper: read_padded_str(bytes, OFF_DUMPER, 16)?,
        comments: read_padded_str(bytes, OFF_COMMENTS, 32)?,
        dump_date: read_padded_str(bytes, OFF_DUMP_DATE, 11)?,
        seconds: read_digits(bytes, OFF_SECONDS, 3)?,
        fade_ms: read_digits(bytes, OFF_FADE_MS, 5)?,
        artist: read_padded_str(bytes, OFF_ARTIST, 32)?,
    })
}

/// Read a fixed-width ASCII decimal field. Digits end at the first nul,
/// space, or non-digit byte; an empty digit run yields `None`.
fn read_digits(bytes: &[u8], off: usize, len: usize) -> Result<Option<u32>, ParseError> {
    let raw = read_slice(bytes, off, len)?;
    let mut value: u32 = 0;
    let mut seen = false;
    for &b in raw {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.wrapping_mul(10).wrapping_add((b - b'0') as u32);
        seen = true;
    }
    Ok(seen.then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with_header(fill: &[(usize, &[u8])]) -> Vec<u8> {
        let mut bytes = vec![0u8; 0x100];
        for (off, data) in fill {
            bytes[*off..*off + data.len()].copy_from_slice(data);
        }
        bytes
    }

    #[test]
    fn parses_padded_fields() {
        let bytes = file_with_header(&[
            (OFF_SONG_TITLE, b"Title Theme\0\0\0\0"),
            (OFF_GAME_TITLE, b"Some Game       "),
            (OFF_SECONDS, b"215"),
            (OFF_FADE_MS, b"10000"),
        ]);
        let id666 = parse_id666(&bytes).unwrap();
        assert_eq!(id666.song_title.as_deref(), Some("Title Theme"));
        assert_eq!(id666.game_title.as_deref(), Some("Some Game"));
        assert_eq!(id666.seconds, Some(215));
        assert_eq!(id666.fade_ms, Some(10000));
        assert_eq!(id666.artist, None);
    }

    #[test]
    fn blank_fields_are_none() {
        let bytes = file_with_header(&[]);
        let id666 = parse_id666(&bytes).unwrap();
        assert_eq!(id666, Id666::default());
    }

    #[test]
    fn short_buffer_is_an_error() {
        let bytes = vec![0u8; 0x40];
        assert!(parse_id666(&bytes).is_err());
    }
}
