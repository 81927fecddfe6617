use spclink::spc::{DSP_LEN, RAM_LEN, Snapshot};

const IDENT: &[u8; 33] = b"SNES-SPC700 Sound File Data v0.30";

/// Build a well-formed SPC byte buffer through the public file layout.
fn spc_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x100 + RAM_LEN + DSP_LEN];
    bytes[..IDENT.len()].copy_from_slice(IDENT);
    bytes[0x21] = 0x1A;
    bytes[0x22] = 0x1A;
    bytes[0x23] = 0x1A; // ID666 present
    bytes[0x25] = 0x00; // PC low
    bytes[0x26] = 0x04; // PC high
    bytes[0x27] = 0x42; // A
    bytes[0x2B] = 0xEF; // SP
    bytes[0x2E..0x2E + 5].copy_from_slice(b"Intro"); // song title
    bytes[0xB1..0xB1 + 8].copy_from_slice(b"Somebody"); // artist
    bytes
}

#[test]
fn parses_via_try_from() {
    let mut bytes = spc_bytes();
    bytes[0x100 + 0xF4] = 0x12; // captured port 0
    bytes[0x100 + RAM_LEN + 0x6D] = 0x3E; // echo start page

    let snapshot = Snapshot::try_from(bytes.as_slice()).unwrap();
    assert_eq!(snapshot.pc, 0x0400);
    assert_eq!(snapshot.a, 0x42);
    assert_eq!(snapshot.sp, 0xEF);
    assert_eq!(snapshot.ram[0xF4], 0x12);
    assert_eq!(snapshot.dsp[0x6D], 0x3E);
    assert_eq!(snapshot.port_values(), [0x12, 0, 0, 0]);

    let id666 = snapshot.id666.expect("metadata marker set");
    assert_eq!(id666.song_title.as_deref(), Some("Intro"));
    assert_eq!(id666.artist.as_deref(), Some("Somebody"));
}

#[test]
fn descriptive_error_on_malformed_input() {
    let mut bytes = spc_bytes();
    bytes[0x05] = b'?';

    let err = Snapshot::try_from(bytes.as_slice()).unwrap_err();
    assert!(err.to_string().contains("invalid ident"));
}
