use std::collections::VecDeque;

use spclink::image::{ComposeOptions, compose};
use spclink::link::frame::{IMAGE_BODY_START, Opcode, opcode_frame, raw_frame};
use spclink::link::{
    CHUNK_LEN, DspInitReason, LinkError, LinkState, MAX_TRANSACTION, ProtocolError, SpcLink,
    Transport, TransportError,
};
use spclink::spc::{RAM_LEN, Snapshot};

const OKAY: u8 = 0x01;
const FAIL: u8 = 0x02;
const BAD_CHECKSUM: u8 = 0x03;
const READY: u8 = 0x56;

/// In-memory transport with scripted responses. Records every physical
/// write transaction and enforces the driver's pacing contract: no
/// transaction may exceed the write ceiling, and every transaction must be
/// drained before the next is sent. An exhausted response script behaves
/// like a closed stream.
struct ScriptedTransport {
    responses: VecDeque<Result<u8, TransportError>>,
    transactions: Vec<Vec<u8>>,
    drains: usize,
    opened: bool,
}

impl ScriptedTransport {
    fn new(responses: impl IntoIterator<Item = Result<u8, TransportError>>) -> Self {
        ScriptedTransport {
            responses: responses.into_iter().collect(),
            transactions: Vec::new(),
            drains: 0,
            opened: false,
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.opened = true;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        assert!(self.opened, "send before open");
        assert!(
            bytes.len() <= MAX_TRANSACTION,
            "transaction of {} bytes exceeds the write ceiling",
            bytes.len()
        );
        assert_eq!(
            self.drains,
            self.transactions.len(),
            "previous transaction was not drained before the next send"
        );
        self.transactions.push(bytes.to_vec());
        Ok(())
    }

    fn drain(&mut self) -> Result<(), TransportError> {
        self.drains += 1;
        Ok(())
    }

    fn recv_byte(&mut self) -> Result<u8, TransportError> {
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Closed))
    }
}

fn okays(n: usize) -> impl Iterator<Item = Result<u8, TransportError>> {
    std::iter::repeat(Ok(OKAY)).take(n)
}

fn ready_then(rest: impl IntoIterator<Item = Result<u8, TransportError>>) -> ScriptedTransport {
    let mut responses = vec![Ok(READY)];
    responses.extend(rest);
    ScriptedTransport::new(responses)
}

#[test]
fn open_waits_for_ready() {
    let mut link = SpcLink::new(ScriptedTransport::new([Ok(READY)]));
    assert_eq!(link.state(), LinkState::Disconnected);
    link.open().unwrap();
    assert_eq!(link.state(), LinkState::Ready);
}

#[test]
fn open_rejects_non_ready_byte() {
    let mut link = SpcLink::new(ScriptedTransport::new([Ok(OKAY)]));
    assert_eq!(
        link.open(),
        Err(LinkError::Protocol(ProtocolError::UnexpectedByte(OKAY)))
    );
    assert_eq!(link.state(), LinkState::Faulted);
}

#[test]
fn open_surfaces_stream_error() {
    let mut link = SpcLink::new(ScriptedTransport::new([]));
    assert_eq!(
        link.open(),
        Err(LinkError::Transport(TransportError::Closed))
    );
}

#[test]
fn reset_sends_the_bare_opcode() {
    let mut link = SpcLink::new(ready_then([Ok(OKAY)]));
    link.open().unwrap();
    link.reset().unwrap();
    assert_eq!(link.state(), LinkState::Ready);

    let transport = link.into_transport();
    assert_eq!(transport.transactions, vec![vec![1u8]]);
}

#[test]
fn reset_rejection_faults_the_session() {
    let mut link = SpcLink::new(ready_then([Ok(FAIL)]));
    link.open().unwrap();
    assert_eq!(
        link.reset(),
        Err(LinkError::ResetFailed(ProtocolError::Fail))
    );
    assert_eq!(link.state(), LinkState::Faulted);
    assert!(matches!(link.reset(), Err(LinkError::BadState { .. })));
}

#[test]
fn closed_stream_mid_wait_rejects_with_transport_error() {
    // The reset frame goes out, then the stream dies before the
    // acknowledgement: the operation must reject, not hang.
    let mut link = SpcLink::new(ready_then([]));
    link.open().unwrap();
    assert_eq!(
        link.reset(),
        Err(LinkError::Transport(TransportError::Closed))
    );
    assert_eq!(link.state(), LinkState::Faulted);
}

#[test]
fn operations_require_an_open_ready_link() {
    let mut link = SpcLink::new(ScriptedTransport::new([]));
    assert!(matches!(link.reset(), Err(LinkError::BadState { .. })));
    assert!(matches!(
        link.play(0x8000, [0; 4]),
        Err(LinkError::BadState { .. })
    ));
}

#[test]
fn full_boot_sequence_is_byte_exact() {
    let set = compose(&Snapshot::new(), &ComposeOptions::default()).unwrap();

    // READY, then one OKAY per acknowledged frame: reset 1, dsp 2,
    // zero page 1, 510 chunks x 2, play 1.
    let mut link = SpcLink::new(ready_then(okays(1 + 2 + 1 + 510 * 2 + 1)));
    link.open().unwrap();
    link.boot(&set).unwrap();
    assert_eq!(link.state(), LinkState::Ready);

    let mut expected: Vec<u8> = vec![Opcode::Reset as u8];
    expected.extend(opcode_frame(Opcode::LoadDsp, &set.dsp_stub));
    expected.extend(raw_frame(&set.dsp_registers));
    expected.extend(opcode_frame(Opcode::BeginImage, &set.image[0x02..0xEF]));
    for address in (IMAGE_BODY_START..RAM_LEN).step_by(CHUNK_LEN) {
        expected.extend(opcode_frame(
            Opcode::ImageChunk,
            &[address as u8, (address >> 8) as u8, CHUNK_LEN as u8],
        ));
        expected.extend(raw_frame(&set.image[address..address + CHUNK_LEN]));
    }
    expected.extend(opcode_frame(
        Opcode::Play,
        &[
            set.boot_entry as u8,
            (set.boot_entry >> 8) as u8,
            set.port_values[0],
            set.port_values[1],
            set.port_values[2],
            set.port_values[3],
        ],
    ));

    let transport = link.into_transport();
    let actual: Vec<u8> = transport.transactions.concat();
    assert_eq!(actual, expected);

    // The 129-byte chunk bodies force slicing, so the ceiling is reached.
    let longest = transport.transactions.iter().map(Vec::len).max().unwrap();
    assert_eq!(longest, MAX_TRANSACTION);
}

#[test]
fn chunk_headers_cover_the_body_ascending() {
    let set = compose(&Snapshot::new(), &ComposeOptions::default()).unwrap();

    let mut link = SpcLink::new(ready_then(okays(1 + 2 + 1 + 510 * 2 + 1)));
    link.open().unwrap();
    link.boot(&set).unwrap();

    let transport = link.into_transport();
    // Chunk headers are the only 5-byte transactions on the wire.
    let headers: Vec<&Vec<u8>> = transport
        .transactions
        .iter()
        .filter(|t| t.len() == 5)
        .collect();
    assert_eq!(headers.len(), (RAM_LEN - IMAGE_BODY_START) / CHUNK_LEN);

    let mut expected_address = IMAGE_BODY_START;
    for header in headers {
        assert_eq!(header[0], Opcode::ImageChunk as u8);
        let address = header[1] as usize | (header[2] as usize) << 8;
        assert_eq!(address, expected_address);
        assert_eq!(header[3] as usize, CHUNK_LEN);
        // Checksum covers the three payload bytes.
        assert_eq!(
            header[4],
            header[1].wrapping_add(header[2]).wrapping_add(header[3])
        );
        expected_address += CHUNK_LEN;
    }
    // Non-overlapping 128-byte windows covering [0x100, 0x10000) exactly.
    assert_eq!(expected_address, RAM_LEN);
}

#[test]
fn bad_checksum_on_dsp_registers_stops_the_sequence() {
    let set = compose(&Snapshot::new(), &ComposeOptions::default()).unwrap();

    // Reset OKAY, stub OKAY, then the register bank is rejected.
    let mut link = SpcLink::new(ready_then([Ok(OKAY), Ok(OKAY), Ok(BAD_CHECKSUM)]));
    link.open().unwrap();
    link.reset().unwrap();
    assert_eq!(
        link.load_dsp_state(&set.dsp_stub, &set.dsp_registers),
        Err(LinkError::DspInitFailed {
            reason: DspInitReason::BadChecksum
        })
    );
    assert_eq!(link.state(), LinkState::Faulted);
    assert!(matches!(
        link.load_image(&set.image),
        Err(LinkError::BadState { .. })
    ));

    // reset (1) + stub frame (1) + register bank (3 slices); nothing after.
    let transport = link.into_transport();
    assert_eq!(transport.transactions.len(), 5);
}

#[test]
fn dsp_stub_rejection_reads_as_unknown() {
    let set = compose(&Snapshot::new(), &ComposeOptions::default()).unwrap();

    let mut link = SpcLink::new(ready_then([Ok(FAIL)]));
    link.open().unwrap();
    assert_eq!(
        link.load_dsp_state(&set.dsp_stub, &set.dsp_registers),
        Err(LinkError::DspInitFailed {
            reason: DspInitReason::Unknown
        })
    );
}

#[test]
fn chunk_failure_reports_the_offending_address() {
    let set = compose(&Snapshot::new(), &ComposeOptions::default()).unwrap();

    // OKAY through reset, dsp, zero page, ten full chunks; the eleventh
    // chunk header is rejected.
    let mut link = SpcLink::new(ready_then(okays(1 + 2 + 1 + 10 * 2).chain([Ok(FAIL)])));
    link.open().unwrap();
    assert_eq!(
        link.boot(&set),
        Err(LinkError::ImageLoadFailed {
            address: (IMAGE_BODY_START + 10 * CHUNK_LEN) as u16,
            reason: ProtocolError::Fail,
        })
    );
    assert_eq!(link.state(), LinkState::Faulted);

    // The load aborted: the last transaction on the wire is the rejected
    // header, and no play frame was sent.
    let transport = link.into_transport();
    let last = transport.transactions.last().unwrap();
    assert_eq!(last.len(), 5);
    assert_eq!(last[0], Opcode::ImageChunk as u8);
}
