//! Helpers shared by the integration tests
#![allow(dead_code)]

use vt3kr::error::{FramingResult, TransportResult};
use vt3kr::vt::codes::*;
use vt3kr::vt::message::*;
use vt3kr::vt::{VtConnection, VtIo};

#[path = "../../src/vt/message/host.rs"]
mod host;

pub use host::{HostRequest, TmReply};

/// Records everything the engine does to its collaborators
#[derive(Debug, Default)]
pub struct Capture {
    pub sent: Vec<Vec<u8>>,
    pub shown: Vec<u8>,
    pub input_lines: Vec<Vec<u8>>,
    pub output: Vec<Vec<u8>>,
}

impl VtIo for Capture {
    fn send_record(&mut self, record: &[u8]) -> TransportResult<()> {
        self.sent.push(record.to_vec());
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.shown.extend_from_slice(bytes);
    }

    fn log_input(&mut self, line: &[u8]) {
        self.input_lines.push(line.to_vec());
    }

    fn log_output(&mut self, data: &[u8], _block_mode: bool) {
        self.output.push(data.to_vec());
    }
}

impl Capture {
    pub fn clear(&mut self) {
        self.sent.clear();
        self.shown.clear();
        self.input_lines.clear();
        self.output.clear();
    }
}

pub const SUBSYS_BREAK: u8 = 0x19;

/// A typical AM negotiation: BS deletes with BS-SP-BS echo, CAN deletes the line,
/// both breaks enabled with ctl-Y as the subsystem break
pub fn am_request(buffer_size: u16) -> AmNegotiationRequest {
    AmNegotiationRequest {
        request_count: 1,
        os: 7,
        buffer_size,
        type_ahead_size: 0,
        echo: 0,
        echo_control: 0,
        char_delete: BS,
        char_delete_echo: ECHO_BS_SP_BS,
        line_delete: 0x18,
        no_break_read: 0,
        break_info: Some(BreakInfo {
            sys_enabled: true,
            subsys_enabled: true,
            sys_char: 0,
            subsys_char: SUBSYS_BREAK,
        }),
        break_index_count: 2,
        line_delete_echo: Some(b"!!!\r\n".to_vec()),
        am_max_receive_burst: 0,
        am_max_send_burst: 0,
    }
}

/// Connection through both negotiations, with the captured records cleared
pub fn open_connection() -> (VtConnection, Capture) {
    let mut conn = VtConnection::new(VT_MAX_BUFFER).with_identity(4242, "hp3k.example.com");
    let mut io = Capture::default();
    conn.begin_connect();
    conn.connected();
    conn.receive(&am_request(1024).encode(), &mut io).unwrap();
    conn.receive(&TmNegotiationReply { request_count: 1, response_code: 0 }.encode(), &mut io)
        .unwrap();
    assert!(conn.is_open());
    io.clear();
    (conn, io)
}

/// Deliver a read request for `length` bytes
pub fn post_read(conn: &mut VtConnection, io: &mut Capture, request_count: u16, length: u16, flags: u16) {
    let read = ReadRequest { request_count, flags, byte_count: length, timeout: 0 };
    conn.receive(&read.encode(), io).unwrap();
    assert!(conn.read_in_progress());
}

pub fn u16_at(record: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([record[offset], record[offset + 1]])
}

/// Fields of a Terminal I/O response: (request count, response code, completion mask, byte count, data)
pub fn io_response(record: &[u8]) -> (u16, u16, u16, u16, Vec<u8>) {
    assert_eq!(record[OFF_MESSAGE_TYPE], MSG_TERMINAL_IO_RESP);
    (
        u16_at(record, 6),
        u16_at(record, 8),
        u16_at(record, 10),
        u16_at(record, 12),
        record[14..].to_vec(),
    )
}
