//! VT record parsing and serialization
//!
//! Every record starts with the six byte header described in
//! [`codes`](super::codes). Incoming records are read through
//! [`RecordReader`], which bounds-checks each field so a short or lying
//! record becomes a [`FramingError`] instead of an out-of-range access.
//! Outgoing records are built with [`RecordWriter`], which patches the length
//! word when the record is finished.
//!
//! The typed message structs below are never mutated after parsing; the
//! connection reads what it needs from them and builds fresh replies.

use crate::error::{FramingError, FramingResult, ProtocolViolation, VtError, VtResult};

use super::codes::*;

#[cfg(test)]
pub(crate) mod host;

/// Bounds-checked view over one complete record
#[derive(Debug, Clone, Copy)]
pub struct RecordReader<'a> {
    record: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'a [u8]) -> Self {
        Self { record }
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn u8_at(&self, offset: usize, field: &'static str) -> FramingResult<u8> {
        self.record.get(offset).copied().ok_or(FramingError::Truncated {
            field,
            needed: offset + 1,
            record_len: self.record.len(),
        })
    }

    pub fn u16_at(&self, offset: usize, field: &'static str) -> FramingResult<u16> {
        let bytes = self.fixed(offset, 2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32_at(&self, offset: usize, field: &'static str) -> FramingResult<u32> {
        let bytes = self.fixed(offset, 4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Fixed-position field
    fn fixed(&self, offset: usize, length: usize, field: &'static str) -> FramingResult<&'a [u8]> {
        self.record
            .get(offset..offset + length)
            .ok_or(FramingError::Truncated {
                field,
                needed: offset + length,
                record_len: self.record.len(),
            })
    }

    /// Offset-addressed sub-structure whose position comes from the record itself
    pub fn slice(&self, offset: usize, length: usize, field: &'static str) -> FramingResult<&'a [u8]> {
        offset
            .checked_add(length)
            .and_then(|end| self.record.get(offset..end))
            .ok_or(FramingError::SubstructureOutOfBounds {
                field,
                offset,
                length,
                record_len: self.record.len(),
            })
    }

    /// Parse and validate the fixed header
    pub fn header(&self) -> FramingResult<Header> {
        if self.record.len() < HEADER_LEN {
            return Err(FramingError::Truncated {
                field: "header",
                needed: HEADER_LEN,
                record_len: self.record.len(),
            });
        }
        let protocol = self.record[OFF_PROTOCOL];
        if protocol != PROTOCOL_ID {
            return Err(FramingError::BadProtocolId { id: protocol });
        }
        Ok(Header {
            length: u16::from_be_bytes([self.record[OFF_LENGTH], self.record[OFF_LENGTH + 1]]),
            message_type: self.record[OFF_MESSAGE_TYPE],
            primitive: self.record[OFF_PRIMITIVE],
            reserved: self.record[OFF_RESERVED],
        })
    }
}

/// Builder for outgoing records
#[derive(Debug, Clone)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new(message_type: u8, primitive: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&[0, 0, PROTOCOL_ID, message_type, primitive, 0]);
        Self { buf }
    }

    pub fn reserved(mut self, value: u8) -> Self {
        self.buf[OFF_RESERVED] = value;
        self
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Zero padding up to an absolute offset
    pub fn pad_to(mut self, offset: usize) -> Self {
        if self.buf.len() < offset {
            self.buf.resize(offset, 0);
        }
        self
    }

    /// Patch the length word and return the record
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u16;
        self.buf[OFF_LENGTH..OFF_LENGTH + 2].copy_from_slice(&len.to_be_bytes());
        self.buf
    }
}

/// Fixed record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: u16,
    pub message_type: u8,
    pub primitive: u8,
    pub reserved: u8,
}

/// Break enablement and characters offered by the AM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakInfo {
    pub sys_enabled: bool,
    pub subsys_enabled: bool,
    pub sys_char: u8,
    pub subsys_char: u8,
}

/// AM Negotiation Request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AmNegotiationRequest {
    pub request_count: u16,
    pub os: u16,
    pub buffer_size: u16,
    pub type_ahead_size: u16,
    pub echo: u8,
    pub echo_control: u8,
    pub char_delete: u8,
    pub char_delete_echo: u8,
    pub line_delete: u8,
    pub no_break_read: u8,
    pub break_info: Option<BreakInfo>,
    pub break_index_count: u16,
    /// Line-delete echo bytes, already capped at [`MAX_LINE_DELETE_ECHO`]
    pub line_delete_echo: Option<Vec<u8>>,
    pub am_max_receive_burst: u16,
    pub am_max_send_burst: u16,
}

impl AmNegotiationRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use am_negotiate as f;

        let break_offset = r.u16_at(f::BREAK_OFFSET, "break offset")? as usize;
        let break_info = if break_offset != 0 {
            let b = r.slice(break_offset, f::BREAK_LEN, "break information")?;
            Some(BreakInfo {
                sys_enabled: b[f::BREAK_SYS_ENABLED] != 0,
                subsys_enabled: b[f::BREAK_SUBSYS_ENABLED] != 0,
                sys_char: b[f::BREAK_SYS_CHAR + 1],
                subsys_char: b[f::BREAK_SUBSYS_CHAR + 1],
            })
        } else {
            None
        };

        let echo_offset = r.u16_at(f::LINE_DELETE_ECHO_OFFSET, "line delete echo offset")? as usize;
        let echo_length = r.u16_at(f::LINE_DELETE_ECHO_LENGTH, "line delete echo length")? as usize;
        let line_delete_echo = if echo_offset != 0 && echo_length != 0 {
            let capped = echo_length.min(MAX_LINE_DELETE_ECHO);
            Some(r.slice(echo_offset, capped, "line delete echo")?.to_vec())
        } else {
            None
        };

        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            os: r.u16_at(f::OS, "operating system")?,
            buffer_size: r.u16_at(f::BUFFER_SIZE, "buffer size")?,
            type_ahead_size: r.u16_at(f::TYPE_AHEAD_SIZE, "type-ahead size")?,
            echo: r.u8_at(f::ECHO, "echo")?,
            echo_control: r.u8_at(f::ECHO_CONTROL, "echo control")?,
            char_delete: r.u8_at(f::CHAR_DELETE, "character delete")?,
            char_delete_echo: r.u8_at(f::CHAR_DELETE_ECHO, "character delete echo")?,
            line_delete: r.u8_at(f::LINE_DELETE, "line delete")?,
            no_break_read: r.u8_at(f::NO_BREAK_READ, "no break read")?,
            break_info,
            break_index_count: r.u16_at(f::BREAK_INDEX_COUNT, "break index count")?,
            line_delete_echo,
            am_max_receive_burst: r.u16_at(f::MAX_RECEIVE_BURST, "AM max receive burst")?,
            am_max_send_burst: r.u16_at(f::MAX_SEND_BURST, "AM max send burst")?,
        })
    }
}

/// AM Negotiation Response sent by the TM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmNegotiationResponse {
    pub request_count: u16,
    pub buffer_size: u16,
    pub tm_max_receive_burst: u16,
    pub tm_max_send_burst: u16,
}

impl AmNegotiationResponse {
    pub fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_ENV_CNTL_RESP, PRIM_AM_NEGOTIATE)
            .u16(self.request_count)
            .u16(RESP_SUCCESSFUL)
            .u16(COMP_SUCCESSFUL)
            .u16(self.buffer_size)
            .bytes(&VERSION_MASK)
            .u16(OS_TYPE)
            .u16(HW_COMP_PARITY)
            .u16(self.tm_max_receive_burst)
            .u16(self.tm_max_send_burst)
            .finish()
    }
}

/// TM Negotiation Request sent once the AM has negotiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmNegotiationRequest {
    pub request_count: u16,
    pub session_id: [u8; SESSION_ID_LEN],
    pub node_name: Vec<u8>,
}

impl TmNegotiationRequest {
    /// Session id is the process id, zero padded to the field width.
    /// The node name is truncated to its field.
    pub fn new(request_count: u16, pid: u32, node_name: &str) -> Self {
        let digits = format!("{:0width$}", pid, width = SESSION_ID_LEN);
        let mut session_id = [b'0'; SESSION_ID_LEN];
        let src = digits.as_bytes();
        let start = src.len().saturating_sub(SESSION_ID_LEN);
        session_id.copy_from_slice(&src[start..]);
        let mut node = node_name.as_bytes().to_vec();
        node.truncate(NODE_NAME_LEN);
        Self { request_count, session_id, node_name: node }
    }

    pub fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_ENV_CNTL_REQ, PRIM_TM_NEGOTIATE)
            .u16(self.request_count)
            .u8(LINK_TYPE_NETWORK)
            .u8(0)
            .u16(TERMINAL_CLASS)
            .bytes(&self.session_id)
            .u16(self.node_name.len() as u16)
            .bytes(&self.node_name)
            .pad_to(tm_negotiate::LEN)
            .finish()
    }
}

/// TM Negotiation Reply from the AM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmNegotiationReply {
    pub request_count: u16,
    pub response_code: u16,
}

impl TmNegotiationReply {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        Ok(Self {
            request_count: r.u16_at(tm_negotiate::REQUEST_COUNT, "request count")?,
            response_code: r.u16_at(tm_negotiate::RESPONSE_CODE, "response code")?,
        })
    }
}

/// Read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub request_count: u16,
    pub flags: u16,
    pub byte_count: u16,
    /// Seconds; zero means no timeout
    pub timeout: u16,
}

impl ReadRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use terminal_io as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            flags: r.u16_at(f::FLAGS, "read flags")?,
            byte_count: r.u16_at(f::BYTE_COUNT, "read byte count")?,
            timeout: r.u16_at(f::TIMEOUT, "read timeout")?,
        })
    }
}

/// Write request; `data` borrows the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest<'a> {
    pub request_count: u16,
    pub flags: u16,
    pub data: &'a [u8],
}

impl<'a> WriteRequest<'a> {
    pub fn parse(r: &RecordReader<'a>) -> FramingResult<Self> {
        use terminal_io as f;
        let byte_count = r.u16_at(f::BYTE_COUNT, "write byte count")? as usize;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            flags: r.u16_at(f::FLAGS, "write flags")?,
            data: r.slice(f::WRITE_DATA, byte_count, "write data")?,
        })
    }
}

/// Abort request. The flags word carries the request count of the read being aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortRequest {
    pub request_count: u16,
    pub read_request_count: u16,
}

impl AbortRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use terminal_io as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            read_request_count: r.u16_at(f::FLAGS, "aborted read request count")?,
        })
    }
}

/// Terminal I/O response as sent by the TM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoResponse {
    pub primitive: u8,
    pub request_count: u16,
    pub response_code: u16,
    pub completion_mask: u16,
    pub data: Vec<u8>,
}

impl IoResponse {
    pub fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_IO_RESP, self.primitive)
            .u16(self.request_count)
            .u16(self.response_code)
            .u16(self.completion_mask)
            .u16(self.data.len() as u16)
            .bytes(&self.data)
            .finish()
    }

    /// Abort acknowledgement: request count and response code only
    pub fn encode_abort_ack(request_count: u16) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_IO_RESP, PRIM_ABORT)
            .u16(request_count)
            .u16(RESP_SUCCESSFUL)
            .finish()
    }
}

/// Set break request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBreakRequest {
    pub request_count: u16,
    pub index: u8,
    pub enable: bool,
}

impl SetBreakRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use terminal_cntl as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            index: r.u8_at(f::BREAK_INDEX, "break index")?,
            enable: r.u8_at(f::BREAK_STATE, "break state")? != 0,
        })
    }
}

/// Set driver information request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverControlRequest {
    pub request_count: u16,
    pub request_mask: u16,
    pub echo: u8,
    pub edit_mode: u8,
    pub driver_mode: u8,
    pub term_char: u8,
    pub echo_line_delete: u8,
}

impl DriverControlRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use terminal_cntl as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            request_mask: r.u16_at(f::REQUEST_MASK, "request mask")?,
            echo: r.u8_at(f::ECHO, "echo")?,
            edit_mode: r.u8_at(f::EDIT_MODE, "edit mode")?,
            driver_mode: r.u8_at(f::DRIVER_MODE, "driver mode")?,
            term_char: r.u8_at(f::TERM_CHAR, "terminator character")?,
            echo_line_delete: r.u8_at(f::ECHO_LINE_DELETE, "echo line delete")?,
        })
    }
}

/// MPE control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpeControlRequest {
    pub request_count: u16,
    pub request_mask: u16,
    pub term_type: u8,
    pub type_ahead: u8,
}

impl MpeControlRequest {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use mpe_cntl as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            request_mask: r.u16_at(f::REQUEST_MASK, "request mask")?,
            term_type: r.u8_at(f::TERM_TYPE, "terminal type")?,
            type_ahead: r.u8_at(f::TYPE_AHEAD, "type-ahead")?,
        })
    }
}

/// Generic FDC request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdcRequest<'a> {
    pub request_count: u16,
    pub function: u32,
    pub buffer: &'a [u8],
}

impl<'a> FdcRequest<'a> {
    pub fn parse(r: &RecordReader<'a>) -> FramingResult<Self> {
        use generic_fdc as f;
        let length = r.u16_at(f::LENGTH, "FDC length")? as usize;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            function: r.u32_at(f::FUNCTION, "FDC function")?,
            buffer: r.slice(f::BUFFER, length, "FDC buffer")?,
        })
    }
}

/// Request or response carrying only a request count and an optional code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleMessage {
    pub message_type: u8,
    pub primitive: u8,
    pub request_count: u16,
    pub code: Option<u16>,
}

impl SimpleMessage {
    pub fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        let header = r.header()?;
        let code = if r.len() >= env_cntl::RESP_LEN {
            Some(r.u16_at(env_cntl::CODE, "response code")?)
        } else {
            None
        };
        Ok(Self {
            message_type: header.message_type,
            primitive: header.primitive,
            request_count: r.u16_at(env_cntl::REQUEST_COUNT, "request count")?,
            code,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let w = RecordWriter::new(self.message_type, self.primitive).u16(self.request_count);
        match self.code {
            Some(code) => w.u16(code).finish(),
            None => w.finish(),
        }
    }
}

/// Application control request carrying a break index
pub fn encode_break(request_count: u16, index: u16) -> Vec<u8> {
    RecordWriter::new(MSG_APPL_CNTL_REQ, PRIM_INVOKE_BREAK)
        .reserved(APPL_CNTL_RESERVED)
        .u16(request_count)
        .u16(index)
        .finish()
}

/// A decoded record the TM acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    AmNegotiation(AmNegotiationRequest),
    TmNegotiationReply(TmNegotiationReply),
    TerminateRequest { request_count: u16 },
    TerminateResponse,
    LogonInfoRequest { request_count: u16 },
    Read(ReadRequest),
    Write(WriteRequest<'a>),
    Abort(AbortRequest),
    SetBreak(SetBreakRequest),
    DriverControl(DriverControlRequest),
    MpeControl(MpeControlRequest),
    GenericFdc(FdcRequest<'a>),
    /// Records the TM accepts and does nothing with
    Ignored,
}

impl Inbound<'_> {
    /// True for terminal I/O and terminal control requests, which need an open connection
    pub fn requires_open(&self) -> bool {
        matches!(
            self,
            Inbound::Read(_)
                | Inbound::Write(_)
                | Inbound::Abort(_)
                | Inbound::SetBreak(_)
                | Inbound::DriverControl(_)
        )
    }
}

/// Decode one complete record against the TM dispatch table
pub fn decode(record: &[u8]) -> VtResult<Inbound<'_>> {
    let r = RecordReader::new(record);
    let header = r.header()?;
    let (mt, prim) = (header.message_type, header.primitive);

    let inbound = match mt {
        MSG_ENV_CNTL_REQ => match prim {
            PRIM_AM_NEGOTIATE => Inbound::AmNegotiation(AmNegotiationRequest::parse(&r)?),
            PRIM_TERMINATE => Inbound::TerminateRequest {
                request_count: r.u16_at(env_cntl::REQUEST_COUNT, "request count")?,
            },
            PRIM_LOGON_INFO => Inbound::LogonInfoRequest {
                request_count: r.u16_at(env_cntl::REQUEST_COUNT, "request count")?,
            },
            _ => return Err(violation(ProtocolViolation::InvalidControlPrimitive { message_type: mt, primitive: prim })),
        },
        MSG_ENV_CNTL_RESP => match prim {
            PRIM_TM_NEGOTIATE => Inbound::TmNegotiationReply(TmNegotiationReply::parse(&r)?),
            PRIM_TERMINATE => Inbound::TerminateResponse,
            PRIM_LOGON_INFO => Inbound::Ignored,
            _ => return Err(violation(ProtocolViolation::InvalidControlPrimitive { message_type: mt, primitive: prim })),
        },
        MSG_TERMINAL_IO_REQ => match prim {
            PRIM_READ => Inbound::Read(ReadRequest::parse(&r)?),
            PRIM_WRITE => Inbound::Write(WriteRequest::parse(&r)?),
            PRIM_ABORT => Inbound::Abort(AbortRequest::parse(&r)?),
            _ => return Err(violation(ProtocolViolation::InvalidIoPrimitive { message_type: mt, primitive: prim })),
        },
        MSG_TERMINAL_IO_RESP => return Err(violation(ProtocolViolation::UnexpectedIoResponse)),
        MSG_TERMINAL_CNTL_REQ => match prim {
            PRIM_SET_BREAK => Inbound::SetBreak(SetBreakRequest::parse(&r)?),
            PRIM_SET_DRIVER_INFO => Inbound::DriverControl(DriverControlRequest::parse(&r)?),
            _ => return Err(violation(ProtocolViolation::InvalidIoPrimitive { message_type: mt, primitive: prim })),
        },
        MSG_TERMINAL_CNTL_RESP => return Err(violation(ProtocolViolation::UnexpectedControlResponse)),
        MSG_APPL_CNTL_REQ => return Err(violation(ProtocolViolation::UnexpectedApplicationRequest)),
        MSG_APPL_CNTL_RESP => Inbound::Ignored,
        MSG_MPE_CNTL_REQ => Inbound::MpeControl(MpeControlRequest::parse(&r)?),
        MSG_GENERIC_FDC_REQ => Inbound::GenericFdc(FdcRequest::parse(&r)?),
        _ => return Err(violation(ProtocolViolation::InvalidMessageType { message_type: mt })),
    };
    Ok(inbound)
}

fn violation(v: ProtocolViolation) -> VtError {
    VtError::Protocol(v)
}
