//! The host's side of the wire
//!
//! Encoders for the records an AM sends and parsers for the records the TM
//! answers with. Tests and benches stand in for the host with these; the
//! engine itself never needs them.

use super::*;

/// A record the host sends to the TM
pub trait HostRequest {
    fn encode(&self) -> Vec<u8>;
}

/// A record the TM sends back to the host
pub trait TmReply: Sized {
    fn parse(r: &RecordReader<'_>) -> FramingResult<Self>;
}

impl HostRequest for AmNegotiationRequest {
    /// Break information and line-delete echo bytes follow the fixed part
    fn encode(&self) -> Vec<u8> {
        use am_negotiate as f;

        let mut tail = Vec::new();
        let mut break_offset = 0u16;
        if let Some(b) = &self.break_info {
            break_offset = (f::LEN + tail.len()) as u16;
            tail.extend_from_slice(&[
                b.sys_enabled as u8,
                b.subsys_enabled as u8,
                0,
                b.sys_char,
                0,
                b.subsys_char,
            ]);
        }
        let (mut echo_offset, mut echo_length) = (0u16, 0u16);
        if let Some(echo) = &self.line_delete_echo {
            echo_offset = (f::LEN + tail.len()) as u16;
            echo_length = echo.len() as u16;
            tail.extend_from_slice(echo);
        }

        RecordWriter::new(MSG_ENV_CNTL_REQ, PRIM_AM_NEGOTIATE)
            .u16(self.request_count)
            .u16(self.os)
            .u16(self.buffer_size)
            .u16(self.type_ahead_size)
            .u8(self.echo)
            .u8(self.echo_control)
            .u8(self.char_delete)
            .u8(self.char_delete_echo)
            .u8(self.line_delete)
            .u8(self.no_break_read)
            .u16(break_offset)
            .u16(self.break_index_count)
            .u16(0)
            .u16(0)
            .u16(0)
            .u16(0)
            .u16(echo_offset)
            .u16(echo_length)
            .u16(self.am_max_receive_burst)
            .u16(self.am_max_send_burst)
            .bytes(&tail)
            .finish()
    }
}

impl HostRequest for TmNegotiationReply {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_ENV_CNTL_RESP, PRIM_TM_NEGOTIATE)
            .u16(self.request_count)
            .u16(self.response_code)
            .finish()
    }
}

impl HostRequest for ReadRequest {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_IO_REQ, PRIM_READ)
            .u16(self.request_count)
            .u16(self.flags)
            .u16(self.byte_count)
            .u16(self.timeout)
            .finish()
    }
}

impl HostRequest for WriteRequest<'_> {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_IO_REQ, PRIM_WRITE)
            .u16(self.request_count)
            .u16(self.flags)
            .u16(self.data.len() as u16)
            .bytes(self.data)
            .finish()
    }
}

impl HostRequest for AbortRequest {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_IO_REQ, PRIM_ABORT)
            .u16(self.request_count)
            .u16(self.read_request_count)
            .u16(0)
            .finish()
    }
}

impl HostRequest for SetBreakRequest {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_CNTL_REQ, PRIM_SET_BREAK)
            .u16(self.request_count)
            .u8(self.index)
            .u8(self.enable as u8)
            .finish()
    }
}

impl HostRequest for DriverControlRequest {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_TERMINAL_CNTL_REQ, PRIM_SET_DRIVER_INFO)
            .u16(self.request_count)
            .u16(self.request_mask)
            .u8(self.echo)
            .u8(self.edit_mode)
            .u8(self.driver_mode)
            .u8(self.term_char)
            .u8(self.echo_line_delete)
            .finish()
    }
}

impl HostRequest for MpeControlRequest {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_MPE_CNTL_REQ, PRIM_MPE_CONTROL)
            .u16(self.request_count)
            .u16(self.request_mask)
            .u8(self.term_type)
            .u8(self.type_ahead)
            .finish()
    }
}

impl HostRequest for FdcRequest<'_> {
    fn encode(&self) -> Vec<u8> {
        RecordWriter::new(MSG_GENERIC_FDC_REQ, PRIM_FDC_DEVICE_SET)
            .u16(self.request_count)
            .u32(self.function)
            .u16(self.buffer.len() as u16)
            .bytes(self.buffer)
            .finish()
    }
}

impl TmReply for AmNegotiationResponse {
    fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use am_negotiate_resp as f;
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            buffer_size: r.u16_at(f::BUFFER_SIZE, "buffer size")?,
            tm_max_receive_burst: r.u16_at(f::MAX_RECEIVE_BURST, "TM max receive burst")?,
            tm_max_send_burst: r.u16_at(f::MAX_SEND_BURST, "TM max send burst")?,
        })
    }
}

impl TmReply for TmNegotiationRequest {
    fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use tm_negotiate as f;
        let mut session_id = [0u8; SESSION_ID_LEN];
        session_id.copy_from_slice(r.slice(f::SESSION_ID, SESSION_ID_LEN, "session id")?);
        let node_len = (r.u16_at(f::NODE_LENGTH, "node length")? as usize).min(NODE_NAME_LEN);
        Ok(Self {
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            session_id,
            node_name: r.slice(f::NODE_NAME, node_len, "node name")?.to_vec(),
        })
    }
}

impl TmReply for IoResponse {
    fn parse(r: &RecordReader<'_>) -> FramingResult<Self> {
        use terminal_io as f;
        let header = r.header()?;
        let response_code = r.u16_at(f::RESPONSE_CODE, "response code")?;
        if header.primitive == PRIM_ABORT && r.len() == f::ABORT_RESP_LEN {
            return Ok(Self {
                primitive: header.primitive,
                request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
                response_code,
                completion_mask: 0,
                data: Vec::new(),
            });
        }
        let bytes_read = r.u16_at(f::BYTES_READ, "bytes read")? as usize;
        Ok(Self {
            primitive: header.primitive,
            request_count: r.u16_at(f::REQUEST_COUNT, "request count")?,
            response_code,
            completion_mask: r.u16_at(f::COMPLETION_MASK, "completion mask")?,
            data: r.slice(f::RESP_DATA, bytes_read, "read data")?.to_vec(),
        })
    }
}
