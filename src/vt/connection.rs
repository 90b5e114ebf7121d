//! VT protocol engine for the Terminal Manager side of a connection
//!
//! A [`VtConnection`] owns everything that is per connection and independent
//! of the transport: the protocol state, the settings the Access Manager
//! negotiated, the outstanding read, the reassembly cursor and the request
//! counters. Bytes from the transport are fed in with [`VtConnection::feed`]
//! or [`VtConnection::receive`]; records going out, display output and input
//! line logging go through the [`VtIo`] collaborator, so the engine itself
//! never touches a socket or a terminal.
//!
//! State only moves forward:
//!
//! ```text
//! Closed -> Connecting -> WaitingForAmNegotiation -> WaitingForTmNegotiationReply -> Open -> Shutdown
//! ```
//!
//! A renegotiation after `Open` is answered but does not change the state.

use log::{debug, info, warn};

use crate::error::{NegotiationError, ProtocolViolation, TransportResult, VtError, VtResult};
use crate::session_log::hex_dump;
use crate::translation::TranslationTable;

use super::codes::*;
use super::framing::RecordAssembler;
use super::message::{
    self, encode_break, AbortRequest, AmNegotiationRequest, AmNegotiationResponse,
    DriverControlRequest, FdcRequest, Inbound, IoResponse, MpeControlRequest, ReadRequest,
    RecordWriter, SetBreakRequest, SimpleMessage, TmNegotiationReply, TmNegotiationRequest,
    WriteRequest,
};

/// Protocol state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Closed,
    Connecting,
    WaitingForAmNegotiation,
    WaitingForTmNegotiationReply,
    Open,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    Vanilla,
    Block,
}

/// Line editing and break behavior negotiated with the AM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSettings {
    pub echo: u8,
    /// False when the AM asked for local echo to be suppressed
    pub echo_enabled: bool,
    pub char_delete: u8,
    pub char_delete_echo: u8,
    pub line_delete: u8,
    pub line_delete_echo: Vec<u8>,
    pub line_delete_echo_enabled: bool,
    pub no_break_read: u8,
    pub unedited: bool,
    pub binary: bool,
    /// Primary end-of-record character
    pub primary_terminator: u8,
    /// Alternate end-of-record character, zero when unset
    pub alternate_terminator: u8,
    pub driver_mode: DriverMode,
    pub block_mode_supported: bool,
    pub sys_break_enabled: bool,
    pub subsys_break_enabled: bool,
    pub sys_break_char: u8,
    pub subsys_break_char: u8,
    /// Terminal type set through MPE control; 10 selects block-mode capable terminals
    pub term_type: u8,
    pub type_ahead: bool,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            echo: 0,
            echo_enabled: true,
            char_delete: BS,
            char_delete_echo: ECHO_BACKSPACE,
            line_delete: 0x18,
            line_delete_echo: b"!!!\r\n".to_vec(),
            line_delete_echo_enabled: true,
            no_break_read: 0,
            unedited: false,
            binary: false,
            primary_terminator: CR,
            alternate_terminator: 0,
            driver_mode: DriverMode::Vanilla,
            block_mode_supported: false,
            sys_break_enabled: false,
            subsys_break_enabled: false,
            sys_break_char: 0,
            subsys_break_char: 0,
            term_type: 0,
            type_ahead: false,
        }
    }
}

/// Parameters of the read the host is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRead {
    pub request_count: u16,
    pub length: usize,
    /// Seconds; zero means wait forever
    pub timeout: u16,
    pub flush_type_ahead: bool,
    pub echo_crlf: bool,
}

/// Things the caller may need to react to after a record was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// TM negotiation accepted; the connection is open
    Opened,
    /// The host aborted the outstanding read
    ReadAborted,
    /// The host terminated the session
    HostTerminated,
    /// A record the TM must not receive was recorded and skipped
    Violation(ProtocolViolation),
}

/// Result of one [`VtConnection::feed`] step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub consumed: usize,
    pub event: Option<Event>,
}

/// Collaborators the engine drives
pub trait VtIo {
    /// Write one complete record to the transport
    fn send_record(&mut self, record: &[u8]) -> TransportResult<()>;
    /// Display output
    fn emit(&mut self, bytes: &[u8]);
    /// A completed input line, before translation
    fn log_input(&mut self, _line: &[u8]) {}
    /// Host write data as it arrived, before carriage control and translation
    fn log_output(&mut self, _data: &[u8], _block_mode: bool) {}
}

/// Per-connection protocol engine
#[derive(Debug)]
pub struct VtConnection {
    state: ConnectionState,
    settings: TerminalSettings,
    read: Option<PendingRead>,
    read_started: bool,
    send_buffer_size: usize,
    assembler: RecordAssembler,
    tm_request_count: u16,
    appl_request_count: u16,
    last_violation: Option<ProtocolViolation>,
    violation_count: u32,
    translation: Option<TranslationTable>,
    session_pid: u32,
    node_name: String,
}

impl Default for VtConnection {
    fn default() -> Self {
        Self::new(VT_MAX_BUFFER)
    }
}

impl VtConnection {
    /// New closed connection whose buffers are `buffer_size` bytes (capped at the protocol maximum)
    pub fn new(buffer_size: usize) -> Self {
        let size = buffer_size.clamp(terminal_io::RESP_HEADER_LEN + 1, VT_MAX_BUFFER);
        Self {
            state: ConnectionState::Closed,
            settings: TerminalSettings::default(),
            read: None,
            read_started: false,
            send_buffer_size: size,
            assembler: RecordAssembler::new(size),
            tm_request_count: 0,
            appl_request_count: 0,
            last_violation: None,
            violation_count: 0,
            translation: None,
            session_pid: std::process::id(),
            node_name: crate::network_platform::local_node_name(),
        }
    }

    /// Identity reported in the TM negotiation request
    pub fn with_identity(mut self, pid: u32, node_name: impl Into<String>) -> Self {
        self.session_pid = pid;
        self.node_name = node_name.into();
        self
    }

    pub fn set_translation(&mut self, table: Option<TranslationTable>) {
        self.translation = table;
    }

    pub fn translation(&self) -> Option<&TranslationTable> {
        self.translation.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == ConnectionState::Shutdown
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TerminalSettings {
        &mut self.settings
    }

    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size
    }

    pub fn receive_buffer_size(&self) -> usize {
        self.assembler.limit()
    }

    pub fn pending_read(&self) -> Option<&PendingRead> {
        self.read.as_ref()
    }

    pub fn read_in_progress(&self) -> bool {
        self.read.is_some()
    }

    /// Returns true once after each new read request
    pub fn take_read_started(&mut self) -> bool {
        std::mem::take(&mut self.read_started)
    }

    /// Forget the outstanding read without answering it
    pub fn cancel_read(&mut self) {
        self.read = None;
        self.read_started = false;
    }

    pub fn last_violation(&self) -> Option<ProtocolViolation> {
        self.last_violation
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    /// Bytes the reassembler needs to finish its current stage
    pub fn wanted(&self) -> usize {
        self.assembler.wanted()
    }

    /// Transport connect started
    pub fn begin_connect(&mut self) {
        if self.state == ConnectionState::Closed {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Transport connected; wait for the AM to negotiate
    pub fn connected(&mut self) {
        if self.state <= ConnectionState::Connecting {
            self.assembler.reset();
            self.state = ConnectionState::WaitingForAmNegotiation;
            debug!("VT transport connected, waiting for AM negotiation");
        }
    }

    /// Consume bytes up to the end of at most one record and handle it.
    ///
    /// Fatal errors move the connection to `Shutdown` before they are returned.
    pub fn feed(&mut self, input: &[u8], io: &mut dyn VtIo) -> VtResult<Feed> {
        if self.is_shutdown() {
            return Ok(Feed { consumed: input.len(), event: None });
        }
        let step = match self.assembler.push(input) {
            Ok(step) => step,
            Err(err) => return Err(self.fail(io, err.into())),
        };
        if !step.complete {
            return Ok(Feed { consumed: step.consumed, event: None });
        }

        let record = self.assembler.take_record();
        debug!("{}", hex_dump(&record, "from_host"));
        let result = self.dispatch(&record, io);
        self.assembler.recycle(record);

        match result {
            Ok(event) => Ok(Feed { consumed: step.consumed, event }),
            Err(VtError::Protocol(violation)) => {
                self.record_violation(violation);
                Ok(Feed { consumed: step.consumed, event: Some(Event::Violation(violation)) })
            }
            Err(err) => Err(self.fail(io, err)),
        }
    }

    /// Feed a whole buffer, collecting the events of every record in it
    pub fn receive(&mut self, mut input: &[u8], io: &mut dyn VtIo) -> VtResult<Vec<Event>> {
        let mut events = Vec::new();
        while !input.is_empty() && !self.is_shutdown() {
            let feed = self.feed(input, io)?;
            events.extend(feed.event);
            input = &input[feed.consumed..];
        }
        Ok(events)
    }

    /// Complete the outstanding read with `data` and the given completion mask
    pub fn send_data(&mut self, data: &[u8], completion_mask: u16, io: &mut dyn VtIo) -> VtResult<()> {
        let read = match self.read.take() {
            Some(read) => read,
            None => {
                self.record_violation(ProtocolViolation::NoReadOutstanding);
                return Err(ProtocolViolation::NoReadOutstanding.into());
            }
        };
        let max = self.send_buffer_size - terminal_io::RESP_HEADER_LEN;
        let length = data.len().min(max);
        let response = IoResponse {
            primitive: PRIM_READ,
            request_count: read.request_count,
            response_code: if completion_mask == COMP_SUCCESSFUL { RESP_SUCCESSFUL } else { RESP_EOF },
            completion_mask,
            data: data[..length].to_vec(),
        };
        self.send(io, &response.encode())
    }

    /// Send an application control break with the given index
    pub fn send_break(&mut self, index: u16, io: &mut dyn VtIo) -> VtResult<()> {
        if !self.is_open() {
            debug!("Break with index {} ignored in state {:?}", index, self.state);
            return Ok(());
        }
        self.appl_request_count = self.appl_request_count.wrapping_add(1);
        info!("Sending break, index {}", index);
        self.send(io, &encode_break(self.appl_request_count, index))
    }

    /// Ask the host to end the session and shut the connection down
    pub fn terminate(&mut self, io: &mut dyn VtIo) {
        if self.state >= ConnectionState::WaitingForAmNegotiation && !self.is_shutdown() {
            self.send_termination_request(io);
        }
        self.state = ConnectionState::Shutdown;
        self.read = None;
    }

    fn send_termination_request(&mut self, io: &mut dyn VtIo) {
        self.tm_request_count = self.tm_request_count.wrapping_add(1);
        let request = SimpleMessage {
            message_type: MSG_ENV_CNTL_REQ,
            primitive: PRIM_TERMINATE,
            request_count: self.tm_request_count,
            code: None,
        };
        if let Err(err) = io.send_record(&request.encode()) {
            debug!("Termination request not sent: {}", err);
        }
    }

    /// Send a reply; one that outgrew the negotiated buffer is dropped as a violation
    fn send(&mut self, io: &mut dyn VtIo, record: &[u8]) -> VtResult<()> {
        if record.len() > self.send_buffer_size {
            return Err(ProtocolViolation::ReplyTooLarge {
                message_type: record.get(OFF_MESSAGE_TYPE).copied().unwrap_or(0),
                length: record.len(),
                max: self.send_buffer_size,
            }
            .into());
        }
        self.transmit(io, record)
    }

    fn transmit(&mut self, io: &mut dyn VtIo, record: &[u8]) -> VtResult<()> {
        debug!("{}", hex_dump(record, "to_host"));
        io.send_record(record).map_err(|err| {
            self.state = ConnectionState::Shutdown;
            VtError::Transport(err)
        })
    }

    fn fail(&mut self, io: &mut dyn VtIo, err: VtError) -> VtError {
        warn!("VT connection failed: {}", err);
        if matches!(err, VtError::Framing(_)) && self.state != ConnectionState::Shutdown {
            self.send_termination_request(io);
        }
        self.state = ConnectionState::Shutdown;
        self.read = None;
        err
    }

    fn record_violation(&mut self, violation: ProtocolViolation) {
        warn!("{}", violation);
        self.last_violation = Some(violation);
        self.violation_count += 1;
    }

    fn dispatch(&mut self, record: &[u8], io: &mut dyn VtIo) -> VtResult<Option<Event>> {
        let inbound = message::decode(record)?;
        if inbound.requires_open() && !self.is_open() {
            let header = message::RecordReader::new(record).header()?;
            return Err(ProtocolViolation::NotOpen {
                message_type: header.message_type,
                primitive: header.primitive,
            }
            .into());
        }

        match inbound {
            Inbound::AmNegotiation(req) => self.on_am_negotiation(&req, io).map(|_| None),
            Inbound::TmNegotiationReply(reply) => self.on_tm_negotiation_reply(&reply).map(Some),
            Inbound::TerminateRequest { request_count } => {
                info!("Received shutdown request from AM");
                let response = SimpleMessage {
                    message_type: MSG_ENV_CNTL_RESP,
                    primitive: PRIM_TERMINATE,
                    request_count,
                    code: Some(RESP_NO_ERROR),
                };
                if let Err(err) = self.send(io, &response.encode()) {
                    debug!("Termination response not sent: {}", err);
                }
                self.state = ConnectionState::Shutdown;
                self.read = None;
                Ok(Some(Event::HostTerminated))
            }
            Inbound::TerminateResponse => {
                info!("AM acknowledged termination");
                self.state = ConnectionState::Shutdown;
                self.read = None;
                Ok(Some(Event::HostTerminated))
            }
            Inbound::LogonInfoRequest { request_count } => {
                let response = SimpleMessage {
                    message_type: MSG_ENV_CNTL_RESP,
                    primitive: PRIM_LOGON_INFO,
                    request_count,
                    code: Some(LOGON_INFO_FAILED),
                };
                self.send(io, &response.encode()).map(|_| None)
            }
            Inbound::Read(req) => {
                self.on_read(&req);
                Ok(None)
            }
            Inbound::Write(req) => self.on_write(&req, io).map(|_| None),
            Inbound::Abort(req) => self.on_abort(&req, io).map(|_| Some(Event::ReadAborted)),
            Inbound::SetBreak(req) => self.on_set_break(&req, io).map(|_| None),
            Inbound::DriverControl(req) => self.on_driver_control(&req, io).map(|_| None),
            Inbound::MpeControl(req) => self.on_mpe_control(&req, io).map(|_| None),
            Inbound::GenericFdc(req) => self.on_generic_fdc(&req, io).map(|_| None),
            Inbound::Ignored => Ok(None),
        }
    }

    fn on_am_negotiation(&mut self, req: &AmNegotiationRequest, io: &mut dyn VtIo) -> VtResult<()> {
        debug!("AM negotiation: {:?}", req);
        let s = &mut self.settings;
        s.echo = req.echo;
        s.echo_enabled = req.echo_control != ECHO_CONTROL_OFF;
        s.char_delete = req.char_delete;
        s.char_delete_echo = req.char_delete_echo;
        s.line_delete = req.line_delete;
        if let Some(echo) = &req.line_delete_echo {
            s.line_delete_echo = echo.clone();
        }
        s.no_break_read = req.no_break_read;
        if let Some(b) = req.break_info {
            s.sys_break_enabled = b.sys_enabled;
            s.subsys_break_enabled = b.subsys_enabled;
            s.sys_break_char = b.sys_char;
            s.subsys_break_char = b.subsys_char;
        }

        let offered = req.buffer_size as usize;
        if offered > terminal_io::RESP_HEADER_LEN && offered < self.send_buffer_size {
            self.send_buffer_size = offered;
        }

        let response = AmNegotiationResponse {
            request_count: req.request_count,
            buffer_size: self.send_buffer_size as u16,
            tm_max_receive_burst: req.am_max_send_burst,
            tm_max_send_burst: req.am_max_receive_burst,
        };
        self.send_negotiation(io, &response.encode())?;

        if self.state == ConnectionState::WaitingForAmNegotiation {
            self.tm_request_count = self.tm_request_count.wrapping_add(1);
            let tm_request = TmNegotiationRequest::new(self.tm_request_count, self.session_pid, &self.node_name);
            self.send_negotiation(io, &tm_request.encode())?;
            self.state = ConnectionState::WaitingForTmNegotiationReply;
        }
        Ok(())
    }

    /// Negotiation records have a fixed size and go out whatever buffer the AM offered
    fn send_negotiation(&mut self, io: &mut dyn VtIo, record: &[u8]) -> VtResult<()> {
        if record.len() > self.send_buffer_size {
            warn!(
                "Negotiation record of {} bytes exceeds the {} byte send buffer",
                record.len(),
                self.send_buffer_size
            );
        }
        self.transmit(io, record)
    }

    fn on_tm_negotiation_reply(&mut self, reply: &TmNegotiationReply) -> VtResult<Event> {
        if reply.response_code != RESP_SUCCESSFUL {
            return Err(NegotiationError::Rejected { response_code: reply.response_code }.into());
        }
        info!("Connection status: connection is open");
        self.state = ConnectionState::Open;
        Ok(Event::Opened)
    }

    fn on_read(&mut self, req: &ReadRequest) {
        if let Some(previous) = self.read {
            warn!("Read {} replaced by read {}", previous.request_count, req.request_count);
        }
        self.read = Some(PendingRead {
            request_count: req.request_count,
            length: req.byte_count as usize,
            timeout: req.timeout,
            flush_type_ahead: req.flags & READ_FLUSH_TYPE_AHEAD != 0,
            echo_crlf: req.flags & READ_NO_CRLF == 0,
        });
        self.read_started = true;
    }

    fn on_write(&mut self, req: &WriteRequest<'_>, io: &mut dyn VtIo) -> VtResult<()> {
        let use_cctl = req.flags & WRITE_USE_CCTL != 0;
        let prespace = req.flags & WRITE_PRESPACE != 0;
        let cctl = req.data.first().copied().unwrap_or(0);

        if use_cctl && prespace {
            emit_carriage_control(cctl, io);
        }

        let text = if use_cctl && !req.data.is_empty() { &req.data[1..] } else { req.data };
        io.log_output(text, self.settings.driver_mode == DriverMode::Block);
        if !text.is_empty() {
            match &self.translation {
                Some(table) => {
                    let mut out = text.to_vec();
                    table.translate_outbound(&mut out);
                    io.emit(&out);
                }
                None => io.emit(text),
            }
        }

        if use_cctl && !prespace {
            emit_carriage_control(cctl, io);
        }

        if req.flags & WRITE_NEEDS_RESPONSE != 0 {
            let response = IoResponse {
                primitive: PRIM_WRITE,
                request_count: req.request_count,
                response_code: RESP_SUCCESSFUL,
                completion_mask: COMP_SUCCESSFUL,
                data: Vec::new(),
            };
            self.send(io, &response.encode())?;
        }
        Ok(())
    }

    fn on_abort(&mut self, req: &AbortRequest, io: &mut dyn VtIo) -> VtResult<()> {
        info!("Host aborted read {}", req.read_request_count);
        self.cancel_read();
        let completion = IoResponse {
            primitive: PRIM_READ,
            request_count: req.read_request_count,
            response_code: RESP_SUCCESSFUL,
            completion_mask: COMP_ABORTED,
            data: Vec::new(),
        };
        self.send(io, &completion.encode())?;
        self.send(io, &IoResponse::encode_abort_ack(req.request_count))
    }

    fn on_set_break(&mut self, req: &SetBreakRequest, io: &mut dyn VtIo) -> VtResult<()> {
        match req.index {
            SET_BREAK_SYSTEM => self.settings.sys_break_enabled = req.enable,
            SET_BREAK_SUBSYSTEM => self.settings.subsys_break_enabled = req.enable,
            other => debug!("Set break for unknown index {}", other),
        }
        // hosts expect the failure code here
        let response = RecordWriter::new(MSG_TERMINAL_CNTL_RESP, PRIM_SET_BREAK)
            .u16(req.request_count)
            .u16(RESP_FAILED)
            .finish();
        self.send(io, &response)
    }

    fn on_driver_control(&mut self, req: &DriverControlRequest, io: &mut dyn VtIo) -> VtResult<()> {
        let mask = req.request_mask;
        let mut status = 0u16;
        let mut invalid = false;
        let s = &mut self.settings;

        if mask & DRV_MASK_ECHO != 0 {
            s.echo_enabled = req.echo != ECHO_CONTROL_OFF;
            status |= DRV_MASK_ECHO;
        }
        if mask & DRV_MASK_EDIT_MODE != 0 {
            match req.edit_mode {
                EDIT_MODE_EDITED => {
                    s.unedited = false;
                    s.primary_terminator = CR;
                }
                EDIT_MODE_UNEDITED => {
                    s.unedited = true;
                    s.primary_terminator = req.term_char;
                }
                EDIT_MODE_BINARY => s.binary = true,
                EDIT_MODE_NO_BINARY => s.binary = false,
                other => debug!("Unknown edit mode {}", other),
            }
            status |= DRV_MASK_EDIT_MODE;
        }
        if mask & DRV_MASK_DRIVER_MODE != 0 {
            if req.driver_mode != DRIVER_MODE_VANILLA && !s.block_mode_supported {
                invalid = true;
                status |= DRV_STATUS_DRIVER_MODE_FAILED;
            } else {
                s.driver_mode = if req.driver_mode == DRIVER_MODE_VANILLA {
                    DriverMode::Vanilla
                } else {
                    DriverMode::Block
                };
                status |= DRV_MASK_DRIVER_MODE;
            }
        }
        if mask & DRV_MASK_TERM_CHAR != 0 {
            s.alternate_terminator = req.term_char;
        }
        if mask & DRV_MASK_DATA_STREAM != 0 {
            status |= DRV_STATUS_DATA_STREAM_FAILED;
        }
        if mask & DRV_MASK_ECHO_LINE != 0 {
            s.line_delete_echo_enabled = req.echo_line_delete != 0;
            status |= DRV_MASK_ECHO_LINE;
        }

        let response = RecordWriter::new(MSG_TERMINAL_CNTL_RESP, PRIM_SET_DRIVER_INFO)
            .u16(req.request_count)
            .u16(if invalid { RESP_BAD_OP } else { RESP_SUCCESSFUL })
            .u16(status)
            .finish();
        self.send(io, &response)
    }

    fn on_mpe_control(&mut self, req: &MpeControlRequest, io: &mut dyn VtIo) -> VtResult<()> {
        if req.request_mask & MPE_MASK_TERM_TYPE != 0 {
            self.settings.term_type = req.term_type;
        }
        if req.request_mask & MPE_MASK_TYPE_AHEAD != 0 {
            self.settings.type_ahead = req.type_ahead != 0;
        }
        let response = RecordWriter::new(MSG_MPE_CNTL_RESP, PRIM_MPE_CONTROL)
            .u16(req.request_count)
            .u16(RESP_FAILED)
            .u16(COMP_SUCCESSFUL)
            .finish();
        self.send(io, &response)
    }

    fn on_generic_fdc(&mut self, req: &FdcRequest<'_>, io: &mut dyn VtIo) -> VtResult<()> {
        debug!("{}", hex_dump(req.buffer, &format!("FDC func={}, len={}", req.function, req.buffer.len())));
        let room = self.send_buffer_size.saturating_sub(generic_fdc::RESP_HEADER_LEN);
        let echoed = &req.buffer[..req.buffer.len().min(room)];
        if echoed.len() < req.buffer.len() {
            debug!("FDC echo cut from {} to {} bytes", req.buffer.len(), echoed.len());
        }
        let response = RecordWriter::new(MSG_GENERIC_FDC_RESP, PRIM_FDC_DEVICE_SET)
            .u16(req.request_count)
            .u32(req.function)
            .u16(echoed.len() as u16)
            .u16(RESP_NO_ERROR)
            .bytes(echoed)
            .finish();
        self.send(io, &response)
    }
}

/// Display bytes produced by a carriage control code: CR then line feeds or a form feed
pub fn carriage_control_bytes(cctl: u8) -> Vec<u8> {
    let lines = match cctl {
        CCTL_NONE => return Vec::new(),
        CCTL_SKIP_BASE..=CCTL_SKIP_MAX => (cctl - CCTL_SKIP_BASE) as usize,
        CCTL_NO_SPACE => 0,
        CCTL_DOUBLE => 2,
        CCTL_TRIPLE | CCTL_TRIPLE_ALT => 3,
        CCTL_FORM_FEED => return vec![CR, FF],
        _ => 1,
    };
    let mut out = Vec::with_capacity(lines + 1);
    out.push(CR);
    out.resize(lines + 1, LF);
    out
}

fn emit_carriage_control(cctl: u8, io: &mut dyn VtIo) {
    let bytes = carriage_control_bytes(cctl);
    if !bytes.is_empty() {
        io.emit(&bytes);
    }
}
