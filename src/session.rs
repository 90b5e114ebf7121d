//! One VT session: the protocol engine, its line discipline and the
//! collaborators they drive.
//!
//! The session reacts to what the engine reports after each batch of host
//! records: a new read flushes type-ahead when asked, sends the DC1 read
//! trigger for block-capable terminals and drains whatever was typed ahead.
//! It also owns the read timeout deadline and the scripted-input end
//! condition.

use std::io::Write;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{TransportResult, VtError, VtResult};
use crate::line_discipline::{LineDiscipline, QueueOutcome, QueueTrigger};
use crate::session_log::{Direction, SessionLog};
use crate::transport::Transport;
use crate::vt::codes::{DC1, VT_MAX_BUFFER};
use crate::vt::connection::{Event, VtConnection, VtIo};

/// Terminal type that supports block mode and expects a DC1 on each read
pub const BLOCK_MODE_TERM_TYPE: u8 = 10;

/// Local options that shape a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub term_type: u8,
    pub type_ahead: bool,
    pub stop_at_eof: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            term_type: BLOCK_MODE_TERM_TYPE,
            type_ahead: false,
            stop_at_eof: false,
        }
    }
}

/// Binds the engine's collaborators for the duration of one call
struct Glue<'a> {
    transport: &'a mut dyn Transport,
    display: &'a mut dyn Write,
    log: &'a mut SessionLog,
}

impl VtIo for Glue<'_> {
    fn send_record(&mut self, record: &[u8]) -> TransportResult<()> {
        self.transport.send(record)
    }

    fn emit(&mut self, bytes: &[u8]) {
        emit_to(self.display, bytes);
    }

    fn log_input(&mut self, line: &[u8]) {
        self.log.log(Direction::Input, line, false);
    }

    fn log_output(&mut self, data: &[u8], block_mode: bool) {
        self.log.log(Direction::Output, data, block_mode);
    }
}

fn emit_to(display: &mut dyn Write, bytes: &[u8]) {
    if let Err(err) = display.write_all(bytes).and_then(|_| display.flush()) {
        warn!("Display write failed: {}", err);
    }
}

pub struct VtSession {
    conn: VtConnection,
    discipline: LineDiscipline,
    log: SessionLog,
    display: Box<dyn Write>,
    options: SessionOptions,
    read_deadline: Option<Instant>,
}

impl std::fmt::Debug for VtSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VtSession")
            .field("conn", &self.conn)
            .field("discipline", &self.discipline)
            .field("options", &self.options)
            .field("read_deadline", &self.read_deadline)
            .finish()
    }
}

impl VtSession {
    pub fn new(
        mut conn: VtConnection,
        options: SessionOptions,
        log: SessionLog,
        display: Box<dyn Write>,
    ) -> Self {
        if options.term_type == BLOCK_MODE_TERM_TYPE {
            conn.settings_mut().block_mode_supported = true;
        }
        let mut discipline = LineDiscipline::new();
        discipline.set_type_ahead(options.type_ahead);
        discipline.set_stop_at_eof(options.stop_at_eof);
        Self {
            conn,
            discipline,
            log,
            display,
            options,
            read_deadline: None,
        }
    }

    pub fn connection(&self) -> &VtConnection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut VtConnection {
        &mut self.conn
    }

    pub fn discipline(&self) -> &LineDiscipline {
        &self.discipline
    }

    pub fn discipline_mut(&mut self) -> &mut LineDiscipline {
        &mut self.discipline
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// Character the host negotiated as the system break
    pub fn system_break_char(&self) -> u8 {
        self.conn.settings().sys_break_char
    }

    /// Deadline of the outstanding timed read
    pub fn read_deadline(&self) -> Option<Instant> {
        self.read_deadline
    }

    /// Session is over: the connection shut down, or scripted input ran out
    pub fn is_finished(&self) -> bool {
        self.conn.is_shutdown() || self.discipline.eof_reached()
    }

    /// The transport is connected; wait for the host to negotiate
    pub fn start(&mut self) {
        self.conn.begin_connect();
        self.conn.connected();
    }

    /// Queue a script of initial input
    pub fn preload(&mut self, script: &[u8]) -> VtResult<usize> {
        Ok(self.discipline.preload(script)?)
    }

    /// Read what the transport has and handle every complete record in it
    pub fn on_readable(&mut self, transport: &mut dyn Transport) -> VtResult<usize> {
        let mut buf = [0u8; VT_MAX_BUFFER];
        let n = transport.read(&mut buf)?;
        if n > 0 {
            self.on_host_bytes(&buf[..n], transport)?;
        }
        Ok(n)
    }

    /// Handle bytes that arrived from the host
    pub fn on_host_bytes(&mut self, bytes: &[u8], transport: &mut dyn Transport) -> VtResult<()> {
        let events = {
            let mut io = Glue {
                transport: &mut *transport,
                display: &mut *self.display,
                log: &mut self.log,
            };
            self.conn.receive(bytes, &mut io)?
        };
        for event in events {
            match event {
                Event::Opened => info!("VT session open"),
                Event::ReadAborted => {
                    self.discipline.reset_record();
                    self.read_deadline = None;
                }
                Event::HostTerminated => info!("Host ended the session"),
                Event::Violation(violation) => debug!("Skipped record: {}", violation),
            }
        }
        if self.conn.take_read_started() {
            self.on_read_started(transport)?;
        }
        Ok(())
    }

    fn on_read_started(&mut self, transport: &mut dyn Transport) -> VtResult<()> {
        let Some(read) = self.conn.pending_read().copied() else {
            return Ok(());
        };
        if read.flush_type_ahead {
            self.discipline.flush();
        }
        if self.options.term_type == BLOCK_MODE_TERM_TYPE {
            emit_to(&mut *self.display, &[DC1]);
        }
        self.read_deadline = (read.timeout > 0)
            .then(|| Instant::now() + Duration::from_secs(u64::from(read.timeout)));
        self.process(transport, QueueTrigger::Characters).map(|_| ())
    }

    /// Local keystrokes
    pub fn on_local_input(&mut self, bytes: &[u8], transport: &mut dyn Transport) -> VtResult<()> {
        for &byte in bytes {
            match self.discipline.accept_input(byte, &self.conn) {
                Ok(true) => {}
                Ok(false) => debug!("Dropped input 0x{:02x}, no read outstanding", byte),
                Err(err) => {
                    warn!("{}", err);
                    break;
                }
            }
        }
        if self.conn.read_in_progress() {
            self.process(transport, QueueTrigger::Characters)?;
        }
        Ok(())
    }

    /// The user pressed the system break key
    pub fn system_break(&mut self, transport: &mut dyn Transport) -> VtResult<QueueOutcome> {
        self.process(transport, QueueTrigger::SystemBreak)
    }

    /// Complete the outstanding read with a timeout if its deadline passed
    pub fn check_timeout(&mut self, now: Instant, transport: &mut dyn Transport) -> VtResult<()> {
        match self.read_deadline {
            Some(deadline) if deadline <= now => {
                self.read_deadline = None;
                debug!("Read timed out");
                self.process(transport, QueueTrigger::Timeout).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Ask the host to end the session
    pub fn terminate(&mut self, transport: &mut dyn Transport) {
        let mut io = Glue {
            transport,
            display: &mut *self.display,
            log: &mut self.log,
        };
        self.conn.terminate(&mut io);
        self.read_deadline = None;
    }

    fn process(&mut self, transport: &mut dyn Transport, trigger: QueueTrigger) -> VtResult<QueueOutcome> {
        let result = {
            let mut io = Glue {
                transport,
                display: &mut *self.display,
                log: &mut self.log,
            };
            self.discipline.process_queue(&mut self.conn, &mut io, trigger)
        };
        if !self.conn.read_in_progress() {
            self.read_deadline = None;
        }
        match result {
            Ok(outcome) => Ok(outcome),
            Err(VtError::Protocol(violation)) => {
                debug!("Queue not processed: {}", violation);
                Ok(QueueOutcome::Idle)
            }
            Err(err) => Err(err),
        }
    }
}
