//! Line discipline: from single keystrokes to host read completions
//!
//! Local input arrives one byte at a time and is parked in a bounded
//! circular [`InputQueue`]. Synthesized input (status replies and the like)
//! goes to a smaller immediate queue that is always drained first. When the
//! host has a read outstanding, [`LineDiscipline::process_queue`] pulls
//! bytes through the editing rules negotiated on the connection (character
//! delete, line delete, block-mode DC2, break characters, the two
//! end-of-record characters) into the current [`LineRecord`], and sends the
//! record once it is complete.

use log::{debug, warn};

use crate::error::{QueueError, VtResult};
use crate::vt::codes::*;
use crate::vt::connection::{DriverMode, VtConnection, VtIo};

/// Slots in the main input queue
pub const INPUT_QUEUE_SIZE: usize = VT_MAX_BUFFER;
/// Slots in the immediate queue
pub const IMMEDIATE_QUEUE_SIZE: usize = 256;

/// Bounded circular byte queue. A queue with N slots holds N-1 bytes;
/// a push that would make the write cursor catch the read cursor fails and
/// leaves the queue untouched.
#[derive(Debug, Clone)]
pub struct InputQueue {
    slots: Box<[u8]>,
    read: usize,
    write: usize,
    len: usize,
}

impl InputQueue {
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(2);
        Self {
            slots: vec![0u8; slots].into_boxed_slice(),
            read: 0,
            write: 0,
            len: 0,
        }
    }

    /// Bytes the queue can hold
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, byte: u8) -> Result<(), QueueError> {
        let next = (self.write + 1) % self.slots.len();
        if next == self.read {
            return Err(QueueError::Overflow { capacity: self.capacity() });
        }
        self.write = next;
        self.slots[next] = byte;
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        self.read = (self.read + 1) % self.slots.len();
        self.len -= 1;
        Some(self.slots[self.read])
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

/// The record being assembled for the outstanding read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRecord {
    bytes: Vec<u8>,
}

impl LineRecord {
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Why the queue is being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTrigger {
    /// New characters are queued
    Characters,
    /// The user pressed the system break key
    SystemBreak,
    /// The outstanding read timed out
    Timeout,
}

/// What [`LineDiscipline::process_queue`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Nothing to do for this trigger
    Idle,
    /// Queue ran dry before the record completed
    Pending,
    /// Block-mode DC2 discarded the queued input
    Discarded,
    /// A record was sent with this completion mask
    Sent { completion_mask: u16, length: usize },
    /// A break with this index was sent instead of data
    Break { index: u16 },
}

enum Edit {
    Pending,
    Discarded,
    Complete { completion_mask: u16, break_index: Option<u16> },
}

/// Queues plus the in-progress record for one session
#[derive(Debug, Clone)]
pub struct LineDiscipline {
    queue: InputQueue,
    immediate: InputQueue,
    record: LineRecord,
    type_ahead: bool,
    stop_at_eof: bool,
    eof_reached: bool,
}

impl Default for LineDiscipline {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDiscipline {
    pub fn new() -> Self {
        Self::with_queue_sizes(INPUT_QUEUE_SIZE, IMMEDIATE_QUEUE_SIZE)
    }

    pub fn with_queue_sizes(queue: usize, immediate: usize) -> Self {
        Self {
            queue: InputQueue::new(queue),
            immediate: InputQueue::new(immediate),
            record: LineRecord::default(),
            type_ahead: false,
            stop_at_eof: false,
            eof_reached: false,
        }
    }

    /// Keep keystrokes typed while no read is outstanding
    pub fn set_type_ahead(&mut self, enabled: bool) {
        self.type_ahead = enabled;
    }

    /// End the session the first time the queue runs dry (scripted input)
    pub fn set_stop_at_eof(&mut self, enabled: bool) {
        self.stop_at_eof = enabled;
    }

    pub fn eof_reached(&self) -> bool {
        self.eof_reached
    }

    pub fn record(&self) -> &LineRecord {
        &self.record
    }

    pub fn queued(&self) -> usize {
        self.queue.len() + self.immediate.len()
    }

    /// Queue a local keystroke if the connection can use it.
    /// Returns false when the byte was dropped because nothing wants input.
    pub fn accept_input(&mut self, byte: u8, conn: &VtConnection) -> Result<bool, QueueError> {
        if conn.read_in_progress() || self.type_ahead || conn.settings().type_ahead {
            self.put(byte)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn put(&mut self, byte: u8) -> Result<(), QueueError> {
        self.queue.push(byte).map_err(|err| {
            warn!("<queue overflow>");
            err
        })
    }

    pub fn put_immediate(&mut self, byte: u8) -> Result<(), QueueError> {
        self.immediate.push(byte).map_err(|err| {
            warn!("<immediate queue overflow>");
            err
        })
    }

    /// Queue a script; line feeds become carriage returns
    pub fn preload(&mut self, script: &[u8]) -> Result<usize, QueueError> {
        let mut queued = 0;
        for &b in script {
            self.put(if b == LF { CR } else { b })?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Next byte, immediate queue first
    pub fn get(&mut self) -> Option<u8> {
        self.immediate.pop().or_else(|| self.queue.pop())
    }

    /// Discard both queues
    pub fn flush(&mut self) {
        self.queue.clear();
        self.immediate.clear();
    }

    /// Forget the partial record (read aborted)
    pub fn reset_record(&mut self) {
        self.record.clear();
    }

    /// Run the queue against the outstanding read.
    pub fn process_queue(
        &mut self,
        conn: &mut VtConnection,
        io: &mut dyn VtIo,
        trigger: QueueTrigger,
    ) -> VtResult<QueueOutcome> {
        let (completion_mask, break_index) = match trigger {
            QueueTrigger::SystemBreak => {
                if !conn.settings().sys_break_enabled {
                    debug!("System break ignored, not enabled by the host");
                    return Ok(QueueOutcome::Idle);
                }
                self.flush();
                self.record.clear();
                (COMP_SUCCESSFUL, Some(BREAK_INDEX_SYSTEM))
            }
            QueueTrigger::Timeout => {
                if !conn.read_in_progress() {
                    return Ok(QueueOutcome::Idle);
                }
                (COMP_TIMEOUT, None)
            }
            QueueTrigger::Characters => {
                if !conn.read_in_progress() {
                    return Ok(QueueOutcome::Idle);
                }
                match self.edit(conn, io) {
                    Edit::Pending => {
                        if self.stop_at_eof {
                            self.eof_reached = true;
                        }
                        return Ok(QueueOutcome::Pending);
                    }
                    Edit::Discarded => return Ok(QueueOutcome::Discarded),
                    Edit::Complete { completion_mask, break_index } => (completion_mask, break_index),
                }
            }
        };

        let length = self.record.len();
        let result = match break_index {
            Some(index) => conn.send_break(index, io),
            None => {
                let mut data = self.record.as_slice().to_vec();
                if let Some(table) = conn.translation() {
                    table.translate_inbound(&mut data);
                }
                conn.send_data(&data, completion_mask, io)
            }
        };
        self.record.clear();
        conn.cancel_read();
        result?;

        Ok(match break_index {
            Some(index) => QueueOutcome::Break { index },
            None => QueueOutcome::Sent { completion_mask, length },
        })
    }

    fn edit(&mut self, conn: &VtConnection, io: &mut dyn VtIo) -> Edit {
        let s = conn.settings();
        let (read_length, echo_crlf) = conn
            .pending_read()
            .map(|r| (r.length, r.echo_crlf))
            .unwrap_or((0, false));
        let vanilla = s.driver_mode == DriverMode::Vanilla;
        let block = s.driver_mode == DriverMode::Block;

        while let Some(ch) = self.get() {
            if !s.unedited && !s.binary {
                if ch == s.char_delete || ch == DEL {
                    if self.record.pop().is_some() && s.echo_enabled {
                        let erase: &[u8] = match s.char_delete_echo {
                            ECHO_BACKSPACE => &[BS],
                            ECHO_BACKSLASH_LF => &[BACKSLASH, LF],
                            ECHO_BS_SP_BS => &[BS, SP, BS],
                            _ => &[],
                        };
                        if !erase.is_empty() {
                            io.emit(erase);
                        }
                    }
                    continue;
                }
                if ch == s.line_delete {
                    self.record.clear();
                    if s.line_delete_echo_enabled && !s.line_delete_echo.is_empty() {
                        io.emit(&s.line_delete_echo);
                    }
                    continue;
                }
            }

            if block && self.record.is_empty() && ch == DC2 {
                io.emit(&[ESC, b'h', ESC, b'c', DC1]);
                self.flush();
                return Edit::Discarded;
            }

            self.record.push(ch);
            if s.echo_enabled && vanilla {
                let shown = conn.translation().map_or(ch, |t| t.outbound_byte(ch));
                io.emit(&[shown]);
            }

            let subsys_break = s.subsys_break_enabled && !s.binary && ch == s.subsys_break_char;
            let primary = !block && !s.binary && ch == s.primary_terminator;
            let alternate = !s.unedited
                && !s.binary
                && s.alternate_terminator != 0
                && s.alternate_terminator != s.primary_terminator
                && ch == s.alternate_terminator;

            if !(subsys_break || primary || alternate || self.record.len() >= read_length) {
                continue;
            }

            let mut completion_mask = COMP_SUCCESSFUL;
            if subsys_break {
                self.record.pop();
            } else {
                if alternate {
                    completion_mask = COMP_BREAK_READ;
                    if s.echo_enabled && vanilla {
                        io.emit(&[CR]);
                    }
                } else if primary && self.record.len() <= read_length {
                    self.record.pop();
                }
                if echo_crlf && vanilla && !s.binary {
                    if !primary {
                        io.emit(&[CR]);
                    }
                    io.emit(&[LF]);
                }
            }
            io.log_input(self.record.as_slice());
            return Edit::Complete {
                completion_mask,
                break_index: subsys_break.then_some(BREAK_INDEX_SUBSYSTEM),
            };
        }
        Edit::Pending
    }
}
