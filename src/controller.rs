//! Readiness loop for one connection
//!
//! A single thread waits on the transport and local input with a
//! [`mio::Poll`]. The wait carries a timeout while the host has a timed read
//! outstanding; expiry completes that read. Break keys are picked out of
//! the input stream before it reaches the channel.
//!
//! Readiness is edge-triggered, so both descriptors run non-blocking while
//! the loop owns them and each wakeup reads until nothing is left.

use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::channel::Channel;
use crate::error::{TransportError, VtError, VtResult};
use crate::keyboard::{ask_command, BreakDetector, Command, KeyAction};
use crate::terminal::{NonBlocking, RawTerminal};

const HOST: Token = Token(0);
const KEYBOARD: Token = Token(1);
const EVENTS_CAPACITY: usize = 8;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Host closed the connection or the session ended normally
    HostClosed,
    /// The user chose Exit in command mode
    UserExit,
}

pub struct Controller {
    channel: Channel,
    input: File,
    input_open: bool,
    terminal: Option<RawTerminal>,
    breaks: BreakDetector,
}

impl Controller {
    pub fn new(channel: Channel, input: File, terminal: Option<RawTerminal>, breaks: BreakDetector) -> Self {
        Self {
            channel,
            input,
            input_open: true,
            terminal,
            breaks,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    /// Run until the connection ends or the user exits
    pub fn run(&mut self) -> VtResult<LoopExit> {
        let exit = self.run_loop();
        self.channel.close();
        exit
    }

    fn run_loop(&mut self) -> VtResult<LoopExit> {
        let Some(transport_fd) = self.channel.raw_fd() else {
            return Ok(LoopExit::HostClosed);
        };
        let input_fd = self.input.as_raw_fd();

        let mut poll = Poll::new().map_err(|e| TransportError::io("poll", &e))?;
        poll.registry()
            .register(&mut SourceFd(&transport_fd), HOST, Interest::READABLE)
            .map_err(|e| TransportError::io("register transport", &e))?;
        let _host_mode = NonBlocking::enable(transport_fd).map_err(|e| TransportError::io("transport mode", &e))?;
        let input_mode = NonBlocking::enable(input_fd).map_err(|e| TransportError::io("input mode", &e))?;

        match poll.registry().register(&mut SourceFd(&input_fd), KEYBOARD, Interest::READABLE) {
            Ok(()) => {}
            // Regular files and /dev/null cannot be polled; they are always readable
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                debug!("Input cannot be polled, reading it all now");
                if let Some(exit) = self.drain_input(&input_mode)? {
                    return Ok(exit);
                }
                self.input_open = false;
            }
            Err(err) => return Err(TransportError::io("register input", &err).into()),
        }

        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        while !self.channel.is_eof() {
            if let Err(err) = poll.poll(&mut events, self.poll_timeout()) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(TransportError::io("poll", &err).into());
            }

            for event in events.iter() {
                match event.token() {
                    HOST => self.drain_host()?,
                    KEYBOARD if self.input_open && !self.channel.is_eof() => {
                        if let Some(exit) = self.drain_input(&input_mode)? {
                            return Ok(exit);
                        }
                    }
                    _ => {}
                }
            }
            settle(self.channel.check_timeout(Instant::now()))?;
        }
        Ok(LoopExit::HostClosed)
    }

    /// Time left until the read deadline; `None` waits forever
    fn poll_timeout(&self) -> Option<Duration> {
        self.channel.deadline().map(|deadline| {
            let left = deadline.saturating_duration_since(Instant::now());
            debug!("timer: {} ms", left.as_millis());
            left
        })
    }

    fn drain_host(&mut self) -> VtResult<()> {
        while !self.channel.is_eof() {
            match self.channel.read() {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => settle(Err(err))?,
            }
        }
        Ok(())
    }

    fn drain_input(&mut self, input_mode: &NonBlocking) -> VtResult<Option<LoopExit>> {
        let mut buf = [0u8; 256];
        while self.input_open && !self.channel.is_eof() {
            let n = match self.input.read(&mut buf) {
                Ok(0) => {
                    info!("Local input closed");
                    self.input_open = false;
                    break;
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(TransportError::io("read input", &err).into()),
            };
            if let Some(exit) = self.on_input(&buf[..n], input_mode)? {
                return Ok(Some(exit));
            }
        }
        Ok(None)
    }

    fn on_input(&mut self, bytes: &[u8], input_mode: &NonBlocking) -> VtResult<Option<LoopExit>> {
        let negotiated = self.channel.session().map(|s| s.system_break_char()).filter(|&c| c != 0);
        if negotiated.is_none() && self.breaks.break_char().is_none() {
            settle(self.channel.send(bytes))?;
            return Ok(None);
        }
        let negotiated = negotiated.unwrap_or(0);
        let now = Instant::now();
        let mut pending: Vec<u8> = Vec::with_capacity(bytes.len());
        for &byte in bytes {
            match self.breaks.classify(byte, negotiated, now) {
                KeyAction::Input(b) => pending.push(b),
                action => {
                    settle(self.channel.send(&pending))?;
                    pending.clear();
                    if action == KeyAction::CommandMode && self.command_mode(input_mode)? == Command::Exit {
                        return Ok(Some(LoopExit::UserExit));
                    }
                    settle(self.channel.send_break())?;
                }
            }
        }
        if !pending.is_empty() {
            settle(self.channel.send(&pending))?;
        }
        Ok(None)
    }

    fn command_mode(&mut self, input_mode: &NonBlocking) -> VtResult<Command> {
        let prompt = || input_mode.suspended(|| ask_command(&mut io::stdin().lock(), &mut io::stdout()));
        let answer = match self.terminal.as_mut() {
            Some(term) => term.with_cooked(prompt),
            None => Ok(prompt()),
        };
        let command = answer
            .and_then(|suspended| suspended)
            .and_then(|asked| asked)
            .map_err(|e| TransportError::io("command mode", &e))?;
        self.breaks.reset();
        Ok(command)
    }
}

/// End-of-stream ends the loop quietly; other fatal errors propagate
fn settle(result: VtResult<()>) -> VtResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(VtError::Transport(TransportError::EndOfStream)) => Ok(()),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!("{}", err);
            Ok(())
        }
    }
}
