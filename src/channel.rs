//! Connection manager: one API over the three connection kinds
//!
//! VT connections route through a [`VtSession`]; serial lines and remote
//! logins pass bytes straight between the transport and the display. Any
//! failure sets a permanent end-of-stream flag, after which every operation
//! is a no-op.

use std::io::Write;
use std::os::unix::io::RawFd;
use std::time::Instant;

use log::{debug, info, warn};

use crate::error::{TransportError, VtResult};
use crate::session::VtSession;
use crate::transport::{self, ConnectionKind, Transport};
use crate::vt::codes::VT_MAX_BUFFER;

/// Where host data goes
pub enum Endpoint {
    /// Through the VT protocol engine
    Vt(Box<VtSession>),
    /// Straight to a display
    Raw(Box<dyn Write>),
}

pub struct Channel {
    transport: Box<dyn Transport>,
    endpoint: Endpoint,
    eof: bool,
    closed: bool,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("kind", &self.transport.kind())
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Channel {
    /// Open a transport and attach it to `endpoint`
    pub fn connect(
        kind: ConnectionKind,
        target: &str,
        port: Option<u16>,
        rlogin_user: &str,
        endpoint: Endpoint,
    ) -> VtResult<Self> {
        info!("Connecting to {} ({:?})", target, kind);
        let transport = transport::connect(kind, target, port, rlogin_user)?;
        Ok(Self::new(transport, endpoint))
    }

    /// Attach an already open transport
    pub fn new(transport: Box<dyn Transport>, mut endpoint: Endpoint) -> Self {
        if let Endpoint::Vt(session) = &mut endpoint {
            session.start();
        }
        Self {
            transport,
            endpoint,
            eof: false,
            closed: false,
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        self.transport.kind()
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        if self.eof {
            None
        } else {
            self.transport.raw_fd()
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn session(&self) -> Option<&VtSession> {
        match &self.endpoint {
            Endpoint::Vt(session) => Some(session.as_ref()),
            Endpoint::Raw(_) => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut VtSession> {
        match &mut self.endpoint {
            Endpoint::Vt(session) => Some(session.as_mut()),
            Endpoint::Raw(_) => None,
        }
    }

    /// Earliest time the controller must wake up without input
    pub fn deadline(&self) -> Option<Instant> {
        self.session().and_then(|s| s.read_deadline())
    }

    /// The transport is readable; returns the bytes taken from it, zero once it is drained
    pub fn read(&mut self) -> VtResult<usize> {
        if self.eof {
            return Ok(0);
        }
        let result = match &mut self.endpoint {
            Endpoint::Vt(session) => session.on_readable(self.transport.as_mut()),
            Endpoint::Raw(display) => relay(self.transport.as_mut(), display.as_mut()),
        };
        self.settle(result)
    }

    /// Local input
    pub fn send(&mut self, data: &[u8]) -> VtResult<()> {
        if self.eof {
            return Ok(());
        }
        let result = match &mut self.endpoint {
            Endpoint::Vt(session) => session.on_local_input(data, self.transport.as_mut()),
            Endpoint::Raw(_) => self.transport.send(data).map_err(Into::into),
        };
        self.settle(result)
    }

    /// System break; only VT connections carry one
    pub fn send_break(&mut self) -> VtResult<()> {
        if self.eof {
            return Ok(());
        }
        let result = match &mut self.endpoint {
            Endpoint::Vt(session) => session.system_break(self.transport.as_mut()).map(|_| ()),
            Endpoint::Raw(_) => Ok(()),
        };
        self.settle(result)
    }

    /// Fire the read timeout if it is due
    pub fn check_timeout(&mut self, now: Instant) -> VtResult<()> {
        if self.eof {
            return Ok(());
        }
        let result = match &mut self.endpoint {
            Endpoint::Vt(session) => session.check_timeout(now, self.transport.as_mut()),
            Endpoint::Raw(_) => Ok(()),
        };
        self.settle(result)
    }

    /// End the session and release the transport; safe to call twice
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Endpoint::Vt(session) = &mut self.endpoint {
            if !self.eof {
                session.terminate(self.transport.as_mut());
            }
        }
        self.transport.close();
        self.closed = true;
        self.eof = true;
        debug!("Channel closed");
    }

    fn settle<T>(&mut self, result: VtResult<T>) -> VtResult<T> {
        if let Err(err) = &result {
            match err.as_transport() {
                Some(TransportError::EndOfStream) => info!("Connection closed by host"),
                _ => warn!("Connection failed: {}", err),
            }
            if err.is_fatal() {
                self.eof = true;
            }
        }
        if let Endpoint::Vt(session) = &self.endpoint {
            if session.is_finished() {
                self.eof = true;
            }
        }
        if self.transport.is_ended() {
            self.eof = true;
        }
        result
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

fn relay(transport: &mut dyn Transport, display: &mut dyn Write) -> VtResult<usize> {
    let mut buf = [0u8; VT_MAX_BUFFER];
    let n = transport.read(&mut buf)?;
    if n > 0 {
        display
            .write_all(&buf[..n])
            .and_then(|_| display.flush())
            .map_err(|e| TransportError::io("display", &e))?;
    }
    Ok(n)
}
