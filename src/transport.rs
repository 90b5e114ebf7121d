//! Transport channels: serial line, remote login and VT protocol socket
//!
//! Each variant carries bytes only; none of them knows about VT records.
//! Reads never block: the controller waits for readiness on
//! [`Transport::raw_fd`] first, and a read with nothing available returns
//! `Ok(0)`. A send that cannot write the whole buffer in one go is a failure.
//! Once any operation fails the transport is marked ended and later calls
//! return [`TransportError::EndOfStream`] without touching the descriptor.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem;
use std::net::{Shutdown, TcpStream};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

use log::{debug, info};

use crate::error::{TransportError, TransportResult};
use crate::network_platform::{connect_tcp, SocketOptions};
use crate::vt::codes::VT_PORT;

/// Well-known remote login port
pub const RLOGIN_PORT: u16 = 513;
/// Terminal type announced to the remote login server
pub const RLOGIN_TERMINAL: &str = "hpterm/9600";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Serial,
    RemoteLogin,
    ProtocolSocket,
}

impl ConnectionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tty" | "serial" => Some(ConnectionKind::Serial),
            "rlogin" => Some(ConnectionKind::RemoteLogin),
            "vt3k" | "vt" => Some(ConnectionKind::ProtocolSocket),
            _ => None,
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            ConnectionKind::Serial => None,
            ConnectionKind::RemoteLogin => Some(RLOGIN_PORT),
            ConnectionKind::ProtocolSocket => Some(VT_PORT),
        }
    }
}

/// Uniform byte stream over one of the connection kinds
pub trait Transport {
    fn kind(&self) -> ConnectionKind;
    /// Bytes available now; `Ok(0)` when nothing is ready
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize>;
    /// Write all of `data` in one call
    fn send(&mut self, data: &[u8]) -> TransportResult<()>;
    /// Descriptor to wait on
    fn raw_fd(&self) -> Option<RawFd>;
    /// Release the descriptor; safe to call more than once
    fn close(&mut self);
    fn is_ended(&self) -> bool;
}

fn read_from<R: Read>(reader: &mut R, buf: &mut [u8]) -> TransportResult<usize> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Err(TransportError::EndOfStream),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) => return Err(TransportError::io("read", &e)),
        }
    }
}

fn send_to<W: Write>(writer: &mut W, data: &[u8]) -> TransportResult<()> {
    loop {
        match writer.write(data) {
            Ok(n) if n == data.len() => return Ok(()),
            Ok(n) => return Err(TransportError::ShortWrite { written: n, expected: data.len() }),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::io("send", &e)),
        }
    }
}

/// Wraps an operation result, marking the transport ended on failure
fn track<T>(ended: &mut bool, result: TransportResult<T>) -> TransportResult<T> {
    if result.is_err() {
        *ended = true;
    }
    result
}

/// Parity setting of a serial line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// 8 data bits, no parity
    None,
    /// 7 data bits, even parity
    Even,
    /// 7 data bits, odd parity
    Odd,
}

/// Parsed `device|speed|parity` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSpec {
    pub device: String,
    pub speed: u32,
    pub parity: Parity,
}

impl SerialSpec {
    pub fn parse(target: &str) -> TransportResult<Self> {
        let invalid = |reason: &str| TransportError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = target.splitn(3, '|');
        let device = parts.next().unwrap_or_default();
        let speed = parts.next().ok_or_else(|| invalid("missing '|' before speed"))?;
        let parity = parts.next().ok_or_else(|| invalid("missing '|' before parity"))?;
        if device.is_empty() {
            return Err(invalid("empty device name"));
        }
        let parity = match parity.chars().next() {
            Some('N') | Some('n') => Parity::None,
            Some('O') | Some('o') => Parity::Odd,
            _ => Parity::Even,
        };
        Ok(Self {
            device: device.to_string(),
            speed: speed.trim().parse().unwrap_or(0),
            parity,
        })
    }

    /// termios speed constant; unknown speeds run at 19200
    pub fn baud(&self) -> libc::speed_t {
        match self.speed {
            300 | 30 => libc::B300,
            1200 | 120 => libc::B1200,
            2400 | 240 => libc::B2400,
            4800 | 480 => libc::B4800,
            9600 | 960 => libc::B9600,
            38400 | 3840 => libc::B38400,
            _ => libc::B19200,
        }
    }
}

/// Serial line opened in raw mode
#[derive(Debug)]
pub struct SerialTransport {
    file: Option<File>,
    ended: bool,
}

impl SerialTransport {
    pub fn open(spec: &SerialSpec) -> TransportResult<Self> {
        let open_err = |err: io::Error| TransportError::Open {
            target: spec.device.clone(),
            os_code: err.raw_os_error(),
            message: err.to_string(),
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&spec.device)
            .map_err(open_err)?;
        configure_serial(file.as_raw_fd(), spec).map_err(open_err)?;
        info!("Opened serial line {} at {} baud", spec.device, spec.speed);
        Ok(Self { file: Some(file), ended: false })
    }
}

fn configure_serial(fd: RawFd, spec: &SerialSpec) -> io::Result<()> {
    let mut tio: libc::termios = unsafe { mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } == -1 {
        return Err(io::Error::last_os_error());
    }
    let speed = spec.baud();
    if unsafe { libc::cfsetispeed(&mut tio, speed) } == -1
        || unsafe { libc::cfsetospeed(&mut tio, speed) } == -1
    {
        return Err(io::Error::last_os_error());
    }
    tio.c_cflag &= !libc::CSIZE;
    tio.c_cflag |= libc::CREAD | libc::CLOCAL;
    match spec.parity {
        Parity::None => {
            tio.c_cflag &= !(libc::PARENB | libc::PARODD);
            tio.c_cflag |= libc::CS8;
        }
        Parity::Even | Parity::Odd => {
            tio.c_cflag &= !libc::PARODD;
            tio.c_cflag |= libc::CS7 | libc::PARENB;
            if spec.parity == Parity::Odd {
                tio.c_cflag |= libc::PARODD;
            }
        }
    }
    tio.c_iflag = libc::IGNBRK | libc::IGNPAR;
    tio.c_oflag = 0;
    tio.c_lflag = 0;
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } == -1 {
        return Err(io::Error::last_os_error());
    }

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags == -1 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl Transport for SerialTransport {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Serial
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match (self.ended, self.file.as_mut()) {
            (false, Some(file)) => track(&mut self.ended, read_from(file, buf)),
            _ => Err(TransportError::EndOfStream),
        }
    }

    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        match (self.ended, self.file.as_mut()) {
            (false, Some(file)) => track(&mut self.ended, send_to(file, data)),
            _ => Err(TransportError::EndOfStream),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("Serial line closed");
        }
        self.ended = true;
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

/// Shared plumbing of the two TCP transports
#[derive(Debug)]
struct TcpChannel {
    stream: Option<TcpStream>,
    ended: bool,
}

impl TcpChannel {
    fn new(stream: TcpStream) -> Self {
        Self { stream: Some(stream), ended: false }
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match (self.ended, self.stream.as_mut()) {
            (false, Some(stream)) => track(&mut self.ended, read_from(stream, buf)),
            _ => Err(TransportError::EndOfStream),
        }
    }

    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        match (self.ended, self.stream.as_mut()) {
            (false, Some(stream)) => track(&mut self.ended, send_to(stream, data)),
            _ => Err(TransportError::EndOfStream),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.stream.as_ref().map(|s| s.as_raw_fd())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.ended = true;
    }
}

/// rlogin session from a reserved local port
#[derive(Debug)]
pub struct RemoteLoginTransport {
    channel: TcpChannel,
}

impl RemoteLoginTransport {
    pub fn connect(host: &str, port: u16, user: &str) -> TransportResult<Self> {
        let options = SocketOptions { zero_tos: false, reserved_port: true };
        let stream = connect_tcp(host, port, options)?;
        let mut transport = Self { channel: TcpChannel::new(stream) };
        transport.send(&rlogin_startup(user))?;
        Ok(transport)
    }
}

/// `\0user\0user\0terminal\0`
pub fn rlogin_startup(user: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(4 + 2 * user.len() + RLOGIN_TERMINAL.len());
    msg.push(0);
    msg.extend_from_slice(user.as_bytes());
    msg.push(0);
    msg.extend_from_slice(user.as_bytes());
    msg.push(0);
    msg.extend_from_slice(RLOGIN_TERMINAL.as_bytes());
    msg.push(0);
    msg
}

impl Transport for RemoteLoginTransport {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::RemoteLogin
    }
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.channel.read(buf)
    }
    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        self.channel.send(data)
    }
    fn raw_fd(&self) -> Option<RawFd> {
        self.channel.raw_fd()
    }
    fn close(&mut self) {
        self.channel.close()
    }
    fn is_ended(&self) -> bool {
        self.channel.ended
    }
}

/// TCP socket carrying VT records
#[derive(Debug)]
pub struct SocketTransport {
    channel: TcpChannel,
}

impl SocketTransport {
    pub fn connect(host: &str, port: u16) -> TransportResult<Self> {
        let options = SocketOptions { zero_tos: true, reserved_port: false };
        let stream = connect_tcp(host, port, options)?;
        Ok(Self { channel: TcpChannel::new(stream) })
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream) -> TransportResult<Self> {
        stream.set_nonblocking(true).map_err(|e| TransportError::io("configure", &e))?;
        Ok(Self { channel: TcpChannel::new(stream) })
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> ConnectionKind {
        ConnectionKind::ProtocolSocket
    }
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.channel.read(buf)
    }
    fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        self.channel.send(data)
    }
    fn raw_fd(&self) -> Option<RawFd> {
        self.channel.raw_fd()
    }
    fn close(&mut self) {
        self.channel.close()
    }
    fn is_ended(&self) -> bool {
        self.channel.ended
    }
}

/// Open a transport of the given kind. `target` is a host name, or a
/// `device|speed|parity` string for serial lines.
pub fn connect(
    kind: ConnectionKind,
    target: &str,
    port: Option<u16>,
    rlogin_user: &str,
) -> TransportResult<Box<dyn Transport>> {
    let port = port.or(kind.default_port()).unwrap_or(VT_PORT);
    match kind {
        ConnectionKind::Serial => {
            let spec = SerialSpec::parse(target)?;
            Ok(Box::new(SerialTransport::open(&spec)?))
        }
        ConnectionKind::RemoteLogin => Ok(Box::new(RemoteLoginTransport::connect(target, port, rlogin_user)?)),
        ConnectionKind::ProtocolSocket => Ok(Box::new(SocketTransport::connect(target, port)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_serial_spec_parse() {
        let spec = SerialSpec::parse("/dev/ttyS0|9600|N").unwrap();
        assert_eq!(spec.device, "/dev/ttyS0");
        assert_eq!(spec.baud(), libc::B9600);
        assert_eq!(spec.parity, Parity::None);

        let spec = SerialSpec::parse("/dev/ttyS1|120|O").unwrap();
        assert_eq!(spec.baud(), libc::B1200);
        assert_eq!(spec.parity, Parity::Odd);

        assert_eq!(SerialSpec::parse("/dev/ttyS1|57600|E").unwrap().baud(), libc::B19200);
    }

    #[test]
    fn test_serial_spec_missing_separator() {
        assert!(matches!(
            SerialSpec::parse("/dev/ttyS0|9600"),
            Err(TransportError::InvalidTarget { .. })
        ));
        assert!(SerialSpec::parse("/dev/ttyS0").is_err());
    }

    #[test]
    fn test_rlogin_startup_message() {
        assert_eq!(rlogin_startup("mgr"), b"\0mgr\0mgr\0hpterm/9600\0".to_vec());
        assert_eq!(rlogin_startup(""), b"\0\0\0hpterm/9600\0".to_vec());
    }

    #[test]
    fn test_socket_end_of_stream_is_permanent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = SocketTransport::connect("127.0.0.1", port).unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);

        let mut buf = [0u8; 16];
        let mut result = transport.read(&mut buf);
        for _ in 0..100 {
            if !matches!(result, Ok(0)) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
            result = transport.read(&mut buf);
        }
        assert!(matches!(result, Err(TransportError::EndOfStream)));
        assert!(transport.is_ended());
        assert!(matches!(transport.send(b"x"), Err(TransportError::EndOfStream)));
        transport.close();
        transport.close();
    }
}
