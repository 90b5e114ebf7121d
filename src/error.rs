//! Structured error handling for vt3kr
//!
//! Errors are grouped by the layer that raises them. Transport and framing
//! problems, and a rejected negotiation, end the session; protocol
//! violations are recorded on the connection and handling continues; queue
//! overflow and table loading failures are reported to the caller, which
//! carries on without the byte or without translation.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for vt3kr operations
#[derive(Debug)]
pub enum VtError {
    /// Transport channel errors (serial, rlogin, VT socket)
    Transport(TransportError),
    /// Malformed records on the wire
    Framing(FramingError),
    /// Negotiation handshake failures
    Negotiation(NegotiationError),
    /// Messages that are illegal for a Terminal Manager to receive
    Protocol(ProtocolViolation),
    /// Input queue errors
    Queue(QueueError),
    /// Translation table loading errors
    Table(TableLoadError),
    /// Configuration errors
    Config(ConfigError),
}

/// Transport channel errors. Every variant leaves the channel unusable.
#[derive(Debug)]
pub enum TransportError {
    /// Serial target was not `device|speed|parity`
    InvalidTarget { target: String, reason: String },
    /// Host name did not resolve to an IPv4 address
    Resolve { host: String },
    /// Opening the device or socket failed
    Open { target: String, os_code: Option<i32>, message: String },
    /// Connecting to the remote host failed
    Connect { host: String, port: u16, os_code: Option<i32>, message: String },
    /// No reserved local port could be bound for remote login
    ReservedPort { os_code: Option<i32>, message: String },
    /// Read or write failed on an established channel
    Io { operation: &'static str, os_code: Option<i32>, message: String },
    /// A send wrote fewer bytes than requested
    ShortWrite { written: usize, expected: usize },
    /// The peer closed the stream or an earlier failure marked it ended
    EndOfStream,
}

/// Record framing errors; all are fatal to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Length word outside the acceptable range
    BadLength { length: usize, max: usize },
    /// Protocol id byte is not the VT protocol
    BadProtocolId { id: u8 },
    /// A fixed field lies past the end of the record
    Truncated { field: &'static str, needed: usize, record_len: usize },
    /// An offset-addressed sub-structure lies outside the record
    SubstructureOutOfBounds { field: &'static str, offset: usize, length: usize, record_len: usize },
    /// Outgoing record does not fit the negotiated buffer
    RecordTooLarge { length: usize, max: usize },
}

/// Negotiation failures; fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The AM answered the TM negotiation request with a failure code
    Rejected { response_code: u16 },
}

/// Non-fatal protocol violations, recorded and counted by the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Message type the TM never accepts
    InvalidMessageType { message_type: u8 },
    /// Undefined environment control primitive
    InvalidControlPrimitive { message_type: u8, primitive: u8 },
    /// Undefined terminal I/O or terminal control primitive
    InvalidIoPrimitive { message_type: u8, primitive: u8 },
    /// Terminal I/O response sent to the TM
    UnexpectedIoResponse,
    /// Terminal control response sent to the TM
    UnexpectedControlResponse,
    /// Application control request sent to the TM
    UnexpectedApplicationRequest,
    /// I/O or terminal control request before negotiation completed
    NotOpen { message_type: u8, primitive: u8 },
    /// A completion was offered with no read outstanding
    NoReadOutstanding,
    /// Reply larger than the negotiated send buffer; it was not sent
    ReplyTooLarge { message_type: u8, length: usize, max: usize },
}

/// Input queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue full; the byte was not stored
    Overflow { capacity: usize },
}

/// Translation table loading errors; the session continues untranslated
#[derive(Debug)]
pub enum TableLoadError {
    /// Table file could not be read
    Io { path: String, error: String },
    /// Table file was not exactly 256 bytes
    WrongSize { size: usize },
    /// One of the first 32 entries maps a control character elsewhere
    ControlNotIdentity { index: usize, value: u8 },
    /// Two inbound entries map to the same byte, so no inverse exists
    DuplicateMapping { value: u8, first: usize, second: usize },
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid configuration parameter
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Missing required configuration
    MissingRequired { parameter: String },
    /// Configuration file error
    FileError { path: String, error: String },
}

impl VtError {
    /// True when the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VtError::Transport(_) | VtError::Framing(_) | VtError::Negotiation(_)
        )
    }

    /// OS error code behind a transport failure, when there is one
    pub fn os_code(&self) -> Option<i32> {
        self.as_transport().and_then(TransportError::os_code)
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            VtError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl TransportError {
    /// Wrap an I/O failure from the given operation
    pub fn io(operation: &'static str, err: &io::Error) -> Self {
        TransportError::Io {
            operation,
            os_code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    pub fn os_code(&self) -> Option<i32> {
        match self {
            TransportError::Open { os_code, .. }
            | TransportError::Connect { os_code, .. }
            | TransportError::ReservedPort { os_code, .. }
            | TransportError::Io { os_code, .. } => *os_code,
            _ => None,
        }
    }
}

impl ProtocolViolation {
    /// Numeric code kept as the connection's last violation
    pub fn code(&self) -> u16 {
        match self {
            ProtocolViolation::InvalidMessageType { .. } => 8,
            ProtocolViolation::InvalidControlPrimitive { .. } => 9,
            ProtocolViolation::InvalidIoPrimitive { .. } => 13,
            ProtocolViolation::UnexpectedIoResponse => 14,
            ProtocolViolation::UnexpectedControlResponse => 15,
            ProtocolViolation::UnexpectedApplicationRequest => 16,
            ProtocolViolation::NotOpen { .. } => 17,
            ProtocolViolation::NoReadOutstanding => 18,
            ProtocolViolation::ReplyTooLarge { .. } => 19,
        }
    }
}

impl fmt::Display for VtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VtError::Transport(err) => write!(f, "Transport error: {err}"),
            VtError::Framing(err) => write!(f, "Framing error: {err}"),
            VtError::Negotiation(err) => write!(f, "Negotiation error: {err}"),
            VtError::Protocol(err) => write!(f, "Protocol violation: {err}"),
            VtError::Queue(err) => write!(f, "Input queue error: {err}"),
            VtError::Table(err) => write!(f, "Translation table error: {err}"),
            VtError::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidTarget { target, reason } =>
                write!(f, "Invalid target '{target}': {reason}"),
            TransportError::Resolve { host } =>
                write!(f, "Unable to resolve host {host}"),
            TransportError::Open { target, message, .. } =>
                write!(f, "Unable to open {target}: {message}"),
            TransportError::Connect { host, port, message, .. } =>
                write!(f, "Unable to connect to {host}:{port}: {message}"),
            TransportError::ReservedPort { message, .. } =>
                write!(f, "Unable to bind a reserved port (root privileges are required): {message}"),
            TransportError::Io { operation, message, .. } =>
                write!(f, "Socket error on {operation}: {message}"),
            TransportError::ShortWrite { written, expected } =>
                write!(f, "Short write: {written} of {expected} bytes sent"),
            TransportError::EndOfStream =>
                write!(f, "Connection closed"),
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::BadLength { length, max } =>
                write!(f, "Received invalid length {length} for VT request (limit {max})"),
            FramingError::BadProtocolId { id } =>
                write!(f, "Received an invalid protocol ID (0x{id:02X})"),
            FramingError::Truncated { field, needed, record_len } =>
                write!(f, "Record of {record_len} bytes too short for {field} (needs {needed})"),
            FramingError::SubstructureOutOfBounds { field, offset, length, record_len } =>
                write!(f, "{field} at offset {offset} length {length} lies outside the {record_len} byte record"),
            FramingError::RecordTooLarge { length, max } =>
                write!(f, "Outgoing record of {length} bytes exceeds buffer size {max}"),
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::Rejected { response_code } =>
                write!(f, "AM rejected TM negotiation (response code {response_code})"),
        }
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolViolation::InvalidMessageType { message_type } =>
                write!(f, "Received an invalid message type ({message_type})"),
            ProtocolViolation::InvalidControlPrimitive { primitive, .. } =>
                write!(f, "Received an invalid control primitive ({primitive})"),
            ProtocolViolation::InvalidIoPrimitive { message_type, primitive } =>
                write!(f, "Received invalid I/O primitive {primitive} in message type {message_type}"),
            ProtocolViolation::UnexpectedIoResponse =>
                write!(f, "Received unexpected I/O response"),
            ProtocolViolation::UnexpectedControlResponse =>
                write!(f, "Received unexpected control response"),
            ProtocolViolation::UnexpectedApplicationRequest =>
                write!(f, "Received unexpected app control request"),
            ProtocolViolation::NotOpen { message_type, primitive } =>
                write!(f, "Received message type {message_type} primitive {primitive} before the connection opened"),
            ProtocolViolation::NoReadOutstanding =>
                write!(f, "Read completion with no read outstanding"),
            ProtocolViolation::ReplyTooLarge { message_type, length, max } =>
                write!(f, "Reply of type {message_type} is {length} bytes, send buffer is {max}"),
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Overflow { capacity } =>
                write!(f, "Input queue overflow (capacity {capacity})"),
        }
    }
}

impl fmt::Display for TableLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableLoadError::Io { path, error } =>
                write!(f, "Unable to read table file '{path}': {error}"),
            TableLoadError::WrongSize { size } =>
                write!(f, "Table file is {size} bytes, expected 256"),
            TableLoadError::ControlNotIdentity { index, value } =>
                write!(f, "Control character {index} maps to 0x{value:02X}; the first 32 entries must be unchanged"),
            TableLoadError::DuplicateMapping { value, first, second } =>
                write!(f, "Entries {first} and {second} both map to 0x{value:02X}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } =>
                write!(f, "Invalid configuration parameter '{parameter}' = '{value}': {reason}"),
            ConfigError::MissingRequired { parameter } =>
                write!(f, "Missing required configuration parameter: {parameter}"),
            ConfigError::FileError { path, error } =>
                write!(f, "Configuration file error '{path}': {error}"),
        }
    }
}

impl StdError for VtError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            VtError::Transport(err) => Some(err),
            VtError::Framing(err) => Some(err),
            VtError::Negotiation(err) => Some(err),
            VtError::Protocol(err) => Some(err),
            VtError::Queue(err) => Some(err),
            VtError::Table(err) => Some(err),
            VtError::Config(err) => Some(err),
        }
    }
}

impl StdError for TransportError {}
impl StdError for FramingError {}
impl StdError for NegotiationError {}
impl StdError for ProtocolViolation {}
impl StdError for QueueError {}
impl StdError for TableLoadError {}
impl StdError for ConfigError {}

impl From<TransportError> for VtError {
    fn from(err: TransportError) -> Self {
        VtError::Transport(err)
    }
}

impl From<FramingError> for VtError {
    fn from(err: FramingError) -> Self {
        VtError::Framing(err)
    }
}

impl From<NegotiationError> for VtError {
    fn from(err: NegotiationError) -> Self {
        VtError::Negotiation(err)
    }
}

impl From<ProtocolViolation> for VtError {
    fn from(err: ProtocolViolation) -> Self {
        VtError::Protocol(err)
    }
}

impl From<QueueError> for VtError {
    fn from(err: QueueError) -> Self {
        VtError::Queue(err)
    }
}

impl From<TableLoadError> for VtError {
    fn from(err: TableLoadError) -> Self {
        VtError::Table(err)
    }
}

impl From<ConfigError> for VtError {
    fn from(err: ConfigError) -> Self {
        VtError::Config(err)
    }
}

// Convert from standard IO errors
impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => TransportError::EndOfStream,
            _ => TransportError::io("I/O", &err),
        }
    }
}

impl From<io::Error> for VtError {
    fn from(err: io::Error) -> Self {
        VtError::Transport(err.into())
    }
}

/// Result type alias for vt3kr operations
pub type VtResult<T> = Result<T, VtError>;

/// Specialized result types for different components
pub type TransportResult<T> = Result<T, TransportError>;
pub type FramingResult<T> = Result<T, FramingError>;
