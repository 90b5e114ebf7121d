//! vt3kr: a Terminal Manager client for the HP 3000 VT protocol
//!
//! The crate connects a local character terminal to a host over one of
//! three transports (serial line, remote login, VT socket). For VT
//! connections it negotiates session parameters with the host's Access
//! Manager and serves the host's read and write requests, editing local
//! input one keystroke at a time into the records the host asked for.

/// Error types shared by every layer
pub mod error;

/// VT protocol engine: wire codes, messages, framing and connection state
pub mod vt;

/// Input queues and line editing
pub mod line_discipline;

/// Byte translation tables
pub mod translation;

/// Serial, remote login and VT socket transports
pub mod transport;

/// Socket options, reserved ports and the local node name
pub mod network_platform;

/// Session glue between the engine, the line discipline and the display
pub mod session;

/// One API over every connection kind
pub mod channel;

/// Transcript and record dumps
pub mod session_log;

pub mod config;
pub mod controller;
pub mod keyboard;
pub mod terminal;

pub use channel::{Channel, Endpoint};
pub use error::{VtError, VtResult};
pub use session::{SessionOptions, VtSession};
pub use transport::{ConnectionKind, Transport};
pub use vt::VtConnection;
