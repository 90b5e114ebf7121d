//! HP 3000 VT protocol, Terminal Manager side
//!
//! - [`codes`]: wire constants and payload offsets
//! - [`message`]: typed parse/encode of every record the TM handles
//! - [`framing`]: record reassembly across partial reads
//! - [`connection`]: the per-connection engine and its state machine

pub mod codes;
pub mod connection;
pub mod framing;
pub mod message;

pub use connection::{ConnectionState, DriverMode, Event, PendingRead, TerminalSettings, VtConnection, VtIo};
pub use framing::RecordAssembler;
pub use message::{decode, Inbound};
