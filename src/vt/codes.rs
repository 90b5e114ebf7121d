/// VT Protocol Constants and Codes
///
/// Wire-level constants for the HP 3000 VT (virtual terminal) protocol as
/// spoken between a Terminal Manager (this client) and the host's Access
/// Manager: message types, primitives, request flags, response and
/// completion codes, and the fixed byte offsets of every record layout.
///
/// All multi-byte integers on the wire are big-endian.

/// Well-known TCP port of the VT service
pub const VT_PORT: u16 = 1570;
/// Largest record either side may send or receive
pub const VT_MAX_BUFFER: usize = 1024;
/// Fixed record header: length(2) protocol(1) type(1) primitive(1) reserved(1)
pub const HEADER_LEN: usize = 6;
/// Only protocol id understood by this implementation
pub const PROTOCOL_ID: u8 = 0x01;

/// Header offsets
pub const OFF_LENGTH: usize = 0;
pub const OFF_PROTOCOL: usize = 2;
pub const OFF_MESSAGE_TYPE: usize = 3;
pub const OFF_PRIMITIVE: usize = 4;
pub const OFF_RESERVED: usize = 5;

/// Message types
pub const MSG_ENV_CNTL_REQ: u8 = 0;
pub const MSG_ENV_CNTL_RESP: u8 = 1;
pub const MSG_TERMINAL_IO_REQ: u8 = 2;
pub const MSG_TERMINAL_IO_RESP: u8 = 3;
pub const MSG_TERMINAL_CNTL_REQ: u8 = 4;
pub const MSG_TERMINAL_CNTL_RESP: u8 = 5;
pub const MSG_APPL_CNTL_REQ: u8 = 6;
pub const MSG_APPL_CNTL_RESP: u8 = 7;
pub const MSG_MPE_CNTL_REQ: u8 = 8;
pub const MSG_MPE_CNTL_RESP: u8 = 9;
pub const MSG_GENERIC_FDC_REQ: u8 = 10;
pub const MSG_GENERIC_FDC_RESP: u8 = 11;

/// Environment control primitives
pub const PRIM_AM_NEGOTIATE: u8 = 0;
pub const PRIM_TM_NEGOTIATE: u8 = 1;
pub const PRIM_TERMINATE: u8 = 2;
pub const PRIM_LOGON_INFO: u8 = 3;

/// Terminal I/O primitives
pub const PRIM_READ: u8 = 0;
pub const PRIM_WRITE: u8 = 1;
pub const PRIM_ABORT: u8 = 2;

/// Terminal control primitives
pub const PRIM_SET_BREAK: u8 = 0;
pub const PRIM_SET_DRIVER_INFO: u8 = 1;

/// Application control, MPE control and generic FDC primitives
pub const PRIM_INVOKE_BREAK: u8 = 0;
pub const PRIM_MPE_CONTROL: u8 = 0;
pub const PRIM_FDC_DEVICE_SET: u8 = 0;

/// Reserved header byte carried by application control requests
pub const APPL_CNTL_RESERVED: u8 = 0xFF;

/// Response codes
pub const RESP_SUCCESSFUL: u16 = 0;
pub const RESP_EOF: u16 = 1;
pub const RESP_BAD_OP: u16 = 2;
/// Generic failure used by control replies (set break, MPE control)
pub const RESP_FAILED: u16 = 1;
pub const RESP_NO_ERROR: u16 = 0;
/// Logon info response mask: information not supplied
pub const LOGON_INFO_FAILED: u16 = 1;

/// Completion masks for terminal I/O responses
pub const COMP_SUCCESSFUL: u16 = 0x0000;
pub const COMP_TIMEOUT: u16 = 0x0001;
pub const COMP_BREAK_READ: u16 = 0x0002;
pub const COMP_ABORTED: u16 = 0x0004;

/// Read request flags
pub const READ_FLUSH_TYPE_AHEAD: u16 = 0x0001;
pub const READ_NO_CRLF: u16 = 0x0002;

/// Write request flags
pub const WRITE_NEEDS_RESPONSE: u16 = 0x0001;
pub const WRITE_USE_CCTL: u16 = 0x0002;
pub const WRITE_PRESPACE: u16 = 0x0004;

/// Carriage control codes
pub const CCTL_NONE: u8 = 0xD0;
pub const CCTL_SKIP_BASE: u8 = 0x80;
pub const CCTL_SKIP_MAX: u8 = 0xBF;
pub const CCTL_NO_SPACE: u8 = 0x2B;
pub const CCTL_DOUBLE: u8 = 0x30;
pub const CCTL_FORM_FEED: u8 = 0x31;
pub const CCTL_TRIPLE: u8 = 0x2D;
pub const CCTL_TRIPLE_ALT: u8 = 0x35;

/// Character-delete echo styles
pub const ECHO_BACKSPACE: u8 = 0;
pub const ECHO_BACKSLASH_LF: u8 = 1;
pub const ECHO_BS_SP_BS: u8 = 2;

/// Echo control: 1 suppresses local echo
pub const ECHO_CONTROL_OFF: u8 = 1;

/// Driver control request mask
pub const DRV_MASK_ECHO: u16 = 0x0001;
pub const DRV_MASK_EDIT_MODE: u16 = 0x0002;
pub const DRV_MASK_DRIVER_MODE: u16 = 0x0004;
pub const DRV_MASK_TERM_CHAR: u16 = 0x0008;
pub const DRV_MASK_DATA_STREAM: u16 = 0x0010;
pub const DRV_MASK_ECHO_LINE: u16 = 0x0020;

/// Driver control status bits
pub const DRV_STATUS_DRIVER_MODE_FAILED: u16 = 0x0100;
pub const DRV_STATUS_DATA_STREAM_FAILED: u16 = 0x0200;

/// Edit modes
pub const EDIT_MODE_EDITED: u8 = 0;
pub const EDIT_MODE_UNEDITED: u8 = 1;
pub const EDIT_MODE_BINARY: u8 = 2;
pub const EDIT_MODE_NO_BINARY: u8 = 3;

/// Driver modes
pub const DRIVER_MODE_VANILLA: u8 = 0;
pub const DRIVER_MODE_BLOCK: u8 = 1;

/// Set-break indexes
pub const SET_BREAK_SYSTEM: u8 = 0;
pub const SET_BREAK_SUBSYSTEM: u8 = 1;

/// Break indexes carried by application control requests
pub const BREAK_INDEX_SYSTEM: u16 = 1;
pub const BREAK_INDEX_SUBSYSTEM: u16 = 2;

/// MPE control request mask
pub const MPE_MASK_TERM_TYPE: u16 = 0x0001;
pub const MPE_MASK_TYPE_AHEAD: u16 = 0x0002;

/// Values the TM reports during negotiation
pub const VERSION_MASK: [u8; 4] = [0xD0, 0x00, 0x00, 100];
pub const OS_TYPE: u16 = 7;
pub const HW_COMP_PARITY: u16 = 0x0001;
pub const LINK_TYPE_NETWORK: u8 = 1;
pub const TERMINAL_CLASS: u16 = 10;
pub const SESSION_ID_LEN: usize = 8;
pub const NODE_NAME_LEN: usize = 50;
pub const MAX_LINE_DELETE_ECHO: usize = 32;

/// AM negotiation request layout
pub mod am_negotiate {
    pub const REQUEST_COUNT: usize = 6;
    pub const OS: usize = 8;
    pub const BUFFER_SIZE: usize = 10;
    pub const TYPE_AHEAD_SIZE: usize = 12;
    pub const ECHO: usize = 14;
    pub const ECHO_CONTROL: usize = 15;
    pub const CHAR_DELETE: usize = 16;
    pub const CHAR_DELETE_ECHO: usize = 17;
    pub const LINE_DELETE: usize = 18;
    pub const NO_BREAK_READ: usize = 19;
    pub const BREAK_OFFSET: usize = 20;
    pub const BREAK_INDEX_COUNT: usize = 22;
    pub const LOGON_ID_OFFSET: usize = 24;
    pub const LOGON_ID_LENGTH: usize = 26;
    pub const DEVICE_ID_OFFSET: usize = 28;
    pub const DEVICE_ID_LENGTH: usize = 30;
    pub const LINE_DELETE_ECHO_OFFSET: usize = 32;
    pub const LINE_DELETE_ECHO_LENGTH: usize = 34;
    pub const MAX_RECEIVE_BURST: usize = 36;
    pub const MAX_SEND_BURST: usize = 38;
    pub const LEN: usize = 40;

    /// Break sub-structure, relative to the break offset
    pub const BREAK_SYS_ENABLED: usize = 0;
    pub const BREAK_SUBSYS_ENABLED: usize = 1;
    pub const BREAK_SYS_CHAR: usize = 2;
    pub const BREAK_SUBSYS_CHAR: usize = 4;
    pub const BREAK_LEN: usize = 6;
}

/// AM negotiation response layout
pub mod am_negotiate_resp {
    pub const REQUEST_COUNT: usize = 6;
    pub const RESPONSE_CODE: usize = 8;
    pub const COMPLETION_MASK: usize = 10;
    pub const BUFFER_SIZE: usize = 12;
    pub const VERSION_MASK: usize = 14;
    pub const OS: usize = 18;
    pub const HW_COMPLETION_MASK: usize = 20;
    pub const MAX_RECEIVE_BURST: usize = 22;
    pub const MAX_SEND_BURST: usize = 24;
    pub const LEN: usize = 26;
}

/// TM negotiation request layout
pub mod tm_negotiate {
    pub const REQUEST_COUNT: usize = 6;
    pub const LINK_TYPE: usize = 8;
    pub const TERMINAL_CLASS: usize = 10;
    pub const SESSION_ID: usize = 12;
    pub const NODE_LENGTH: usize = 20;
    pub const NODE_NAME: usize = 22;
    pub const LEN: usize = 72;

    /// Reply
    pub const RESPONSE_CODE: usize = 8;
    pub const REPLY_LEN: usize = 10;
}

/// Terminal I/O request and response layout
pub mod terminal_io {
    pub const REQUEST_COUNT: usize = 6;
    pub const FLAGS: usize = 8;
    pub const BYTE_COUNT: usize = 10;
    pub const TIMEOUT: usize = 12;
    pub const WRITE_DATA: usize = 12;
    pub const REQ_LEN: usize = 12;

    pub const RESPONSE_CODE: usize = 8;
    pub const COMPLETION_MASK: usize = 10;
    pub const BYTES_READ: usize = 12;
    pub const RESP_DATA: usize = 14;
    pub const RESP_HEADER_LEN: usize = 14;
    pub const ABORT_RESP_LEN: usize = 10;
}

/// Terminal control layouts
pub mod terminal_cntl {
    pub const REQUEST_COUNT: usize = 6;
    pub const BREAK_INDEX: usize = 8;
    pub const BREAK_STATE: usize = 9;
    pub const SET_BREAK_LEN: usize = 10;

    pub const REQUEST_MASK: usize = 8;
    pub const ECHO: usize = 10;
    pub const EDIT_MODE: usize = 11;
    pub const DRIVER_MODE: usize = 12;
    pub const TERM_CHAR: usize = 13;
    pub const ECHO_LINE_DELETE: usize = 14;
    pub const DRIVER_LEN: usize = 15;

    pub const RESPONSE_CODE: usize = 8;
    pub const STATUS_MASK: usize = 10;
    pub const SET_BREAK_RESP_LEN: usize = 10;
    pub const DRIVER_RESP_LEN: usize = 12;
}

/// MPE control layout
pub mod mpe_cntl {
    pub const REQUEST_COUNT: usize = 6;
    pub const REQUEST_MASK: usize = 8;
    pub const TERM_TYPE: usize = 10;
    pub const TYPE_AHEAD: usize = 11;
    pub const REQ_LEN: usize = 12;

    pub const RESPONSE_CODE: usize = 8;
    pub const COMPLETION_MASK: usize = 10;
    pub const RESP_LEN: usize = 12;
}

/// Generic FDC layout
pub mod generic_fdc {
    pub const REQUEST_COUNT: usize = 6;
    pub const FUNCTION: usize = 8;
    pub const LENGTH: usize = 12;
    pub const BUFFER: usize = 14;
    pub const REQ_LEN: usize = 14;

    pub const RESP_FUNCTION: usize = 8;
    pub const RESP_LENGTH: usize = 12;
    pub const ERROR_CODE: usize = 14;
    pub const RESP_BUFFER: usize = 16;
    pub const RESP_HEADER_LEN: usize = 16;
}

/// Environment control replies that only carry a request count and one code
pub mod env_cntl {
    pub const REQUEST_COUNT: usize = 6;
    pub const CODE: usize = 8;
    pub const REQ_LEN: usize = 8;
    pub const RESP_LEN: usize = 10;
}

/// Application control (break) layout
pub mod appl_cntl {
    pub const REQUEST_COUNT: usize = 6;
    pub const BREAK_INDEX: usize = 8;
    pub const LEN: usize = 10;
}

/// Control characters used by the line discipline and write handling
pub const BS: u8 = 0x08;
pub const LF: u8 = 0x0A;
pub const FF: u8 = 0x0C;
pub const CR: u8 = 0x0D;
pub const DC1: u8 = 0x11;
pub const DC2: u8 = 0x12;
pub const ESC: u8 = 0x1B;
pub const SP: u8 = 0x20;
pub const BACKSLASH: u8 = b'\\';
pub const DEL: u8 = 0x7F;
/// Ctl-Y, the usual subsystem break character
pub const CTL_Y: u8 = 0x19;
