//! Session transcript and record dumps
//!
//! The transcript records what the user typed (completed input lines) and
//! what the host wrote, filtered by a mask given as a string of letters:
//! `i` for input, `o` for output, `p` to prefix each entry with its
//! direction. Control characters are written by name (`<cr>`, `<esc>`).
//!
//! [`hex_dump`] formats records for `log::debug!`.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::ConfigError;

const CONTROL_NAMES: [&str; 32] = [
    "<nul>", "<soh>", "<stx>", "<etx>", "<eot>", "<enq>", "<ack>", "<bel>",
    "<bs>", "<ht>", "<lf>", "<vt>", "<ff>", "<cr>", "<so>", "<si>",
    "<dle>", "<dc1>", "<dc2>", "<dc3>", "<dc4>", "<nak>", "<syn>", "<etb>",
    "<can>", "<em>", "<sub>", "<esc>", "<fs>", "<gs>", "<rs>", "<us>",
];

/// Which directions are written to the transcript
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogMask {
    pub input: bool,
    pub output: bool,
    pub prefix: bool,
}

impl LogMask {
    /// Parse a mask such as `"io"` or `"ip"`
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut mask = LogMask::default();
        for c in spec.chars() {
            match c {
                'i' => mask.input = true,
                'o' => mask.output = true,
                'p' => mask.prefix = true,
                _ => {
                    return Err(ConfigError::InvalidParameter {
                        parameter: "logging.mask".to_string(),
                        value: spec.to_string(),
                        reason: format!("unknown log flag '{c}'"),
                    })
                }
            }
        }
        Ok(mask)
    }

    pub fn is_empty(&self) -> bool {
        !self.input && !self.output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Transcript writer
pub struct SessionLog {
    mask: LogMask,
    sink: Option<Box<dyn Write>>,
}

impl std::fmt::Debug for SessionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLog")
            .field("mask", &self.mask)
            .field("active", &self.sink.is_some())
            .finish()
    }
}

impl SessionLog {
    /// No transcript
    pub fn disabled() -> Self {
        Self { mask: LogMask::default(), sink: None }
    }

    pub fn new(mask: LogMask, sink: Box<dyn Write>) -> Self {
        let sink = if mask.is_empty() { None } else { Some(sink) };
        Self { mask, sink }
    }

    /// Transcript to `path`, or to standard output when no path is given
    pub fn open(mask: LogMask, path: Option<&Path>) -> io::Result<Self> {
        let sink: Box<dyn Write> = match path {
            Some(p) => Box::new(File::create(p)?),
            None => Box::new(io::stdout()),
        };
        Ok(Self::new(mask, sink))
    }

    pub fn mask(&self) -> LogMask {
        self.mask
    }

    /// Write one entry. With `break_on_dc1`, a line break follows each DC1
    /// so block-mode output stays readable.
    pub fn log(&mut self, direction: Direction, data: &[u8], break_on_dc1: bool) {
        let wanted = match direction {
            Direction::Input => self.mask.input,
            Direction::Output => self.mask.output,
        };
        let Some(sink) = self.sink.as_mut() else { return };
        if !wanted {
            return;
        }
        let mut line = String::new();
        if self.mask.prefix {
            line.push_str(match direction {
                Direction::Input => "in:  ",
                Direction::Output => "out: ",
            });
        }
        line.push_str(&render(data, break_on_dc1));
        line.push('\n');
        if let Err(err) = sink.write_all(line.as_bytes()).and_then(|_| sink.flush()) {
            log::warn!("Session log write failed, disabling: {}", err);
            self.sink = None;
        }
    }
}

/// Printable rendering of bytes with control characters named
pub fn render(data: &[u8], break_on_dc1: bool) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            0..=31 => {
                out.push_str(CONTROL_NAMES[b as usize]);
                if b == 0x0A {
                    out.push('\n');
                }
            }
            127 => out.push_str("<del>"),
            _ => out.push(b as char),
        }
        if break_on_dc1 && b == 0x11 {
            out.push('\n');
        }
    }
    out
}

/// Hex and ASCII dump, sixteen bytes per line, under a `[ label ]` heading
pub fn hex_dump(data: &[u8], label: &str) -> String {
    let mut out = format!("[ {label} ]");
    for chunk in data.chunks(16) {
        out.push('\n');
        for b in chunk {
            let _ = write!(out, "{b:02x} ");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push(' ');
        for &b in chunk {
            out.push(if b.is_ascii_graphic() || b == b' ' { b as char } else { '#' });
        }
    }
    out
}
