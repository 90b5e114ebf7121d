//! Local break key handling
//!
//! One press of the break key sends a system break to the host. Pressing
//! it `count` times within the timer window drops the user into local
//! command mode, where they choose to exit or continue.

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

/// Break presses that open command mode
pub const DEFAULT_BREAK_COUNT: u32 = 3;
/// Window for the consecutive presses
pub const DEFAULT_BREAK_TIMER: Duration = Duration::from_secs(1);

/// What a local keystroke means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Ordinary input for the host
    Input(u8),
    /// Send a system break
    Break,
    /// Enough breaks in a row: ask the user what to do
    CommandMode,
}

/// Answer given in command mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Continue,
}

impl Command {
    /// First letter decides, case-insensitively
    pub fn parse(answer: &str) -> Option<Command> {
        match answer.trim_start().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('E') => Some(Command::Exit),
            Some('C') => Some(Command::Continue),
            _ => None,
        }
    }
}

/// Prompt until the user answers Exit or Continue. End of input counts as Exit.
pub fn ask_command(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Command> {
    writeln!(output)?;
    loop {
        write!(output, "Please enter command (Exit or Continue) : ")?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(Command::Exit);
        }
        if let Some(command) = Command::parse(&answer) {
            if command == Command::Exit {
                write!(output, "\r\nTerminating\r\n")?;
                output.flush()?;
            }
            return Ok(command);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakDetector {
    /// Fixed break character; `None` follows the character the host negotiated
    break_char: Option<u8>,
    count: u32,
    window: Duration,
    remaining: u32,
    first_press: Option<Instant>,
}

impl Default for BreakDetector {
    fn default() -> Self {
        Self::new(None, DEFAULT_BREAK_COUNT, DEFAULT_BREAK_TIMER)
    }
}

impl BreakDetector {
    pub fn new(break_char: Option<u8>, count: u32, window: Duration) -> Self {
        let count = count.max(1);
        Self {
            break_char,
            count,
            window,
            remaining: count,
            first_press: None,
        }
    }

    pub fn break_char(&self) -> Option<u8> {
        self.break_char
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// A negotiated character of zero means the host offered no break key
    pub fn is_break(&self, byte: u8, negotiated: u8) -> bool {
        match self.break_char.or(Some(negotiated).filter(|&c| c != 0)) {
            Some(c) => byte == c,
            None => false,
        }
    }

    /// Classify one keystroke at time `now`
    pub fn classify(&mut self, byte: u8, negotiated: u8, now: Instant) -> KeyAction {
        if !self.is_break(byte, negotiated) {
            self.remaining = self.count;
            return KeyAction::Input(byte);
        }

        let first = match self.first_press {
            Some(first) if self.remaining != self.count => first,
            _ => now,
        };
        if now.duration_since(first) > self.window {
            self.remaining = self.count;
            self.first_press = Some(now);
        } else {
            self.first_press = Some(first);
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.reset();
            KeyAction::CommandMode
        } else {
            KeyAction::Break
        }
    }

    pub fn reset(&mut self) {
        self.remaining = self.count;
        self.first_press = None;
    }

    /// Human name of the break key, e.g. `ctl-Y`
    pub fn describe(&self) -> String {
        match self.break_char {
            None => "break".to_string(),
            Some(c) if c.is_ascii_graphic() || c == b' ' => (c as char).to_string(),
            Some(c) if c < b' ' => format!("ctl-{}", (c + b'@') as char),
            Some(c) => format!("0x{c:02X}"),
        }
    }

    /// Startup hint shown on interactive terminals
    pub fn banner(&self) -> String {
        let key = self.describe();
        format!(
            "To suspend to command mode press '{}' {} times in a {} second period.\r\nTo send a Break, press '{}' once.\r\n",
            key,
            self.count,
            self.window.as_secs(),
            key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTL_Y: u8 = 0x19;

    #[test]
    fn test_single_break_and_input() {
        let mut det = BreakDetector::default();
        let now = Instant::now();
        assert_eq!(det.classify(b'a', CTL_Y, now), KeyAction::Input(b'a'));
        assert_eq!(det.classify(CTL_Y, CTL_Y, now), KeyAction::Break);
    }

    #[test]
    fn test_three_quick_breaks_open_command_mode() {
        let mut det = BreakDetector::default();
        let t0 = Instant::now();
        assert_eq!(det.classify(CTL_Y, CTL_Y, t0), KeyAction::Break);
        assert_eq!(det.classify(CTL_Y, CTL_Y, t0 + Duration::from_millis(200)), KeyAction::Break);
        assert_eq!(
            det.classify(CTL_Y, CTL_Y, t0 + Duration::from_millis(400)),
            KeyAction::CommandMode
        );
        assert_eq!(det.classify(CTL_Y, CTL_Y, t0 + Duration::from_millis(500)), KeyAction::Break);
    }

    #[test]
    fn test_slow_breaks_restart_the_window() {
        let mut det = BreakDetector::default();
        let t0 = Instant::now();
        det.classify(CTL_Y, CTL_Y, t0);
        det.classify(CTL_Y, CTL_Y, t0 + Duration::from_millis(100));
        assert_eq!(det.classify(CTL_Y, CTL_Y, t0 + Duration::from_secs(3)), KeyAction::Break);
        assert_eq!(
            det.classify(CTL_Y, CTL_Y, t0 + Duration::from_millis(3100)),
            KeyAction::Break
        );
    }

    #[test]
    fn test_other_key_resets_count() {
        let mut det = BreakDetector::default();
        let t0 = Instant::now();
        det.classify(CTL_Y, CTL_Y, t0);
        det.classify(CTL_Y, CTL_Y, t0);
        det.classify(b'x', CTL_Y, t0);
        assert_eq!(det.classify(CTL_Y, CTL_Y, t0), KeyAction::Break);
    }

    #[test]
    fn test_fixed_break_char_overrides_negotiated() {
        let det = BreakDetector::new(Some(0x03), 3, DEFAULT_BREAK_TIMER);
        assert!(det.is_break(0x03, CTL_Y));
        assert!(!det.is_break(CTL_Y, CTL_Y));
        assert_eq!(det.describe(), "ctl-C");
        assert_eq!(BreakDetector::new(Some(b'#'), 3, DEFAULT_BREAK_TIMER).describe(), "#");
        assert_eq!(BreakDetector::default().describe(), "break");
    }

    #[test]
    fn test_nul_passes_through_without_a_break_char() {
        let mut det = BreakDetector::default();
        let now = Instant::now();
        assert!(!det.is_break(0, 0));
        for _ in 0..4 {
            assert_eq!(det.classify(0, 0, now), KeyAction::Input(0));
        }
        assert_eq!(BreakDetector::new(Some(0), 3, DEFAULT_BREAK_TIMER).classify(0, CTL_Y, now), KeyAction::Break);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ask_command_reprompts_until_answered() {
        let mut input = io::Cursor::new(b"what\ncontinue\n".to_vec());
        let mut output = Vec::new();
        assert_eq!(ask_command(&mut input, &mut output).unwrap(), Command::Continue);
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Please enter command").count(), 2);
        assert!(!shown.contains("Terminating"));
    }

    #[test]
    fn test_ask_command_exit_and_end_of_input() {
        let mut output = Vec::new();
        assert_eq!(ask_command(&mut io::Cursor::new(b"E\n".to_vec()), &mut output).unwrap(), Command::Exit);
        assert!(String::from_utf8(output).unwrap().ends_with("\r\nTerminating\r\n"));
        assert_eq!(ask_command(&mut io::empty(), &mut Vec::new()).unwrap(), Command::Exit);
    }

    #[test]
    fn test_ask_command_reports_a_broken_terminal() {
        let mut input = io::Cursor::new(b"c\n".to_vec());
        let err = ask_command(&mut input, &mut BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("exit\n"), Some(Command::Exit));
        assert_eq!(Command::parse("c"), Some(Command::Continue));
        assert_eq!(Command::parse("\n"), None);
    }
}
