//! Local terminal in raw mode
//!
//! [`RawTerminal`] switches the controlling terminal to single-character,
//! unprocessed I/O for the life of the session and puts the saved
//! attributes back when dropped. When standard input is not a terminal
//! (scripted runs) nothing is changed. [`NonBlocking`] does the same for a
//! descriptor's blocking mode while the readiness loop owns it.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use log::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalOptions {
    /// 8 data bits, no parity, one stop bit
    pub eight_bit_no_parity: bool,
    /// Stop the terminal driver from eating XON/XOFF
    pub disable_xon_xoff: bool,
}

pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

fn get_attributes(fd: RawFd) -> io::Result<libc::termios> {
    let mut tio: libc::termios = unsafe { mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(tio)
}

fn set_attributes(fd: RawFd, tio: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, tio) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn disabled_char(fd: RawFd) -> libc::cc_t {
    let value = unsafe { libc::fpathconf(fd, libc::_PC_VDISABLE) };
    if value == -1 {
        0xFF
    } else {
        value as libc::cc_t
    }
}

/// Raw-mode attributes derived from the saved ones
pub fn raw_attributes(saved: &libc::termios, options: TerminalOptions, vdisable: libc::cc_t) -> libc::termios {
    let mut tio = *saved;
    tio.c_lflag = 0;
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;
    tio.c_oflag = 0;
    tio.c_iflag &= !libc::ICRNL;
    if options.eight_bit_no_parity {
        tio.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB);
        tio.c_cflag |= libc::CS8 | libc::CREAD;
    }
    if options.disable_xon_xoff {
        tio.c_cc[libc::VSTART] = vdisable;
        tio.c_cc[libc::VSTOP] = vdisable;
    }
    tio
}

#[derive(Debug)]
pub struct RawTerminal {
    fd: RawFd,
    saved: Option<libc::termios>,
}

impl RawTerminal {
    /// Switch `fd` to raw mode if it is a terminal
    pub fn enter(fd: RawFd, options: TerminalOptions) -> io::Result<Self> {
        if !is_tty(fd) {
            debug!("fd {} is not a terminal, leaving it alone", fd);
            return Ok(Self { fd, saved: None });
        }
        let saved = get_attributes(fd)?;
        set_attributes(fd, &raw_attributes(&saved, options, disabled_char(fd)))?;
        Ok(Self { fd, saved: Some(saved) })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_tty(&self) -> bool {
        self.saved.is_some()
    }

    /// Run `f` with the original attributes in place, then go back to raw mode
    pub fn with_cooked<R>(&mut self, f: impl FnOnce() -> R) -> io::Result<R> {
        let Some(saved) = self.saved else {
            return Ok(f());
        };
        let current = get_attributes(self.fd)?;
        set_attributes(self.fd, &saved)?;
        let result = f();
        set_attributes(self.fd, &current)?;
        Ok(result)
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(err) = set_attributes(self.fd, &saved) {
                log::warn!("Could not restore terminal attributes: {}", err);
            }
        }
    }
}

fn get_flags(fd: RawFd) -> io::Result<libc::c_int> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

fn set_flags(fd: RawFd, flags: libc::c_int) -> io::Result<()> {
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Keeps a descriptor in non-blocking mode and puts its flags back when dropped
#[derive(Debug)]
pub struct NonBlocking {
    fd: RawFd,
    saved: libc::c_int,
}

impl NonBlocking {
    pub fn enable(fd: RawFd) -> io::Result<Self> {
        let saved = get_flags(fd)?;
        set_flags(fd, saved | libc::O_NONBLOCK)?;
        Ok(Self { fd, saved })
    }

    /// Run `f` with the original blocking mode in place
    pub fn suspended<R>(&self, f: impl FnOnce() -> R) -> io::Result<R> {
        set_flags(self.fd, self.saved)?;
        let result = f();
        set_flags(self.fd, self.saved | libc::O_NONBLOCK)?;
        Ok(result)
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        if let Err(err) = set_flags(self.fd, self.saved) {
            debug!("Could not restore flags of fd {}: {}", self.fd, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooked() -> libc::termios {
        let mut tio: libc::termios = unsafe { mem::zeroed() };
        tio.c_lflag = libc::ICANON | libc::ECHO | libc::ISIG;
        tio.c_iflag = libc::ICRNL | libc::IXON;
        tio.c_oflag = libc::OPOST;
        tio.c_cflag = libc::CS7 | libc::PARENB;
        tio.c_cc[libc::VSTART] = 0x11;
        tio.c_cc[libc::VSTOP] = 0x13;
        tio
    }

    #[test]
    fn test_raw_attributes_default() {
        let raw = raw_attributes(&cooked(), TerminalOptions::default(), 0xFF);
        assert_eq!(raw.c_lflag, 0);
        assert_eq!(raw.c_oflag, 0);
        assert_eq!(raw.c_iflag & libc::ICRNL, 0);
        assert_ne!(raw.c_iflag & libc::IXON, 0);
        assert_eq!(raw.c_cc[libc::VMIN], 1);
        assert_eq!(raw.c_cc[libc::VTIME], 0);
        assert_eq!(raw.c_cflag, libc::CS7 | libc::PARENB);
        assert_eq!(raw.c_cc[libc::VSTART], 0x11);
    }

    #[test]
    fn test_raw_attributes_eight_bit_and_no_flow_control() {
        let options = TerminalOptions { eight_bit_no_parity: true, disable_xon_xoff: true };
        let raw = raw_attributes(&cooked(), options, 0xFF);
        assert_eq!(raw.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(raw.c_cflag & libc::PARENB, 0);
        assert_ne!(raw.c_cflag & libc::CREAD, 0);
        assert_eq!(raw.c_cc[libc::VSTART], 0xFF);
        assert_eq!(raw.c_cc[libc::VSTOP], 0xFF);
    }

    #[test]
    fn test_non_blocking_guard_restores_flags() {
        use std::io::Read;
        use std::os::unix::io::AsRawFd;
        use std::os::unix::net::UnixStream;

        let (mut ours, _theirs) = UnixStream::pair().unwrap();
        let fd = ours.as_raw_fd();
        {
            let guard = NonBlocking::enable(fd).unwrap();
            assert_ne!(get_flags(fd).unwrap() & libc::O_NONBLOCK, 0);
            let mut buf = [0u8; 4];
            assert_eq!(ours.read(&mut buf).unwrap_err().kind(), io::ErrorKind::WouldBlock);
            let inside = guard.suspended(|| get_flags(fd).unwrap()).unwrap();
            assert_eq!(inside & libc::O_NONBLOCK, 0);
            assert_ne!(get_flags(fd).unwrap() & libc::O_NONBLOCK, 0);
        }
        assert_eq!(get_flags(fd).unwrap() & libc::O_NONBLOCK, 0);
    }

    #[test]
    fn test_non_tty_is_left_alone() {
        let file = tempfile::tempfile().unwrap();
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
        let mut term = RawTerminal::enter(fd, TerminalOptions::default()).unwrap();
        assert!(!term.is_tty());
        assert_eq!(term.with_cooked(|| 5).unwrap(), 5);
    }
}
