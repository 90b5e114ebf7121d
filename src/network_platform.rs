// Socket setup for the VT and remote login transports: type-of-service,
// reserved local ports and the node name reported to the host.

use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddrV4, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::error::{TransportError, TransportResult};

/// Highest and lowest local ports tried when a reserved port is needed
pub const RESERVED_PORT_HIGH: u16 = 1022;
pub const RESERVED_PORT_LOW: u16 = 1001;

/// Options applied before connecting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketOptions {
    /// Force the IP type-of-service to zero; old VT servers fail on anything else
    pub zero_tos: bool,
    /// Bind a local port below 1024 first (remote login)
    pub reserved_port: bool,
}

pub fn set_ip_tos(socket: RawFd, tos: libc::c_int) -> Result<(), io::Error> {
    let ret = unsafe {
        libc::setsockopt(
            socket,
            libc::IPPROTO_IP,
            libc::IP_TOS,
            &tos as *const _ as *const libc::c_void,
            mem::size_of_val(&tos) as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sockaddr_in(addr: SocketAddrV4) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = addr.port().to_be();
    sin.sin_addr = libc::in_addr { s_addr: u32::from(*addr.ip()).to_be() };
    sin
}

/// Bind the highest free reserved port, searching downward
pub fn bind_reserved_port(socket: RawFd) -> Result<u16, io::Error> {
    let mut last_err = io::Error::from_raw_os_error(libc::EADDRINUSE);
    for port in (RESERVED_PORT_LOW..=RESERVED_PORT_HIGH).rev() {
        let sin = sockaddr_in(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let ret = unsafe {
            libc::bind(
                socket,
                &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret == 0 {
            return Ok(port);
        }
        last_err = io::Error::last_os_error();
        if last_err.raw_os_error() != Some(libc::EADDRINUSE) {
            return Err(last_err);
        }
    }
    Err(last_err)
}

/// First IPv4 address of `host`
pub fn resolve_ipv4(host: &str, port: u16) -> TransportResult<SocketAddrV4> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve { host: host.to_string() })?;
    addrs
        .filter_map(|a| match a {
            std::net::SocketAddr::V4(v4) => Some(v4),
            _ => None,
        })
        .next()
        .ok_or_else(|| TransportError::Resolve { host: host.to_string() })
}

/// Open a TCP connection with the given socket options and switch it to non-blocking
pub fn connect_tcp(host: &str, port: u16, options: SocketOptions) -> TransportResult<TcpStream> {
    let addr = resolve_ipv4(host, port)?;
    let connect_err = |err: io::Error| TransportError::Connect {
        host: host.to_string(),
        port,
        os_code: err.raw_os_error(),
        message: err.to_string(),
    };

    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return Err(TransportError::Open {
            target: format!("socket for {host}"),
            os_code: err.raw_os_error(),
            message: err.to_string(),
        });
    }
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    if options.zero_tos {
        set_ip_tos(socket.as_raw_fd(), 0).map_err(connect_err)?;
    }
    if options.reserved_port {
        let local = bind_reserved_port(socket.as_raw_fd()).map_err(|err| TransportError::ReservedPort {
            os_code: err.raw_os_error(),
            message: err.to_string(),
        })?;
        log::debug!("Bound reserved local port {}", local);
    }

    let sin = sockaddr_in(addr);
    loop {
        let ret = unsafe {
            libc::connect(
                socket.as_raw_fd(),
                &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if ret == 0 {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(connect_err(err));
        }
    }

    let stream = TcpStream::from(socket);
    stream.set_nonblocking(true).map_err(connect_err)?;
    log::info!("Connected to {} ({})", host, addr);
    Ok(stream)
}

/// Host name plus domain, as reported in the TM negotiation request
pub fn local_node_name() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    match domain_name() {
        Some(domain) => format!("{host}.{domain}"),
        None => host,
    }
}

#[cfg(target_os = "linux")]
fn domain_name() -> Option<String> {
    let mut buf = [0u8; 128];
    let ret = unsafe { libc::getdomainname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let domain = String::from_utf8_lossy(&buf[..end]).into_owned();
    if domain.is_empty() || domain == "(none)" {
        None
    } else {
        Some(domain)
    }
}

#[cfg(not(target_os = "linux"))]
fn domain_name() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_with_zero_tos() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let options = SocketOptions { zero_tos: true, reserved_port: false };
        let stream = connect_tcp("127.0.0.1", port, options).unwrap();
        assert!(stream.peer_addr().is_ok());
    }

    #[test]
    fn test_unresolvable_host() {
        let err = resolve_ipv4("no-such-host.invalid", 1570).unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn test_node_name_not_empty() {
        assert!(!local_node_name().is_empty());
    }
}
