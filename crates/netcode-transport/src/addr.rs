//! Address formatting and host resolution.
//!
//! Peer addresses are handed to callers as owned numeric strings. Sockets
//! bound dual-stack see IPv4 peers as IPv4-mapped IPv6 addresses
//! (`::ffff:a.b.c.d`); those are normalised back to the dotted IPv4 form so
//! callers get the same host string whichever family the socket uses.

use socket2::SockAddr;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};
use crate::sys;

/// Host string produced for addresses of an unsupported family
pub const UNKNOWN_FAMILY: &str = "<unknown>";

/// Format a low-level socket address as a numeric host string
///
/// Returns the dotted quad for IPv4 (and IPv4-mapped IPv6), RFC 5952 text
/// for other IPv6 addresses, `""` for an empty or `AF_UNSPEC` address and
/// [`UNKNOWN_FAMILY`] for anything else.
#[must_use]
pub fn format_sockaddr(addr: &SockAddr) -> String {
    if let Some(socket_addr) = addr.as_socket() {
        return format_ip(socket_addr.ip());
    }
    if addr.len() == 0 || addr.family() == libc::AF_UNSPEC as libc::sa_family_t {
        return String::new();
    }
    UNKNOWN_FAMILY.to_string()
}

/// Format an IP address, unwrapping IPv4-mapped IPv6
#[must_use]
pub fn format_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    }
}

/// Replace an IPv4-mapped IPv6 socket address by its IPv4 form
#[must_use]
pub fn normalize(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddr::new(IpAddr::V4(v4), v6.port()),
            None => addr,
        },
        SocketAddr::V4(_) => addr,
    }
}

/// Express `addr` in the family of a socket
///
/// IPv6 sockets reach IPv4 peers through IPv4-mapped addresses.
#[must_use]
pub(crate) fn fit_to_family(addr: SocketAddr, ipv6_socket: bool) -> SocketAddr {
    match (addr, ipv6_socket) {
        (SocketAddr::V4(v4), true) => {
            SocketAddr::new(IpAddr::V6(v4.ip().to_ipv6_mapped()), v4.port())
        }
        (SocketAddr::V6(_), false) => normalize(addr),
        _ => addr,
    }
}

/// Resolve `host` to a single socket address
///
/// Literal addresses are used as-is. Names are looked up and one result is
/// kept: the first IPv4 address when `prefer_ipv4` is set and one exists,
/// otherwise the first address returned.
///
/// # Errors
/// Returns [`Error::Resolve`] carrying the resolver's code if the lookup
/// fails and [`Error::NoAddress`] if it returns nothing.
pub fn resolve(host: &str, port: u16, prefer_ipv4: bool) -> Result<SocketAddr> {
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let addrs = sys::lookup_host(host, port).map_err(|source| Error::Resolve {
        host: host.to_string(),
        source,
    })?;

    let chosen = if prefer_ipv4 {
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
    } else {
        addrs.first()
    };

    chosen
        .copied()
        .ok_or_else(|| Error::NoAddress(host.to_string()))
}

/// A (host, port) pair naming one end of a connection or datagram exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Numeric host string
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build an endpoint from a socket address
    #[must_use]
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self {
            host: format_ip(addr.ip()),
            port: addr.port(),
        }
    }

    /// Build an endpoint from a low-level socket address
    ///
    /// Non-IP addresses get port 0.
    #[must_use]
    pub fn from_sockaddr(addr: &SockAddr) -> Self {
        Self {
            host: format_sockaddr(addr),
            port: addr.as_socket().map_or(0, |a| a.port()),
        }
    }

    /// Parse the host back into a socket address, if it is numeric
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
