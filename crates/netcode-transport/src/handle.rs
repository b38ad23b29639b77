//! Socket setup and teardown shared by the stream and datagram transports.

use socket2::{Domain, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr};
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Bind a new socket of type `ty` to `port` on every local address
///
/// With `dual_stack` set this is `[::]` accepting IPv4 through mapped
/// addresses; if that fails for any reason `0.0.0.0` is tried instead. On
/// failure the socket is closed before returning.
pub(crate) fn bind_wildcard(
    ty: Type,
    port: u16,
    config: &TransportConfig,
    setup: impl Fn(&Socket) -> io::Result<()>,
) -> Result<Socket> {
    if config.dual_stack {
        match bind_family(Domain::IPV6, ty, port, &setup) {
            Ok(socket) => return Ok(socket),
            Err(e) => debug!("Dual-stack bind on port {} failed ({}), using IPv4", port, e),
        }
    }
    bind_family(Domain::IPV4, ty, port, &setup)
}

fn bind_family(
    domain: Domain,
    ty: Type,
    port: u16,
    setup: &impl Fn(&Socket) -> io::Result<()>,
) -> Result<Socket> {
    let socket = Socket::new(domain, ty, None).map_err(Error::Socket)?;

    let ip = if domain == Domain::IPV6 {
        socket.set_only_v6(false).map_err(Error::Socket)?;
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };

    setup(&socket).map_err(Error::Socket)?;

    let addr = SocketAddr::new(ip, port);
    socket
        .bind(&addr.into())
        .map_err(|source| Error::Bind { port, source })?;

    Ok(socket)
}

/// Local port a socket is bound to
pub(crate) fn local_port(socket: &Socket) -> Option<u16> {
    socket
        .local_addr()
        .ok()
        .and_then(|a| a.as_socket())
        .map(|a| a.port())
}

/// Shut down both directions and release the descriptor
///
/// Sockets that were never connected report `ENOTCONN` from shutdown; that
/// is not a close failure.
pub(crate) fn shutdown_and_close(socket: Socket) -> Result<()> {
    let result = match socket.shutdown(Shutdown::Both) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        Err(e) => Err(Error::Close(e)),
    };
    drop(socket);
    result
}
