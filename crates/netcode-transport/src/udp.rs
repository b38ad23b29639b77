//! Datagram (UDP) transport.
//!
//! One [`UdpSocket::send`] call puts exactly one datagram on the wire, built
//! from the caller's buffers in order. [`UdpSocket::receive`] peeks at the
//! pending datagram first so the returned buffer is exactly its size.

use socket2::{SockAddr, Socket, Type};
use std::io::{self, IoSlice};
use std::net::{IpAddr, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::addr::{self, Endpoint};
use crate::cancel::{CancelSlot, Canceller};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handle;
use crate::sys;

/// Buffers passed to one send beyond which they are copied into one first
///
/// Kernels cap the number of iovecs per `sendmsg` (`IOV_MAX`, 1024 on Linux).
pub const MAX_GATHER_SLICES: usize = 1024;

/// A received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Payload, exactly as long as the datagram
    pub data: Vec<u8>,
    /// Who sent it
    pub sender: Endpoint,
}

impl Datagram {
    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the datagram carried no payload
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Datagram socket bound on every local address
///
/// # Examples
/// ```no_run
/// use netcode_transport::UdpSocket;
/// use std::time::Duration;
///
/// # fn main() -> netcode_transport::Result<()> {
/// let server = UdpSocket::open(55157, None)?;
/// let client = UdpSocket::open(55156, Some("localhost"))?;
///
/// let sent = client.send(None, 55157, &[&b"UDP request data 1\0"[..], b"UDP request data 2\0"])?;
/// assert_eq!(sent, 38);
///
/// if let Some(datagram) = server.receive(Duration::from_secs(5))? {
///     println!("{} bytes from {}", datagram.len(), datagram.sender);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UdpSocket {
    socket: Socket,
    port: u16,
    ipv6: bool,
    default_peer: Option<IpAddr>,
    config: TransportConfig,
    cancel: CancelSlot,
}

impl UdpSocket {
    /// Open a datagram socket with default configuration
    ///
    /// # Errors
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(local_port: u16, default_peer: Option<&str>) -> Result<Self> {
        Self::open_with_config(local_port, default_peer, &TransportConfig::default())
    }

    /// Open a datagram socket on `local_port`, 0 picking an ephemeral port
    ///
    /// `default_peer` is resolved once here and used by sends that name no
    /// peer. It does not filter incoming datagrams.
    ///
    /// # Errors
    /// Returns a resource error if the socket cannot be created or bound and
    /// a resolution error if `default_peer` cannot be resolved. The socket is
    /// closed on every failure path.
    pub fn open_with_config(
        local_port: u16,
        default_peer: Option<&str>,
        config: &TransportConfig,
    ) -> Result<Self> {
        config.validate()?;

        let default_peer = default_peer
            .map(|host| addr::resolve(host, 0, config.prefer_ipv4).map(|a| a.ip()))
            .transpose()?;

        let socket = handle::bind_wildcard(Type::DGRAM, local_port, config, |_| Ok(()))?;
        let local = socket
            .local_addr()
            .map_err(Error::Socket)?
            .as_socket()
            .ok_or_else(|| Error::Socket(io::Error::from(io::ErrorKind::AddrNotAvailable)))?;

        debug!(
            "Datagram socket on port {} (default peer {:?})",
            local.port(),
            default_peer
        );

        Ok(Self {
            socket,
            port: local.port(),
            ipv6: local.is_ipv6(),
            default_peer,
            config: config.clone(),
            cancel: CancelSlot::default(),
        })
    }

    /// Wait up to `timeout` for one datagram
    ///
    /// Returns `Ok(None)` if nothing arrived in time. A zero-length datagram
    /// is a `Some` with empty data and a valid sender.
    ///
    /// # Errors
    /// Fails with [`Error::Pending`] if the socket already holds an error,
    /// [`Error::Recv`] if the peek or receive fails, [`Error::Underrun`] if
    /// fewer bytes arrive than the peek announced, and [`Error::Cancelled`]
    /// if the socket's [`Canceller`] fired.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Datagram>> {
        if let Some(pending) = self.socket.take_error().map_err(Error::Pending)? {
            return Err(Error::Pending(pending));
        }

        let deadline = Instant::now().checked_add(timeout);
        let datagram = loop {
            if !self.cancel.wait_readable(&self.socket, deadline)? {
                trace!("No datagram on port {} within {:?}", self.port, timeout);
                return Ok(None);
            }
            // Another receiver sharing the socket may drain it first
            match self.take_datagram()? {
                Some(datagram) => break datagram,
                None => trace!("Datagram on port {} taken by another receiver", self.port),
            }
        };

        trace!(
            "Received {} byte datagram from {}",
            datagram.len(),
            datagram.sender
        );
        Ok(Some(datagram))
    }

    /// Peek the next datagram's size, then consume it; `None` if the queue
    /// turned out to be empty
    fn take_datagram(&self) -> Result<Option<Datagram>> {
        let (len, from) = match sys::peek_datagram(&self.socket, self.config.max_datagram_size) {
            Ok(peeked) => peeked,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::Recv(e)),
        };
        let sender = Endpoint::from_sockaddr(&from);

        let mut data = vec![0u8; len];
        let received = match sys::recv_nonblocking(&self.socket, &mut data) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::Recv(e)),
        };
        if received != len {
            return Err(Error::Underrun {
                expected: len,
                actual: received,
            });
        }

        Ok(Some(Datagram { data, sender }))
    }

    /// Send `buffers`, concatenated in order, as one datagram
    ///
    /// The destination is `peer` when given, otherwise the default peer from
    /// [`open`](Self::open); `port` applies either way. Returns the datagram
    /// size, which equals the sum of the buffer lengths.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPort`] for port 0, [`Error::NoPeer`] with no
    /// destination, a resolution error for an unknown `peer`,
    /// [`Error::DatagramTooLarge`] above `max_datagram_size`,
    /// [`Error::Send`] if the send fails and [`Error::PartialDatagram`] if the
    /// kernel took fewer bytes than assembled.
    pub fn send<B: AsRef<[u8]>>(
        &self,
        peer: Option<&str>,
        port: u16,
        buffers: &[B],
    ) -> Result<usize> {
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }

        let ip = match peer {
            Some(host) => addr::resolve(host, port, self.config.prefer_ipv4)?.ip(),
            None => self.default_peer.ok_or(Error::NoPeer)?,
        };
        let dest = addr::fit_to_family(SocketAddr::new(ip, port), self.ipv6);

        let expected: usize = buffers.iter().map(|b| b.as_ref().len()).sum();
        if expected > self.config.max_datagram_size {
            return Err(Error::DatagramTooLarge {
                size: expected,
                limit: self.config.max_datagram_size,
            });
        }

        let dest_addr = SockAddr::from(dest);
        let sent = if buffers.len() > MAX_GATHER_SLICES {
            let joined: Vec<u8> = buffers.iter().flat_map(|b| b.as_ref()).copied().collect();
            self.socket.send_to(&joined, &dest_addr)
        } else {
            let slices: Vec<IoSlice<'_>> =
                buffers.iter().map(|b| IoSlice::new(b.as_ref())).collect();
            self.socket.send_to_vectored(&slices, &dest_addr)
        }
        .map_err(Error::Send)?;

        if sent != expected {
            return Err(Error::PartialDatagram { sent, expected });
        }

        trace!(
            "Sent {} byte datagram from {} buffers to {}",
            sent,
            buffers.len(),
            addr::normalize(dest)
        );
        Ok(sent)
    }

    /// Default destination resolved at open time
    #[must_use]
    pub fn default_peer(&self) -> Option<IpAddr> {
        self.default_peer
    }

    /// Port this socket is bound to
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.port
    }

    /// Token that abandons a pending [`receive`](Self::receive)
    ///
    /// # Errors
    /// Returns a resource error if the wake-up channel cannot be created.
    pub fn canceller(&self) -> Result<Canceller> {
        self.cancel.canceller()
    }

    /// Close the socket
    ///
    /// # Errors
    /// Returns [`Error::Close`] if the shutdown fails. The descriptor is
    /// released either way.
    pub fn close(self) -> Result<()> {
        debug!("Closing datagram socket on port {}", self.port);
        handle::shutdown_and_close(self.socket)
    }
}

impl AsRawFd for UdpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn pair() -> (UdpSocket, UdpSocket) {
        let server = UdpSocket::open(0, None).unwrap();
        let client = UdpSocket::open(0, Some("127.0.0.1")).unwrap();
        (server, client)
    }

    #[test]
    fn test_open_ephemeral_port() {
        let socket = UdpSocket::open(0, None).unwrap();
        assert_ne!(socket.local_port(), 0);
        assert!(socket.default_peer().is_none());
        socket.close().unwrap();
    }

    #[test]
    fn test_open_resolves_default_peer() {
        let socket = UdpSocket::open(0, Some("localhost")).unwrap();
        assert_eq!(
            socket.default_peer(),
            Some(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
        );
    }

    #[test]
    fn test_open_unresolvable_peer() {
        let err = UdpSocket::open(0, Some("no-such-host.invalid")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resolution);
    }

    #[test]
    fn test_gather_send_concatenates() {
        let (server, client) = pair();

        let sent = client
            .send(
                None,
                server.local_port(),
                &[&b"UDP request data 1\0"[..], b"UDP request data 2\0"],
            )
            .unwrap();
        assert_eq!(sent, 38);

        let datagram = server.receive(TIMEOUT).unwrap().expect("no datagram");
        assert_eq!(datagram.len(), 38);
        assert_eq!(&datagram.data[..19], b"UDP request data 1\0");
        assert_eq!(&datagram.data[19..], b"UDP request data 2\0");
        assert_eq!(datagram.sender.host, "127.0.0.1");
        assert_eq!(datagram.sender.port, client.local_port());
    }

    #[test]
    fn test_send_to_explicit_peer() {
        let (server, _client) = pair();
        let other = UdpSocket::open(0, None).unwrap();

        let sent = other
            .send(Some("localhost"), server.local_port(), &[b"hello".to_vec()])
            .unwrap();
        assert_eq!(sent, 5);

        let datagram = server.receive(TIMEOUT).unwrap().unwrap();
        assert_eq!(datagram.data, b"hello");
        assert_eq!(datagram.sender.port, other.local_port());
    }

    #[test]
    fn test_reply_to_sender() {
        let (server, client) = pair();
        client.send(None, server.local_port(), &[b"ping"]).unwrap();

        let request = server.receive(TIMEOUT).unwrap().unwrap();
        server
            .send(Some(request.sender.host.as_str()), request.sender.port, &[b"pong"])
            .unwrap();

        let reply = client.receive(TIMEOUT).unwrap().unwrap();
        assert_eq!(reply.data, b"pong");
    }

    #[test]
    fn test_receive_timeout() {
        let socket = UdpSocket::open(0, None).unwrap();
        let start = Instant::now();
        assert!(socket.receive(Duration::from_millis(100)).unwrap().is_none());
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_zero_length_datagram_is_consumed() {
        let (server, client) = pair();
        let empty: [&[u8]; 0] = [];
        assert_eq!(client.send(None, server.local_port(), &empty).unwrap(), 0);
        client.send(None, server.local_port(), &[b"next"]).unwrap();

        let first = server.receive(TIMEOUT).unwrap().unwrap();
        assert!(first.is_empty());
        assert_eq!(first.sender.port, client.local_port());

        let second = server.receive(TIMEOUT).unwrap().unwrap();
        assert_eq!(second.data, b"next");
    }

    #[test]
    fn test_datagrams_keep_boundaries() {
        let (server, client) = pair();
        client.send(None, server.local_port(), &[b"one"]).unwrap();
        client.send(None, server.local_port(), &[b"three"]).unwrap();

        assert_eq!(server.receive(TIMEOUT).unwrap().unwrap().data, b"one");
        assert_eq!(server.receive(TIMEOUT).unwrap().unwrap().data, b"three");
    }

    #[test]
    fn test_many_buffers_are_coalesced() {
        let (server, client) = pair();
        let buffers: Vec<[u8; 1]> = (0..MAX_GATHER_SLICES + 10).map(|i| [i as u8]).collect();

        let sent = client.send(None, server.local_port(), &buffers).unwrap();
        assert_eq!(sent, buffers.len());

        let datagram = server.receive(TIMEOUT).unwrap().unwrap();
        let expected: Vec<u8> = buffers.iter().map(|b| b[0]).collect();
        assert_eq!(datagram.data, expected);
    }

    #[test]
    fn test_send_without_peer() {
        let socket = UdpSocket::open(0, None).unwrap();
        let err = socket.send(None, 9, &[b"x"]).unwrap_err();
        assert!(matches!(err, Error::NoPeer));
    }

    #[test]
    fn test_send_port_zero() {
        let (_server, client) = pair();
        assert!(matches!(
            client.send(None, 0, &[b"x"]),
            Err(Error::InvalidPort(0))
        ));
    }

    #[test]
    fn test_send_too_large() {
        let (server, client) = pair();
        let big = vec![0u8; 40_000];
        let err = client
            .send(None, server.local_port(), &[&big[..], &big[..]])
            .unwrap_err();
        assert!(matches!(err, Error::DatagramTooLarge { size: 80_000, .. }));
        assert_eq!(err.category(), ErrorCategory::Transport);
    }

    #[test]
    fn test_ipv4_only_socket() {
        let config = TransportConfig {
            dual_stack: false,
            ..TransportConfig::default()
        };
        let server = UdpSocket::open_with_config(0, None, &config).unwrap();
        let client = UdpSocket::open_with_config(0, Some("127.0.0.1"), &config).unwrap();

        client.send(None, server.local_port(), &[b"v4"]).unwrap();
        let datagram = server.receive(TIMEOUT).unwrap().unwrap();
        assert_eq!(datagram.data, b"v4");
        assert_eq!(datagram.sender.host, "127.0.0.1");
    }

    #[test]
    fn test_cancel_receive() {
        let socket = UdpSocket::open(0, None).unwrap();
        let token = socket.canceller().unwrap();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let start = Instant::now();
        let result = socket.receive(Duration::from_secs(60));
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(10));
        canceller.join().unwrap();

        // Sticky
        assert!(matches!(
            socket.receive(Duration::from_secs(60)),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_shared_receivers_split_one_datagram() {
        let (server, client) = pair();
        let server = std::sync::Arc::new(server);
        let timeout = Duration::from_millis(500);

        let receivers: Vec<_> = (0..2)
            .map(|_| {
                let server = std::sync::Arc::clone(&server);
                thread::spawn(move || {
                    let start = Instant::now();
                    let got = server.receive(timeout).unwrap();
                    (got, start.elapsed())
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        client.send(None, server.local_port(), &[b"only one"]).unwrap();

        let results: Vec<_> = receivers.into_iter().map(|r| r.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter(|(got, _)| got.is_some()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].0.as_ref().unwrap().data, b"only one");

        // The other receiver keeps waiting out its own deadline
        let (_, waited) = results.iter().find(|(got, _)| got.is_none()).unwrap();
        assert!(*waited >= timeout - Duration::from_millis(50));
    }
}
