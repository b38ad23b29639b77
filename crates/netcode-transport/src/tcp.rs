//! Stream (TCP) transport.
//!
//! Blocking sockets with deadline-bounded waits:
//! - [`TcpListener::listen`] binds every local address with a small backlog
//! - [`TcpListener::accept`] waits up to a timeout for one connection
//! - [`TcpStream::connect`] makes a single connection attempt
//! - [`TcpStream::write`] is one no-signal send, possibly short
//! - [`TcpStream::read`] fills the buffer or gives up at the deadline

use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::addr::{self, Endpoint};
use crate::cancel::{CancelSlot, Canceller};
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::handle;
use crate::sys;

/// Passive stream socket
///
/// # Examples
/// ```no_run
/// use netcode_transport::TcpListener;
/// use std::time::Duration;
///
/// # fn main() -> netcode_transport::Result<()> {
/// let listener = TcpListener::listen(8080)?;
/// match listener.accept(Duration::from_secs(10))? {
///     Some(accepted) => println!("Remote party is {}", accepted.remote),
///     None => println!("No connection received on 8080"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TcpListener {
    socket: Socket,
    port: u16,
    config: TransportConfig,
    cancel: CancelSlot,
}

/// A connection taken from a [`TcpListener`]
#[derive(Debug)]
pub struct Accepted {
    /// The connected stream
    pub stream: TcpStream,
    /// Address and port of the remote peer
    pub remote: Endpoint,
}

impl TcpListener {
    /// Listen on `port` on every local address with default configuration
    ///
    /// # Errors
    /// Returns [`Error::InvalidPort`] for port 0, or a resource error if the
    /// socket cannot be created, bound or made passive.
    pub fn listen(port: u16) -> Result<Self> {
        Self::listen_with_config(port, &TransportConfig::default())
    }

    /// Listen on `port` on every local address
    ///
    /// # Errors
    /// Returns [`Error::InvalidPort`] for port 0, or a resource error if the
    /// socket cannot be created, bound or made passive. The socket is closed
    /// on every failure path.
    pub fn listen_with_config(port: u16, config: &TransportConfig) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }
        config.validate()?;

        let socket = handle::bind_wildcard(Type::STREAM, port, config, |s| {
            if config.reuse_address {
                s.set_reuse_address(true)?;
            }
            Ok(())
        })?;

        socket
            .listen(config.listen_backlog)
            .map_err(Error::Listen)?;
        // Readiness can be stale by the time accept runs
        socket.set_nonblocking(true).map_err(Error::Listen)?;

        debug!(
            "Listening on port {} (backlog {})",
            port, config.listen_backlog
        );

        Ok(Self {
            socket,
            port,
            config: config.clone(),
            cancel: CancelSlot::default(),
        })
    }

    /// Wait up to `timeout` for one incoming connection
    ///
    /// Returns `Ok(None)` if nothing arrived in time; the listener stays
    /// usable.
    ///
    /// # Errors
    /// Returns an error if the wait or the accept fails, or
    /// [`Error::Cancelled`] if the listener's [`Canceller`] fired.
    pub fn accept(&self, timeout: Duration) -> Result<Option<Accepted>> {
        let deadline = Instant::now().checked_add(timeout);
        let (socket, peer) = loop {
            if !self.cancel.wait_readable(&self.socket, deadline)? {
                trace!("No connection on port {} within {:?}", self.port, timeout);
                return Ok(None);
            }

            match self.socket.accept() {
                Ok(pair) => break pair,
                // Taken by another acceptor or aborted before we got to it
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock
                            | std::io::ErrorKind::Interrupted
                            | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    trace!("Pending connection on port {} vanished", self.port);
                }
                Err(e) => return Err(Error::Accept(e)),
            }
        };

        // Some platforms let accepted sockets inherit O_NONBLOCK
        socket.set_nonblocking(false).map_err(Error::Accept)?;
        sys::prepare_stream(&socket).map_err(Error::Accept)?;

        let remote = Endpoint::from_sockaddr(&peer);
        debug!("Accepted connection from {} on port {}", remote, self.port);

        Ok(Some(Accepted {
            stream: TcpStream::from_socket(socket, peer.as_socket(), self.config.clone()),
            remote,
        }))
    }

    /// Port this listener is bound to
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.port
    }

    /// Token that abandons a pending [`accept`](Self::accept)
    ///
    /// # Errors
    /// Returns a resource error if the wake-up channel cannot be created.
    pub fn canceller(&self) -> Result<Canceller> {
        self.cancel.canceller()
    }

    /// Close the listener
    ///
    /// # Errors
    /// Returns [`Error::Close`] if shutting the socket down fails. The
    /// descriptor is released either way.
    pub fn close(self) -> Result<()> {
        debug!("Closing listener on port {}", self.port);
        handle::shutdown_and_close(self.socket)
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// Connected stream socket
#[derive(Debug)]
pub struct TcpStream {
    socket: Socket,
    peer: Option<SocketAddr>,
    config: TransportConfig,
    cancel: CancelSlot,
}

impl TcpStream {
    fn from_socket(socket: Socket, peer: Option<SocketAddr>, config: TransportConfig) -> Self {
        Self {
            socket,
            peer,
            config,
            cancel: CancelSlot::default(),
        }
    }

    /// Connect to `host` on `port` with default configuration
    ///
    /// # Errors
    /// See [`connect_with_config`](Self::connect_with_config).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, &TransportConfig::default())
    }

    /// Connect to `host` on `port`
    ///
    /// `host` may be a literal address or a name. It is resolved to a single
    /// address and exactly one blocking connection attempt is made; other
    /// resolved addresses are not tried.
    ///
    /// # Errors
    /// Returns a resolution error if `host` cannot be resolved and
    /// [`Error::Connect`] if the attempt fails. The socket is closed on
    /// failure.
    pub fn connect_with_config(host: &str, port: u16, config: &TransportConfig) -> Result<Self> {
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }
        config.validate()?;

        let addr = addr::resolve(host, port, config.prefer_ipv4)?;

        let socket =
            Socket::new(Domain::for_address(addr), Type::STREAM, None).map_err(Error::Socket)?;
        sys::prepare_stream(&socket).map_err(Error::Socket)?;

        socket
            .connect(&addr.into())
            .map_err(|source| Error::Connect { addr, source })?;

        debug!("Connected to {} ({})", host, addr);

        Ok(Self::from_socket(socket, Some(addr), config.clone()))
    }

    /// Send `data` with a single call
    ///
    /// Returns how many bytes the kernel accepted, which may be fewer than
    /// `data.len()`; there is no retry loop. A vanished peer surfaces as an
    /// error, never as a signal.
    ///
    /// # Errors
    /// Returns [`Error::Send`] if the send call fails.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let sent = self
            .socket
            .send_with_flags(data, sys::SEND_FLAGS)
            .map_err(Error::Send)?;
        trace!("Sent {} of {} bytes", sent, data.len());
        Ok(sent)
    }

    /// Read up to `buf.len()` bytes within `timeout`
    ///
    /// Waits for readability against a single deadline `timeout` from now,
    /// then drains whatever is queued without blocking, and repeats until
    /// the buffer is full or `read_idle_waits` waits came back empty. Once the
    /// deadline has passed each wait is a non-blocking check, so data
    /// trickling in shortly after the deadline is still collected.
    ///
    /// Returns the number of bytes read, 0 if nothing arrived in time. A
    /// peer disconnect or receive error after some bytes arrived ends the
    /// read early with those bytes.
    ///
    /// # Errors
    /// Fails immediately with [`Error::Pending`] if the socket already holds
    /// an error. Returns [`Error::PeerClosed`] if the peer disconnected
    /// before any byte arrived, [`Error::Recv`] on a receive failure with
    /// nothing read, and [`Error::Cancelled`] if the stream's [`Canceller`]
    /// fired.
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if let Some(pending) = self.socket.take_error().map_err(Error::Pending)? {
            return Err(Error::Pending(pending));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now().checked_add(timeout);
        let mut filled = 0;
        let mut idle_waits = self.config.read_idle_waits;

        while filled < buf.len() && idle_waits > 0 {
            if !self.cancel.wait_readable(&self.socket, deadline)? {
                idle_waits -= 1;
                continue;
            }

            match sys::recv_nonblocking(&self.socket, &mut buf[filled..]) {
                // Readable but empty: the peer has gone
                Ok(0) if filled > 0 => break,
                Ok(0) => return Err(Error::PeerClosed),
                Ok(n) => {
                    filled += n;
                    trace!("Read {} bytes ({} of {})", n, filled, buf.len());
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                    ) => {}
                Err(_) if filled > 0 => break,
                Err(e) => return Err(Error::Recv(e)),
            }
        }

        debug!("Read returned {} of {} bytes", filled, buf.len());
        Ok(filled)
    }

    /// Read up to `max_len` bytes within `timeout` into a new vector
    ///
    /// # Errors
    /// See [`read`](Self::read).
    pub fn read_to_vec(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        let n = self.read(&mut buf, timeout)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Address of the remote peer
    #[must_use]
    pub fn peer_endpoint(&self) -> Option<Endpoint> {
        self.peer.map(Endpoint::from_socket_addr)
    }

    /// Local port of the connection
    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        handle::local_port(&self.socket)
    }

    /// Token that abandons a pending [`read`](Self::read)
    ///
    /// # Errors
    /// Returns a resource error if the wake-up channel cannot be created.
    pub fn canceller(&self) -> Result<Canceller> {
        self.cancel.canceller()
    }

    /// Shut down both directions and close the stream
    ///
    /// # Errors
    /// Returns [`Error::Close`] if the shutdown fails. The descriptor is
    /// released either way.
    pub fn close(self) -> Result<()> {
        if let Some(peer) = self.peer {
            debug!("Closing connection to {}", addr::normalize(peer));
        }
        handle::shutdown_and_close(self.socket)
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
