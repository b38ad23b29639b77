//! Error types for the netcode transport layer.
//!
//! Every fallible call returns an explicit [`Error`]. Callers that want the
//! classic "last error" view (code plus message, consulted after a failing
//! call) can keep an [`ErrorState`] and feed results through
//! [`ErrorState::track`]. There is no process-wide error slot.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use crate::sys;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum Error {
    /// Port number not usable for the operation
    #[error("invalid port: {0}")]
    InvalidPort(u16),

    /// Socket allocation failed
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),

    /// Binding to a local port failed
    #[error("failed to bind to port {port}: {source}")]
    Bind {
        /// Local port requested
        port: u16,
        /// Underlying OS error
        source: io::Error,
    },

    /// Marking a socket passive failed
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Host name lookup failed
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// Host that was looked up
        host: String,
        /// Underlying resolver error
        source: ResolveError,
    },

    /// Host name lookup succeeded but returned no usable address
    #[error("no address found for {0}")]
    NoAddress(String),

    /// Connection attempt failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Resolved address of the server
        addr: SocketAddr,
        /// Underlying OS error
        source: io::Error,
    },

    /// Accepting a pending connection failed
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Waiting for readiness failed
    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),

    /// The socket already carried a pending error before the call
    #[error("pending socket error: {0}")]
    Pending(#[source] io::Error),

    /// Send call failed
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// Receive call failed
    #[error("receive failed: {0}")]
    Recv(#[source] io::Error),

    /// Peer disconnected before any data arrived
    #[error("connection closed by peer")]
    PeerClosed,

    /// A datagram was only partially handed to the kernel
    #[error("partial datagram: sent {sent} of {expected} bytes")]
    PartialDatagram {
        /// Bytes accepted by the kernel
        sent: usize,
        /// Bytes in the assembled datagram
        expected: usize,
    },

    /// Assembled datagram is larger than the configured limit
    #[error("datagram of {size} bytes exceeds limit of {limit} bytes")]
    DatagramTooLarge {
        /// Total size of all buffers
        size: usize,
        /// Configured `max_datagram_size`
        limit: usize,
    },

    /// The consuming receive returned fewer bytes than the peek announced
    #[error("receive underrun: expected {expected} bytes, got {actual}")]
    Underrun {
        /// Size reported by the size-discovering peek
        expected: usize,
        /// Size returned by the real receive
        actual: usize,
    },

    /// No destination given and the socket has no default peer
    #[error("no destination host and no default peer")]
    NoPeer,

    /// Shutting down the socket failed
    #[error("failed to close socket: {0}")]
    Close(#[source] io::Error),

    /// The wait was woken by a [`Canceller`](crate::Canceller)
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration values are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read or parsed
    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by getaddrinfo(3)
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Resolver failure with its `EAI_*` code
    #[error("{message}")]
    Lookup {
        /// `getaddrinfo` result code
        code: i32,
        /// Resolver description of `code`
        message: String,
    },

    /// `EAI_SYSTEM`: the OS error that stopped the lookup
    #[error(transparent)]
    System(io::Error),
}

impl ResolveError {
    pub(crate) fn from_code(code: i32) -> Self {
        Self::Lookup {
            code,
            message: sys::resolver_error_message(code),
        }
    }
}

/// Broad class of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Socket allocation, bind or listen failure; the handle is unusable
    Resource,
    /// Host name lookup failure
    Resolution,
    /// Peer reset, partial datagram, receive underrun and other I/O failures
    Transport,
    /// Wait abandoned through a cancellation token
    Cancelled,
    /// Bad configuration
    Config,
}

/// Numbering space an error code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// OS `errno` values
    Os,
    /// `getaddrinfo` result codes
    Resolver,
}

impl Error {
    /// Category of this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPort(_)
            | Self::Socket(_)
            | Self::Bind { .. }
            | Self::Listen(_) => ErrorCategory::Resource,
            Self::Resolve { .. } | Self::NoAddress(_) => ErrorCategory::Resolution,
            Self::Connect { .. }
            | Self::Accept(_)
            | Self::Wait(_)
            | Self::Pending(_)
            | Self::Send(_)
            | Self::Recv(_)
            | Self::PeerClosed
            | Self::PartialDatagram { .. }
            | Self::DatagramTooLarge { .. }
            | Self::Underrun { .. }
            | Self::NoPeer
            | Self::Close(_) => ErrorCategory::Transport,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::InvalidConfig(_) | Self::ConfigLoad(_) => ErrorCategory::Config,
        }
    }

    /// Numbering space of [`Error::code`]
    #[must_use]
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            Self::Resolve {
                source: ResolveError::Lookup { .. },
                ..
            }
            | Self::NoAddress(_) => ErrorOrigin::Resolver,
            _ => ErrorOrigin::Os,
        }
    }

    /// Numeric error code, never zero
    ///
    /// OS failures report their `errno`. Failures detected by this crate map
    /// onto the closest `errno` (for example `ECONNRESET` for a peer that
    /// disconnected). Resolver failures report the `getaddrinfo` code
    /// unchanged, except `EAI_SYSTEM` which reports the `errno` behind it;
    /// check [`Error::origin`] before interpreting the value.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidPort(_) | Self::InvalidConfig(_) | Self::ConfigLoad(_) => libc::EINVAL,
            Self::Socket(e)
            | Self::Listen(e)
            | Self::Accept(e)
            | Self::Wait(e)
            | Self::Pending(e)
            | Self::Send(e)
            | Self::Recv(e)
            | Self::Close(e)
            | Self::Bind { source: e, .. }
            | Self::Connect { source: e, .. } => os_code(e),
            Self::Resolve { source, .. } => match source {
                ResolveError::Lookup { code, .. } => *code,
                ResolveError::System(e) => os_code(e),
            },
            Self::NoAddress(_) => libc::EAI_NONAME,
            Self::PeerClosed => libc::ECONNRESET,
            Self::PartialDatagram { .. } | Self::DatagramTooLarge { .. } => libc::EMSGSIZE,
            Self::Underrun { .. } => libc::EIO,
            Self::NoPeer => libc::EDESTADDRREQ,
            Self::Cancelled => libc::ECANCELED,
        }
    }

    /// Whether the failure came from the peer going away
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::PeerClosed => true,
            Self::Send(e) | Self::Recv(e) | Self::Pending(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

fn os_code(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Render an error code as a human-readable message
///
/// OS codes use the platform `errno` table, resolver codes use
/// `gai_strerror`.
#[must_use]
pub fn describe(code: i32, origin: ErrorOrigin) -> String {
    match origin {
        ErrorOrigin::Os => sys::os_error_message(code),
        ErrorOrigin::Resolver => sys::resolver_error_message(code),
    }
}

#[derive(Debug, Clone)]
struct LastError {
    code: i32,
    origin: ErrorOrigin,
    message: String,
}

/// Caller-owned "last error" record
///
/// Holds the code and message of the most recent failure fed into it. Each
/// thread or component keeps its own instance; nothing is shared implicitly.
///
/// # Examples
/// ```no_run
/// use netcode_transport::{ErrorState, TcpStream};
///
/// let mut errors = ErrorState::new();
/// if errors.track(TcpStream::connect("example.invalid", 80)).is_err() {
///     eprintln!("connect failed: [{}:{}]", errors.code(), errors.message());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorState {
    last: Option<LastError>,
}

impl ErrorState {
    /// Create an empty error state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the stored error
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Code of the stored error, or 0 when clear
    #[must_use]
    pub fn code(&self) -> i32 {
        self.last.as_ref().map_or(0, |last| last.code)
    }

    /// Numbering space of the stored code
    #[must_use]
    pub fn origin(&self) -> Option<ErrorOrigin> {
        self.last.as_ref().map(|last| last.origin)
    }

    /// Message of the stored error, or `"no error"` when clear
    #[must_use]
    pub fn message(&self) -> String {
        self.last
            .as_ref()
            .map_or_else(|| "no error".to_string(), |last| last.message.clone())
    }

    /// Whether an error is stored
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.last.is_some()
    }

    /// Store `err` as the last error
    pub fn record(&mut self, err: &Error) {
        self.last = Some(LastError {
            code: err.code(),
            origin: err.origin(),
            message: err.to_string(),
        });
    }

    /// Record the error of a failing result and pass the result through
    pub fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            self.record(e);
        }
        result
    }
}
