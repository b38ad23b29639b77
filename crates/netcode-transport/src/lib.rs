//! # Netcode Transport
//!
//! Deadline-bounded socket transport over TCP and UDP.
//!
//! This crate provides:
//! - Stream sockets: listen, accept with a timeout, connect, best-effort
//!   write and a "fill the buffer or give up" read
//! - Datagram sockets: size-discovering receive and gather-send of several
//!   buffers as one datagram
//! - Numeric address formatting that normalises IPv4-mapped IPv6 peers
//! - Explicit error values plus an optional [`ErrorState`] context object
//! - Cancellation tokens that wake a blocked wait on another thread
//!
//! Timeouts are not errors: `accept` and `receive` return `Ok(None)` and
//! `read` returns whatever accumulated.
//!
//! ```no_run
//! use netcode_transport::tcp::{TcpListener, TcpStream};
//! use std::time::Duration;
//!
//! # fn main() -> netcode_transport::Result<()> {
//! let listener = TcpListener::listen(55155)?;
//! let mut client = TcpStream::connect("localhost", 55155)?;
//! client.write(b"TCP request data")?;
//!
//! if let Some(accepted) = listener.accept(Duration::from_secs(5))? {
//!     let mut server = accepted.stream;
//!     let data = server.read_to_vec(8191, Duration::from_secs(5))?;
//!     println!("{} bytes from {}", data.len(), accepted.remote);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(not(unix))]
compile_error!("netcode-transport currently supports Unix platforms only");

pub mod addr;
pub mod cancel;
pub mod config;
pub mod error;
pub mod tcp;
pub mod udp;

mod handle;
mod sys;

pub use addr::{Endpoint, UNKNOWN_FAMILY, format_sockaddr, resolve};
pub use cancel::Canceller;
pub use config::TransportConfig;
pub use error::{Error, ErrorCategory, ErrorOrigin, ErrorState, ResolveError, Result, describe};
pub use tcp::{Accepted, TcpListener, TcpStream};
pub use udp::{Datagram, UdpSocket};
