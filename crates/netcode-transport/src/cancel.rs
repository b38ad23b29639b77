//! Cancellation tokens for blocked waits.
//!
//! A [`Canceller`] belongs to one handle. Calling [`Canceller::cancel`] from
//! any thread wakes a thread blocked in that handle's `accept`, `read` or
//! `receive`, which then fails with [`Error::Cancelled`]. Cancellation is
//! sticky: every later wait on the handle fails the same way without
//! blocking.
//!
//! The wake-up uses a socket pair whose read end is polled together with the
//! handle's socket. The pair is created on the first call to `canceller()`,
//! so handles that are never cancelled pay nothing.

use socket2::Socket;
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sys::{self, Readiness};

#[derive(Debug)]
struct Shared {
    cancelled: AtomicBool,
    reader: UnixStream,
    writer: UnixStream,
}

/// Cloneable token that abandons waits on one handle
///
/// # Examples
/// ```no_run
/// use netcode_transport::UdpSocket;
/// use std::time::Duration;
///
/// # fn main() -> netcode_transport::Result<()> {
/// let socket = UdpSocket::open(0, None)?;
/// let canceller = socket.canceller()?;
///
/// std::thread::spawn(move || {
///     std::thread::sleep(Duration::from_millis(100));
///     canceller.cancel();
/// });
///
/// // Returns Error::Cancelled after ~100ms instead of waiting 60s
/// assert!(socket.receive(Duration::from_secs(60)).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Canceller {
    shared: Arc<Shared>,
}

impl Canceller {
    fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                reader,
                writer,
            }),
        })
    }

    /// Wake the current wait and fail all later ones
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
            // The byte is never drained, so the read end stays readable
            let _ = (&self.shared.writer).write(&[1]);
            debug!("Cancellation requested");
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    fn wake_fd(&self) -> BorrowedFd<'_> {
        self.shared.reader.as_fd()
    }
}

/// Per-handle holder of a lazily created [`Canceller`]
#[derive(Debug, Default)]
pub(crate) struct CancelSlot {
    inner: OnceLock<Canceller>,
}

impl CancelSlot {
    /// Token for this handle, creating it on first use
    pub(crate) fn canceller(&self) -> Result<Canceller> {
        if let Some(existing) = self.inner.get() {
            return Ok(existing.clone());
        }
        let fresh = Canceller::new().map_err(Error::Socket)?;
        // Another thread may have won the race; its token is kept
        Ok(self.inner.get_or_init(|| fresh).clone())
    }

    /// Fail fast if the handle was cancelled
    pub(crate) fn check(&self) -> Result<()> {
        match self.inner.get() {
            Some(c) if c.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Wait for `socket` to become readable before `deadline`
    ///
    /// Returns `Ok(true)` when readable and `Ok(false)` on timeout.
    pub(crate) fn wait_readable(&self, socket: &Socket, deadline: Option<Instant>) -> Result<bool> {
        self.check()?;
        let wake = self.inner.get().map(Canceller::wake_fd);
        match sys::wait_readable_until(socket, wake, deadline).map_err(Error::Wait)? {
            Readiness::Ready => Ok(true),
            Readiness::TimedOut => Ok(false),
            Readiness::Woken => Err(Error::Cancelled),
        }
    }
}
