//! Backing for Unix platforms without `MSG_TRUNC` length reporting.

use socket2::{SockAddr, Socket};
use std::io;
use std::mem::MaybeUninit;

/// Flags for stream sends
#[cfg(target_vendor = "apple")]
pub(crate) const SEND_FLAGS: libc::c_int = 0;

/// Flags for stream sends; a vanished peer yields `EPIPE` instead of `SIGPIPE`
#[cfg(not(target_vendor = "apple"))]
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;

/// Per-socket setup for new stream sockets
///
/// Apple platforms have no per-call no-signal flag, so the option is set on
/// the socket itself.
pub(crate) fn prepare_stream(socket: &Socket) -> io::Result<()> {
    #[cfg(target_vendor = "apple")]
    socket.set_nosigpipe(true)?;
    #[cfg(not(target_vendor = "apple"))]
    let _ = socket;
    Ok(())
}

/// Report the size and sender of the next datagram without consuming it
///
/// Peeks into a scratch buffer of `scratch_len` bytes; datagrams larger than
/// that are reported as `scratch_len` long.
pub(crate) fn peek_datagram(socket: &Socket, scratch_len: usize) -> io::Result<(usize, SockAddr)> {
    let mut scratch = vec![MaybeUninit::<u8>::uninit(); scratch_len];
    socket.recv_from_with_flags(&mut scratch, libc::MSG_PEEK | libc::MSG_DONTWAIT)
}
