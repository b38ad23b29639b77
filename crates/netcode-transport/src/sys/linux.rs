//! Linux and Android backing.

use socket2::{SockAddr, Socket};
use std::io;
use std::mem::MaybeUninit;

/// Flags for stream sends; a vanished peer yields `EPIPE` instead of `SIGPIPE`
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;

/// Per-socket setup for new stream sockets
pub(crate) fn prepare_stream(_socket: &Socket) -> io::Result<()> {
    Ok(())
}

/// Report the size and sender of the next datagram without consuming it
///
/// `MSG_TRUNC` makes the kernel return the real datagram length even
/// though nothing is copied out.
pub(crate) fn peek_datagram(socket: &Socket, _scratch_len: usize) -> io::Result<(usize, SockAddr)> {
    let mut empty: [MaybeUninit<u8>; 0] = [];
    socket.recv_from_with_flags(
        &mut empty,
        libc::MSG_PEEK | libc::MSG_TRUNC | libc::MSG_DONTWAIT,
    )
}
