//! Platform socket primitives.
//!
//! One interface, two backings selected at build time: `linux` for
//! Linux/Android and `portable` for every other Unix. Callers never see raw
//! OS flags.

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socket2::Socket;
use std::ffi::{CStr, CString};
use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{AsFd, BorrowedFd};
use std::ptr;
use std::time::{Duration, Instant};

use crate::error::ResolveError;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use linux::{SEND_FLAGS, peek_datagram, prepare_stream};

#[cfg(not(any(target_os = "linux", target_os = "android")))]
mod portable;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) use portable::{SEND_FLAGS, peek_datagram, prepare_stream};

/// Outcome of a readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// The socket is readable, or has an error or hang-up to report
    Ready,
    /// The deadline passed with nothing to read
    TimedOut,
    /// The cancellation descriptor fired
    Woken,
}

/// Wait until `socket` is readable or `deadline` passes
///
/// A `None` deadline waits indefinitely. A deadline already in the past
/// performs a single non-blocking check.
pub(crate) fn wait_readable_until(
    socket: &Socket,
    wake: Option<BorrowedFd<'_>>,
    deadline: Option<Instant>,
) -> io::Result<Readiness> {
    // Without a wake descriptor only the first entry is polled
    let mut fds = [
        PollFd::new(socket.as_fd(), PollFlags::POLLIN),
        PollFd::new(wake.unwrap_or(socket.as_fd()), PollFlags::POLLIN),
    ];
    let watched = if wake.is_some() { 2 } else { 1 };

    loop {
        let timeout = match deadline {
            Some(deadline) => poll_timeout(deadline.saturating_duration_since(Instant::now())),
            None => PollTimeout::NONE,
        };

        match poll(&mut fds[..watched], timeout) {
            Ok(0) => return Ok(Readiness::TimedOut),
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno.into()),
        }
        if watched == 2 && fds[1].any().unwrap_or(true) {
            return Ok(Readiness::Woken);
        }
        if fds[0]
            .revents()
            .is_some_and(|revents| revents.contains(PollFlags::POLLNVAL))
        {
            return Err(Errno::EBADF.into());
        }
        return Ok(Readiness::Ready);
    }
}

/// Timeout for poll(2), rounded up so short waits never become busy loops
fn poll_timeout(remaining: Duration) -> PollTimeout {
    let mut ms = remaining.as_millis();
    if remaining.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    PollTimeout::try_from(ms).unwrap_or(PollTimeout::MAX)
}

/// Look up `host` with getaddrinfo(3)
///
/// Returns every stream address in resolver order with `port` filled in.
/// Failures keep the resolver's `EAI_*` code; `EAI_SYSTEM` is reported as
/// the OS error behind it.
pub(crate) fn lookup_host(
    host: &str,
    port: u16,
) -> std::result::Result<Vec<SocketAddr>, ResolveError> {
    let c_host = CString::new(host).map_err(|_| ResolveError::from_code(libc::EAI_NONAME))?;

    // SAFETY: an all-zero `addrinfo` is the documented "no hints" value.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut list: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: `c_host` is NUL-terminated, `hints` is initialised and `list`
    // receives a result list that is released with freeaddrinfo below.
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), ptr::null(), &hints, &mut list) };
    if rc == libc::EAI_SYSTEM {
        return Err(ResolveError::System(io::Error::last_os_error()));
    }
    if rc != 0 {
        return Err(ResolveError::from_code(rc));
    }

    let mut addrs = Vec::new();
    let mut node = list;
    while !node.is_null() {
        // SAFETY: `node` is a live entry of the list returned above.
        let info = unsafe { &*node };
        if let Some(addr) = socket_addr_from_info(info, port) {
            addrs.push(addr);
        }
        node = info.ai_next;
    }

    // SAFETY: `list` came from a successful getaddrinfo and is freed once.
    unsafe { libc::freeaddrinfo(list) };
    Ok(addrs)
}

fn socket_addr_from_info(info: &libc::addrinfo, port: u16) -> Option<SocketAddr> {
    if info.ai_addr.is_null() {
        return None;
    }
    match info.ai_family {
        libc::AF_INET => {
            // SAFETY: AF_INET entries point at a `sockaddr_in`.
            let sin = unsafe { &*(info.ai_addr as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        libc::AF_INET6 => {
            // SAFETY: AF_INET6 entries point at a `sockaddr_in6`.
            let sin6 = unsafe { &*(info.ai_addr as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// View an initialised byte buffer as a receive buffer
pub(crate) fn as_uninit_mut(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: `MaybeUninit<u8>` has the same layout as `u8`, and the socket
    // calls only ever write initialised bytes into the slice.
    unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) }
}

/// Receive whatever is queued without blocking
pub(crate) fn recv_nonblocking(socket: &Socket, buf: &mut [u8]) -> io::Result<usize> {
    socket.recv_with_flags(as_uninit_mut(buf), libc::MSG_DONTWAIT)
}

/// Message for an OS `errno` value
pub(crate) fn os_error_message(code: i32) -> String {
    let msg = io::Error::from_raw_os_error(code).to_string();
    match msg.rfind(" (os error ") {
        Some(idx) => msg[..idx].to_string(),
        None => msg,
    }
}

/// Message for a `getaddrinfo` result code
pub(crate) fn resolver_error_message(code: i32) -> String {
    // SAFETY: gai_strerror accepts any code and returns either null or a
    // pointer to a static NUL-terminated string.
    let ptr = unsafe { libc::gai_strerror(code) };
    if ptr.is_null() {
        return format!("resolver error {code}");
    }
    // SAFETY: non-null pointers from gai_strerror reference static C strings.
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}
