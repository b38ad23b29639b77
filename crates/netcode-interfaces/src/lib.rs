//! # Netcode Interfaces
//!
//! Lists the host's network interfaces as flat records: normalised flags
//! plus numeric address strings. Each call reads the current state; nothing
//! is cached.
//!
//! ```no_run
//! # fn main() -> Result<(), netcode_interfaces::InterfaceError> {
//! for record in netcode_interfaces::list_interfaces()? {
//!     println!("{}: {} / {}", record.name, record.address, record.netmask);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod flags;

pub use flags::InterfaceFlags;

use nix::ifaddrs::{InterfaceAddress, getifaddrs};
use nix::sys::socket::{SockaddrLike, SockaddrStorage};
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use thiserror::Error;
use tracing::{debug, trace};

/// Interface enumeration errors
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// The OS refused to list interfaces
    #[error("Failed to enumerate interfaces: {0}")]
    Enumerate(#[from] nix::errno::Errno),
}

impl InterfaceError {
    /// OS error code behind this error
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Enumerate(errno) => *errno as i32,
        }
    }
}

/// Result type for interface enumeration
pub type Result<T> = std::result::Result<T, InterfaceError>;

/// One address of one local interface
///
/// An interface with several addresses yields one record per address.
/// `broadcast` and `peer_address` are empty when not applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    /// Normalised flags
    pub flags: InterfaceFlags,
    /// Interface name, e.g. `lo` or `eth0`
    pub name: String,
    /// Numeric address
    pub address: String,
    /// Numeric netmask
    pub netmask: String,
    /// Broadcast address
    pub broadcast: String,
    /// Far end of a point-to-point link
    pub peer_address: String,
}

impl InterfaceRecord {
    /// Whether the interface is up
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.flags.contains(InterfaceFlags::UP)
    }

    /// Whether this is a loopback interface
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.flags.contains(InterfaceFlags::LOOPBACK)
    }

    /// The address parsed back to an [`IpAddr`]
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.address.parse().ok()
    }

    fn from_os(entry: &InterfaceAddress) -> Option<Self> {
        let address = ip_of(entry.address.as_ref())?;
        Some(Self {
            flags: InterfaceFlags::from_os(entry.flags),
            name: entry.interface_name.clone(),
            address: address.to_string(),
            netmask: format_optional(entry.netmask.as_ref()),
            broadcast: format_optional(entry.broadcast.as_ref()),
            peer_address: format_optional(entry.destination.as_ref()),
        })
    }
}

fn ip_of(addr: Option<&SockaddrStorage>) -> Option<IpAddr> {
    let addr = addr?;
    if let Some(sin) = addr.as_sockaddr_in() {
        return Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
    }
    if let Some(sin6) = addr.as_sockaddr_in6() {
        return Some(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()));
    }
    None
}

fn format_optional(addr: Option<&SockaddrStorage>) -> String {
    ip_of(addr).map(|ip| ip.to_string()).unwrap_or_default()
}

/// List every IPv4 and IPv6 address of every local interface
///
/// Link-layer and other non-IP entries are skipped.
///
/// # Errors
/// Returns [`InterfaceError::Enumerate`] if the OS listing fails.
pub fn list_interfaces() -> Result<Vec<InterfaceRecord>> {
    let mut records = Vec::new();
    for entry in getifaddrs()? {
        match InterfaceRecord::from_os(&entry) {
            Some(record) => records.push(record),
            None => trace!(
                "Skipping {} (family {:?})",
                entry.interface_name,
                entry.address.as_ref().and_then(SockaddrLike::family)
            ),
        }
    }
    debug!("Enumerated {} interface addresses", records.len());
    Ok(records)
}

/// Records of the interface called `name`
///
/// # Errors
/// Returns [`InterfaceError::Enumerate`] if the OS listing fails.
pub fn find_interface(name: &str) -> Result<Vec<InterfaceRecord>> {
    Ok(list_interfaces()?
        .into_iter()
        .filter(|r| r.name == name)
        .collect())
}
