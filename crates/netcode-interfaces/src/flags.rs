//! Platform-independent interface flags.

use bitflags::bitflags;
use nix::net::if_::InterfaceFlags as OsFlags;

bitflags! {
    /// Capability and state flags of a network interface
    ///
    /// Bit positions are fixed across platforms, so callers can test and
    /// store them without knowing the OS encoding. Flags a platform does not
    /// have are simply never set there.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InterfaceFlags: u64 {
        /// Administratively up
        const UP = 1 << 0;
        /// Broadcast address is valid
        const BROADCAST = 1 << 1;
        /// Debugging enabled
        const DEBUG = 1 << 2;
        /// Loopback interface
        const LOOPBACK = 1 << 3;
        /// Point-to-point link
        const POINTOPOINT = 1 << 4;
        /// Resources allocated
        const RUNNING = 1 << 5;
        /// No ARP protocol
        const NOARP = 1 << 6;
        /// Receives all packets
        const PROMISC = 1 << 7;
        /// Avoids trailers
        const NOTRAILERS = 1 << 8;
        /// Receives all multicast packets
        const ALLMULTI = 1 << 9;
        /// Load-balancing master
        const MASTER = 1 << 10;
        /// Load-balancing slave
        const SLAVE = 1 << 11;
        /// Supports multicast
        const MULTICAST = 1 << 12;
        /// Can select media type
        const PORTSEL = 1 << 13;
        /// Auto media selection active
        const AUTOMEDIA = 1 << 14;
        /// Addresses are lost when the interface goes down
        const DYNAMIC = 1 << 15;
        /// Driver signals L1 up
        const LOWER_UP = 1 << 16;
        /// Driver signals dormant
        const DORMANT = 1 << 17;
        /// Echoes sent packets
        const ECHO = 1 << 18;
    }
}

impl InterfaceFlags {
    /// Translate the flags reported by the OS
    ///
    /// Raw bits with no counterpart here are dropped.
    #[must_use]
    pub fn from_os(raw: OsFlags) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::UP, raw.contains(OsFlags::IFF_UP));
        flags.set(Self::BROADCAST, raw.contains(OsFlags::IFF_BROADCAST));
        flags.set(Self::DEBUG, raw.contains(OsFlags::IFF_DEBUG));
        flags.set(Self::LOOPBACK, raw.contains(OsFlags::IFF_LOOPBACK));
        flags.set(Self::POINTOPOINT, raw.contains(OsFlags::IFF_POINTOPOINT));
        flags.set(Self::RUNNING, raw.contains(OsFlags::IFF_RUNNING));
        flags.set(Self::NOARP, raw.contains(OsFlags::IFF_NOARP));
        flags.set(Self::PROMISC, raw.contains(OsFlags::IFF_PROMISC));
        flags.set(Self::ALLMULTI, raw.contains(OsFlags::IFF_ALLMULTI));
        flags.set(Self::MULTICAST, raw.contains(OsFlags::IFF_MULTICAST));

        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios"
        ))]
        flags.set(Self::NOTRAILERS, raw.contains(OsFlags::IFF_NOTRAILERS));

        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            flags.set(Self::MASTER, raw.contains(OsFlags::IFF_MASTER));
            flags.set(Self::SLAVE, raw.contains(OsFlags::IFF_SLAVE));
            flags.set(Self::PORTSEL, raw.contains(OsFlags::IFF_PORTSEL));
            flags.set(Self::AUTOMEDIA, raw.contains(OsFlags::IFF_AUTOMEDIA));
            flags.set(Self::DYNAMIC, raw.contains(OsFlags::IFF_DYNAMIC));
            flags.set(Self::LOWER_UP, raw.contains(OsFlags::IFF_LOWER_UP));
            flags.set(Self::DORMANT, raw.contains(OsFlags::IFF_DORMANT));
            flags.set(Self::ECHO, raw.contains(OsFlags::IFF_ECHO));
        }

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        assert_eq!(InterfaceFlags::UP.bits(), 1);
        assert_eq!(InterfaceFlags::LOOPBACK.bits(), 1 << 3);
        assert_eq!(InterfaceFlags::MULTICAST.bits(), 1 << 12);
        assert_eq!(InterfaceFlags::ECHO.bits(), 1 << 18);
        assert_eq!(InterfaceFlags::all().bits(), (1 << 19) - 1);
    }

    #[test]
    fn test_from_os() {
        let raw = OsFlags::IFF_UP | OsFlags::IFF_LOOPBACK | OsFlags::IFF_RUNNING;
        let flags = InterfaceFlags::from_os(raw);
        assert_eq!(
            flags,
            InterfaceFlags::UP | InterfaceFlags::LOOPBACK | InterfaceFlags::RUNNING
        );
        assert_eq!(InterfaceFlags::from_os(OsFlags::empty()), InterfaceFlags::empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_from_os_linux_only_bits() {
        let raw = OsFlags::IFF_LOWER_UP | OsFlags::IFF_MASTER;
        let flags = InterfaceFlags::from_os(raw);
        assert_eq!(flags, InterfaceFlags::LOWER_UP | InterfaceFlags::MASTER);
    }
}
