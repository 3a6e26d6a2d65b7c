// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;

use crate::{Duid, MacAddr, PrefixLen};

/// Configured network adapter. Immutable once bootstrap finished.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PhysicalInterface {
    pub name: String,
    /// Kernel interface index, required for AF_PACKET binding.
    pub index: u32,
    pub mac: MacAddr,
    pub link_local: Ipv6Addr,
}

impl std::fmt::Display for PhysicalInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A prefix the daemon keeps leased, bound to one physical interface and one
/// client DUID. Immutable once bootstrap finished.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConfiguredPrefix {
    pub iface_name: String,
    pub client_duid: Duid,
    pub address: Ipv6Addr,
    pub length: PrefixLen,
}

impl ConfiguredPrefix {
    /// Whether a prefix announced by the server is exactly the configured
    /// one.
    pub(crate) fn matches(&self, address: Ipv6Addr, length: u8) -> bool {
        self.address == address && self.length.get() == length
    }
}

impl std::fmt::Display for ConfiguredPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}
