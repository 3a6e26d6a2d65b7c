// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Instant;

use crate::{
    iface::{ConfiguredPrefix, PhysicalInterface},
    time::LeaseTimer,
    Duid, Iaid, TransactionId,
};

/// Lease state of one virtual client.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PdState {
    #[default]
    Initial,
    /// Solicit sent, waiting for Advertise.
    Solicited,
    /// Valid Advertise received, Request goes out on the next tick.
    Advertised,
    /// Request sent, waiting for Reply.
    Requested,
    /// Lease confirmed, waiting on T1/T2/expire.
    Confirmed,
    /// Renew sent to the lease provider, waiting for Reply.
    Renewing,
    /// Rebind sent by multicast, waiting for any server's Reply.
    Rebinding,
    /// Server actively withdrew the prefix; re-solicited on the next tick.
    Withdrawn,
}

impl std::fmt::Display for PdState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Initial => "Initial",
                Self::Solicited => "Solicited",
                Self::Advertised => "Advertised",
                Self::Requested => "Requested",
                Self::Confirmed => "Confirmed",
                Self::Renewing => "Renewing",
                Self::Rebinding => "Rebinding",
                Self::Withdrawn => "Withdrawn",
            }
        )
    }
}

/// Runtime lease state for one configured prefix on its physical interface.
/// Owned and mutated exclusively by the manager worker.
#[derive(Debug, Clone)]
pub struct VirtualInterface {
    pub(crate) iaid: Iaid,
    pub(crate) client_duid: Duid,
    pub(crate) prefix: ConfiguredPrefix,
    pub(crate) physical: Arc<PhysicalInterface>,
    state: PdState,
    pub(crate) server_duid: Option<Duid>,
    pub(crate) transaction_id: Option<TransactionId>,
    pub(crate) last_action: Option<Instant>,
    pub(crate) last_confirm: Option<Instant>,
    pub(crate) t1: Option<LeaseTimer>,
    pub(crate) t2: Option<LeaseTimer>,
    pub(crate) expire: Option<LeaseTimer>,
}

impl VirtualInterface {
    pub fn new(
        iaid: Iaid,
        prefix: ConfiguredPrefix,
        physical: Arc<PhysicalInterface>,
    ) -> Self {
        Self {
            iaid,
            client_duid: prefix.client_duid.clone(),
            prefix,
            physical,
            state: PdState::Initial,
            server_duid: None,
            transaction_id: None,
            last_action: None,
            last_confirm: None,
            t1: None,
            t2: None,
            expire: None,
        }
    }

    pub fn state(&self) -> PdState {
        self.state
    }

    /// All transitions funnel through here so every state change is logged.
    pub(crate) fn set_state(&mut self, state: PdState) {
        match state {
            PdState::Confirmed
            | PdState::Renewing
            | PdState::Rebinding
            | PdState::Withdrawn => {
                log::info!(
                    "State of prefix {} has changed to: {state}",
                    self.prefix
                );
            }
            _ => {
                log::debug!(
                    "State of prefix {} has changed to: {state}",
                    self.prefix
                );
            }
        }
        self.state = state;
    }
}

impl std::fmt::Display for VirtualInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.physical.name, self.iaid)
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv6Addr;
    use std::str::FromStr;

    use super::*;
    use crate::{MacAddr, PrefixLen};

    fn test_viface() -> VirtualInterface {
        let physical = Arc::new(PhysicalInterface {
            name: "eth0".to_string(),
            index: 2,
            mac: MacAddr::new("aa:bb:cc:dd:ee:01").unwrap(),
            link_local: Ipv6Addr::from_str("fe80::1").unwrap(),
        });
        let prefix = ConfiguredPrefix {
            iface_name: "eth0".to_string(),
            client_duid: Duid::new("00:03:00:01:aa:bb:cc:dd:ee:02").unwrap(),
            address: Ipv6Addr::from_str("2001:db8::").unwrap(),
            length: PrefixLen::new(56).unwrap(),
        };
        VirtualInterface::new(Iaid::new(25000).unwrap(), prefix, physical)
    }

    #[test]
    fn starts_in_initial_with_unset_lease_fields() {
        let viface = test_viface();
        assert_eq!(viface.state(), PdState::Initial);
        assert!(viface.server_duid.is_none());
        assert!(viface.transaction_id.is_none());
        assert!(viface.last_action.is_none());
        assert!(viface.last_confirm.is_none());
        assert!(viface.t1.is_none());
        assert!(viface.t2.is_none());
        assert!(viface.expire.is_none());
    }

    #[test]
    fn display_is_iface_and_iaid() {
        assert_eq!(test_viface().to_string(), "eth0[25000]");
    }
}
