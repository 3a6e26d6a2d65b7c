// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{
    iface::{ConfiguredPrefix, PhysicalInterface},
    Duid,
};

/// Registry of configured physical interfaces. Populated at startup,
/// read-only afterwards. N is a handful, linear lookups are fine.
#[derive(Debug, Default, Clone)]
pub struct InterfaceStore {
    store: Vec<Arc<PhysicalInterface>>,
}

impl InterfaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, iface: PhysicalInterface) -> Arc<PhysicalInterface> {
        let iface = Arc::new(iface);
        self.store.push(iface.clone());
        iface
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<PhysicalInterface>> {
        self.store.iter().find(|iface| iface.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PhysicalInterface>> {
        self.store.iter()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Registry of configured prefixes, looked up by client DUID. Populated at
/// startup, read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct PrefixStore {
    store: Vec<ConfiguredPrefix>,
}

impl PrefixStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, prefix: ConfiguredPrefix) {
        self.store.push(prefix);
    }

    pub fn get_by_duid(&self, duid: &Duid) -> Option<&ConfiguredPrefix> {
        self.store
            .iter()
            .find(|prefix| &prefix.client_duid == duid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfiguredPrefix> {
        self.store.iter()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::net::Ipv6Addr;
    use std::str::FromStr;

    use super::*;
    use crate::{MacAddr, PrefixLen};

    #[test]
    fn interface_lookup_by_name() {
        let mut store = InterfaceStore::new();
        store.add(PhysicalInterface {
            name: "eth0".to_string(),
            index: 2,
            mac: MacAddr::new("aa:bb:cc:dd:ee:01").unwrap(),
            link_local: Ipv6Addr::from_str("fe80::1").unwrap(),
        });

        assert!(store.get_by_name("eth0").is_some());
        assert!(store.get_by_name("eth1").is_none());
    }

    #[test]
    fn prefix_lookup_by_duid() {
        let duid = Duid::new("00:03:00:01:aa:bb:cc:dd:ee:02").unwrap();
        let mut store = PrefixStore::new();
        store.add(ConfiguredPrefix {
            iface_name: "eth0".to_string(),
            client_duid: duid.clone(),
            address: Ipv6Addr::from_str("2001:db8::").unwrap(),
            length: PrefixLen::new(56).unwrap(),
        });

        assert!(store.get_by_duid(&duid).is_some());
        let other = Duid::new("00:03:00:01:aa:bb:cc:dd:ee:03").unwrap();
        assert!(store.get_by_duid(&other).is_none());
    }
}
