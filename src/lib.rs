// SPDX-License-Identifier: Apache-2.0

mod bpf;
mod buffer;
mod config;
mod daemon;
mod duid;
mod error;
mod handler;
mod iface;
mod listener;
mod manager;
mod msg;
mod netlink;
mod option;
mod option_ia;
mod option_status;
mod socket;
mod store;
mod time;
mod types;
mod viface;

pub use crate::{
    config::{Config, InterfaceConfig, PrefixConfig},
    daemon::Daemon,
    duid::{DhcpV6Duid, DuidLinkLayerAddr, DuidLinkLayerAddrPlusTime},
    error::{ErrorKind, PdError},
    iface::{ConfiguredPrefix, PhysicalInterface},
    msg::{DhcpV6Message, DhcpV6MessageType},
    option::{DhcpV6Option, DhcpV6OptionCode},
    option_ia::{DhcpV6OptionIaPd, DhcpV6OptionIaPrefix},
    option_status::{DhcpV6OptionStatus, DhcpV6OptionStatusCode},
    store::{InterfaceStore, PrefixStore},
    types::{Duid, Iaid, MacAddr, PrefixLen, TransactionId},
    viface::{PdState, VirtualInterface},
};

pub(crate) use crate::error::ErrorContext;

pub(crate) const ETH_ALEN: usize = 6;
