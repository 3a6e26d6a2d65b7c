// SPDX-License-Identifier: Apache-2.0

use std::net::{IpAddr, Ipv6Addr};

use futures::stream::TryStreamExt;
use rtnetlink::packet_route::{address::AddressAttribute, link::LinkAttribute};

use crate::{ErrorKind, PdError};

/// Kernel view of a physical interface: index plus hardware address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct LinkInfo {
    pub(crate) index: u32,
    pub(crate) mac: Option<Vec<u8>>,
}

/// Resolve interface index and MAC address, blocking on a current-thread
/// runtime. Used during bootstrap only.
pub(crate) fn resolve_link(iface_name: &str) -> Result<LinkInfo, PdError> {
    block_on(get_link(iface_name))
}

/// Resolve the fe80::/10 link-local address of an interface, blocking on a
/// current-thread runtime. Used during bootstrap only.
pub(crate) fn resolve_link_local(
    iface_index: u32,
) -> Result<Option<Ipv6Addr>, PdError> {
    block_on(get_link_local(iface_index))
}

fn block_on<T>(
    fut: impl std::future::Future<Output = Result<T, PdError>>,
) -> Result<T, PdError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(|e| {
            PdError::new(
                ErrorKind::Bug,
                format!("Failed to start tokio runtime: {e}"),
            )
        })?;
    runtime.block_on(fut)
}

async fn get_link(iface_name: &str) -> Result<LinkInfo, PdError> {
    let (connection, handle, _) = rtnetlink::new_connection()?;

    tokio::spawn(connection);

    let mut links = handle
        .link()
        .get()
        .match_name(iface_name.to_string())
        .execute();

    if let Some(nl_msg) = links.try_next().await? {
        let mac = nl_msg.attributes.into_iter().find_map(|nla| {
            if let LinkAttribute::Address(mac) = nla {
                Some(mac)
            } else {
                None
            }
        });
        return Ok(LinkInfo {
            index: nl_msg.header.index,
            mac,
        });
    }
    Err(PdError::new(
        ErrorKind::Environment,
        format!("Could not find interface {iface_name}"),
    ))
}

async fn get_link_local(
    iface_index: u32,
) -> Result<Option<Ipv6Addr>, PdError> {
    let (connection, handle, _) = rtnetlink::new_connection()?;

    tokio::spawn(connection);

    let mut addrs = handle
        .address()
        .get()
        .set_link_index_filter(iface_index)
        .execute();

    while let Some(nl_msg) = addrs.try_next().await? {
        for attr in nl_msg.attributes {
            if let AddressAttribute::Address(IpAddr::V6(ip)) = attr {
                if is_unicast_link_local(ip) {
                    return Ok(Some(ip));
                }
            }
        }
    }
    Ok(None)
}

// fe80::/10 per RFC 4291
const fn is_unicast_link_local(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}
