// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;

use crate::{
    buffer::{Buffer, BufferMut},
    option::DhcpV6Option,
    option_ia::{DhcpV6OptionIaPd, DhcpV6OptionIaPrefix},
    option_status::DhcpV6OptionStatus,
    viface::VirtualInterface,
    Duid, ErrorKind, PdError, TransactionId, ETH_ALEN,
};

/// RFC 8415: All_DHCP_Relay_Agents_and_Servers
pub(crate) const ALL_DHCP_RELAY_AGENTS_AND_SERVERS: Ipv6Addr =
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 1, 2);

/// Link-layer multicast MAC mapped from ff02::1:2
pub(crate) const DHCPV6_MULTICAST_MAC: [u8; ETH_ALEN] =
    [0x33, 0x33, 0x00, 0x01, 0x00, 0x02];

pub(crate) const DHCPV6_CLIENT_PORT: u16 = 546;
pub(crate) const DHCPV6_SERVER_PORT: u16 = 547;

const DEFAULT_HOP_LIMIT: u8 = 64;

const MSG_TYPE_SOLICIT: u8 = 1;
const MSG_TYPE_ADVERTISE: u8 = 2;
const MSG_TYPE_REQUEST: u8 = 3;
const MSG_TYPE_RENEW: u8 = 5;
const MSG_TYPE_REBIND: u8 = 6;
const MSG_TYPE_REPLY: u8 = 7;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum DhcpV6MessageType {
    Solicit,
    Advertise,
    Request,
    Renew,
    Rebind,
    Reply,
    Other(u8),
}

impl From<u8> for DhcpV6MessageType {
    fn from(d: u8) -> Self {
        match d {
            MSG_TYPE_SOLICIT => Self::Solicit,
            MSG_TYPE_ADVERTISE => Self::Advertise,
            MSG_TYPE_REQUEST => Self::Request,
            MSG_TYPE_RENEW => Self::Renew,
            MSG_TYPE_REBIND => Self::Rebind,
            MSG_TYPE_REPLY => Self::Reply,
            _ => Self::Other(d),
        }
    }
}

impl From<DhcpV6MessageType> for u8 {
    fn from(v: DhcpV6MessageType) -> u8 {
        match v {
            DhcpV6MessageType::Solicit => MSG_TYPE_SOLICIT,
            DhcpV6MessageType::Advertise => MSG_TYPE_ADVERTISE,
            DhcpV6MessageType::Request => MSG_TYPE_REQUEST,
            DhcpV6MessageType::Renew => MSG_TYPE_RENEW,
            DhcpV6MessageType::Rebind => MSG_TYPE_REBIND,
            DhcpV6MessageType::Reply => MSG_TYPE_REPLY,
            DhcpV6MessageType::Other(d) => d,
        }
    }
}

impl std::fmt::Display for DhcpV6MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Solicit => "SOLICIT",
                Self::Advertise => "ADVERTISE",
                Self::Request => "REQUEST",
                Self::Renew => "RENEW",
                Self::Rebind => "REBIND",
                Self::Reply => "REPLY",
                Self::Other(_) => "UNKNOWN",
            }
        )
    }
}

/// One DHCPv6 message plus, when parsed off the wire, the addressing of the
/// Ethernet frame that carried it.
#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DhcpV6Message {
    pub msg_type: DhcpV6MessageType,
    pub xid: TransactionId,
    pub(crate) options: Vec<DhcpV6Option>,
    /// Ethernet destination of the received frame; unset on built messages.
    pub(crate) eth_dst: Option<[u8; ETH_ALEN]>,
}

impl DhcpV6Message {
    pub(crate) fn new(msg_type: DhcpV6MessageType, xid: TransactionId) -> Self {
        Self {
            msg_type,
            xid,
            options: Vec::new(),
            eth_dst: None,
        }
    }

    fn new_from_viface(
        msg_type: DhcpV6MessageType,
        viface: &VirtualInterface,
    ) -> Result<Self, PdError> {
        let xid = viface.transaction_id.ok_or_else(|| {
            PdError::new(
                ErrorKind::Bug,
                format!("No transaction-id set on virtual interface {viface}"),
            )
        })?;
        let mut ret = Self::new(msg_type, xid);
        ret.options
            .push(DhcpV6Option::ClientId(viface.client_duid.to_bytes()));
        Ok(ret)
    }

    fn ia_prefix_of(viface: &VirtualInterface) -> DhcpV6OptionIaPrefix {
        DhcpV6OptionIaPrefix::new(
            viface.prefix.address,
            viface.prefix.length.get(),
        )
    }

    /// Solicit: Client ID, IA_PD with the configured prefix, Elapsed Time.
    pub(crate) fn new_solicit(
        viface: &VirtualInterface,
    ) -> Result<Self, PdError> {
        let mut ret = Self::new_from_viface(DhcpV6MessageType::Solicit, viface)?;
        ret.options.push(DhcpV6Option::IaPd(DhcpV6OptionIaPd::new(
            viface.iaid.get(),
            0,
            0,
            Self::ia_prefix_of(viface),
        )));
        ret.options.push(DhcpV6Option::ElapsedTime(0));
        Ok(ret)
    }

    /// Request: Solicit contents plus Server ID, with the lease T1/T2 in
    /// IA_PD.
    pub(crate) fn new_request(
        viface: &VirtualInterface,
    ) -> Result<Self, PdError> {
        let mut ret = Self::new_from_viface(DhcpV6MessageType::Request, viface)?;
        ret.push_server_id(viface)?;
        ret.push_ia_pd_with_timers(viface);
        ret.options.push(DhcpV6Option::ElapsedTime(0));
        Ok(ret)
    }

    /// Renew: identical contents to Request, different message type.
    pub(crate) fn new_renew(
        viface: &VirtualInterface,
    ) -> Result<Self, PdError> {
        let mut ret = Self::new_from_viface(DhcpV6MessageType::Renew, viface)?;
        ret.push_server_id(viface)?;
        ret.push_ia_pd_with_timers(viface);
        ret.options.push(DhcpV6Option::ElapsedTime(0));
        Ok(ret)
    }

    /// Rebind: like Request but without Server ID (RFC 8415 section 18.2.5).
    pub(crate) fn new_rebind(
        viface: &VirtualInterface,
    ) -> Result<Self, PdError> {
        let mut ret = Self::new_from_viface(DhcpV6MessageType::Rebind, viface)?;
        ret.push_ia_pd_with_timers(viface);
        ret.options.push(DhcpV6Option::ElapsedTime(0));
        Ok(ret)
    }

    fn push_server_id(
        &mut self,
        viface: &VirtualInterface,
    ) -> Result<(), PdError> {
        match viface.server_duid.as_ref() {
            Some(duid) => {
                self.options.push(DhcpV6Option::ServerId(duid.to_bytes()));
                Ok(())
            }
            None => Err(PdError::new(
                ErrorKind::Bug,
                format!("No server DUID set on virtual interface {viface}"),
            )),
        }
    }

    fn push_ia_pd_with_timers(&mut self, viface: &VirtualInterface) {
        self.options.push(DhcpV6Option::IaPd(DhcpV6OptionIaPd::new(
            viface.iaid.get(),
            viface.t1.map(|t| t.secs() as u32).unwrap_or_default(),
            viface.t2.map(|t| t.secs() as u32).unwrap_or_default(),
            Self::ia_prefix_of(viface),
        )));
    }

    pub(crate) fn client_id(&self) -> Option<&[u8]> {
        self.options.iter().find_map(|opt| match opt {
            DhcpV6Option::ClientId(duid) => Some(duid.as_slice()),
            _ => None,
        })
    }

    pub(crate) fn server_duid(&self) -> Option<Duid> {
        self.options.iter().find_map(|opt| match opt {
            DhcpV6Option::ServerId(duid) => Some(Duid::from_bytes(duid)),
            _ => None,
        })
    }

    pub(crate) fn ia_pd(&self) -> Option<&DhcpV6OptionIaPd> {
        self.options.iter().find_map(|opt| match opt {
            DhcpV6Option::IaPd(ia_pd) => Some(ia_pd),
            _ => None,
        })
    }

    pub(crate) fn ia_prefix(&self) -> Option<&DhcpV6OptionIaPrefix> {
        self.ia_pd().and_then(|ia_pd| ia_pd.prefix.as_ref())
    }

    /// Top-level status code, falling back to the one embedded in IA_PD.
    pub(crate) fn status(&self) -> Option<&DhcpV6OptionStatus> {
        self.options
            .iter()
            .find_map(|opt| match opt {
                DhcpV6Option::StatusCode(status) => Some(status),
                _ => None,
            })
            .or_else(|| self.ia_pd().and_then(|ia_pd| ia_pd.status.as_ref()))
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        buf.write_u8(self.msg_type.into());
        buf.write_u24_be(self.xid.get());
        for opt in &self.options {
            opt.emit(buf);
        }
    }

    fn parse(payload: &[u8]) -> Result<Self, PdError> {
        let mut buf = Buffer::new(payload);
        let msg_type = buf.get_u8().map_err(|_| {
            PdError::new(
                ErrorKind::InvalidDhcpMessage,
                "Empty DHCPv6 payload".to_string(),
            )
        })?;
        let xid = TransactionId::new(buf.get_u24_be()?)?;
        let mut options = Vec::new();
        while !buf.is_empty() {
            options.push(DhcpV6Option::parse(&mut buf)?);
        }
        Ok(Self {
            msg_type: msg_type.into(),
            xid,
            options,
            eth_dst: None,
        })
    }

    /// Wrap the DHCPv6 message into the Ethernet/IPv6/UDP envelope used for
    /// all client messages of this daemon: multicast to
    /// All_DHCP_Relay_Agents_and_Servers from the interface link-local
    /// address.
    pub(crate) fn to_eth_frame(
        &self,
        src_mac: [u8; ETH_ALEN],
        src_ip: Ipv6Addr,
    ) -> Result<Vec<u8>, PdError> {
        let mut buf = BufferMut::new();
        self.emit(&mut buf);

        let builder =
            etherparse::PacketBuilder::ethernet2(src_mac, DHCPV6_MULTICAST_MAC)
                .ipv6(
                    src_ip.octets(),
                    ALL_DHCP_RELAY_AGENTS_AND_SERVERS.octets(),
                    DEFAULT_HOP_LIMIT,
                )
                .udp(DHCPV6_CLIENT_PORT, DHCPV6_SERVER_PORT);

        let mut frame = Vec::<u8>::with_capacity(builder.size(buf.len()));
        builder.write(&mut frame, &buf.data).map_err(|e| {
            PdError::new(
                ErrorKind::Bug,
                format!("Failed to generate ethernet frame: {e}"),
            )
        })?;
        Ok(frame)
    }

    /// Decode a captured Ethernet frame. The returned message carries the
    /// frame's Ethernet destination for the handler's link-level check.
    pub(crate) fn from_eth_frame(frame: &[u8]) -> Result<Self, PdError> {
        let packet = match etherparse::SlicedPacket::from_ethernet(frame) {
            Ok(v) => v,
            Err(error) => {
                return Err(PdError::new(
                    ErrorKind::InvalidDhcpMessage,
                    format!(
                        "Failed to parse ethernet frame to DHCPv6 message: \
                         {error}"
                    ),
                ));
            }
        };
        let mut ret = if let Some(etherparse::TransportSlice::Udp(udp)) =
            packet.transport
        {
            Self::parse(udp.payload())?
        } else {
            return Err(PdError::new(
                ErrorKind::InvalidDhcpMessage,
                "Failed to parse ethernet frame to DHCPv6 message: not a UDP \
                 payload"
                    .to_string(),
            ));
        };
        if let Some(eth_header) = packet
            .link
            .and_then(|l| l.to_header())
            .and_then(|h| h.ethernet2())
        {
            ret.eth_dst = Some(eth_header.destination);
        }
        Ok(ret)
    }
}
