// SPDX-License-Identifier: Apache-2.0

use crate::{
    buffer::{Buffer, BufferMut},
    ErrorContext, PdError,
};

const DUID_TYPE_LLT: u16 = 1;
const DUID_TYPE_LL: u16 = 3;

/// Structured view of an on-wire DUID. Only the two link-layer based forms
/// are interpreted; every other type is carried as an opaque byte array.
///
/// RFC 8415, 11. DHCP Unique Identifier (DUID)
///   Clients and servers MUST treat DUIDs as opaque values and MUST only
///   compare DUIDs for equality.
#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum DhcpV6Duid {
    /// DUID Based on Link-Layer Address Plus Time (type 1)
    LinkLayerAddrPlusTime(DuidLinkLayerAddrPlusTime),
    /// DUID Based on Link-Layer Address (type 3)
    LinkLayerAddr(DuidLinkLayerAddr),
    /// Opaque byte array
    Raw(Vec<u8>),
}

impl DhcpV6Duid {
    /// Decode the raw payload of a Client ID or Server ID option. Unknown
    /// or malformed DUIDs fall back to the opaque form instead of failing.
    pub(crate) fn parse(raw: &[u8]) -> Self {
        let mut buf = Buffer::new(raw);
        let id_type = match buf.get_u16_be() {
            Ok(t) => t,
            Err(_) => return Self::Raw(raw.to_vec()),
        };
        match id_type {
            DUID_TYPE_LLT => {
                match DuidLinkLayerAddrPlusTime::parse(&mut buf) {
                    Ok(v) => Self::LinkLayerAddrPlusTime(v),
                    Err(_) => Self::Raw(raw.to_vec()),
                }
            }
            DUID_TYPE_LL => match DuidLinkLayerAddr::parse(&mut buf) {
                Ok(v) => Self::LinkLayerAddr(v),
                Err(_) => Self::Raw(raw.to_vec()),
            },
            _ => Self::Raw(raw.to_vec()),
        }
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        match self {
            Self::LinkLayerAddrPlusTime(v) => v.emit(buf),
            Self::LinkLayerAddr(v) => v.emit(buf),
            Self::Raw(v) => buf.write_bytes(v.as_slice()),
        }
    }

    /// Link-layer address carried by the DUID, when the type has one.
    pub(crate) fn lladdr(&self) -> Option<&[u8]> {
        match self {
            Self::LinkLayerAddrPlusTime(v) => {
                Some(v.link_layer_address.as_slice())
            }
            Self::LinkLayerAddr(v) => Some(v.link_layer_address.as_slice()),
            Self::Raw(_) => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DuidLinkLayerAddrPlusTime {
    pub hardware_type: u16,
    pub time: u32,
    pub link_layer_address: Vec<u8>,
}

impl DuidLinkLayerAddrPlusTime {
    fn parse(buf: &mut Buffer) -> Result<Self, PdError> {
        Ok(Self {
            hardware_type: buf
                .get_u16_be()
                .context("Invalid DUID-LLT hardware type")?,
            time: buf.get_u32_be().context("Invalid DUID-LLT time")?,
            link_layer_address: buf
                .get_bytes(buf.remain_len())
                .context("Invalid DUID-LLT link layer address")?
                .to_vec(),
        })
    }

    fn emit(&self, buf: &mut BufferMut) {
        buf.write_u16_be(DUID_TYPE_LLT);
        buf.write_u16_be(self.hardware_type);
        buf.write_u32_be(self.time);
        buf.write_bytes(self.link_layer_address.as_slice());
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DuidLinkLayerAddr {
    pub hardware_type: u16,
    pub link_layer_address: Vec<u8>,
}

impl DuidLinkLayerAddr {
    fn parse(buf: &mut Buffer) -> Result<Self, PdError> {
        Ok(Self {
            hardware_type: buf
                .get_u16_be()
                .context("Invalid DUID-LL hardware type")?,
            link_layer_address: buf
                .get_bytes(buf.remain_len())
                .context("Invalid DUID-LL link layer address")?
                .to_vec(),
        })
    }

    fn emit(&self, buf: &mut BufferMut) {
        buf.write_u16_be(DUID_TYPE_LL);
        buf.write_u16_be(self.hardware_type);
        buf.write_bytes(self.link_layer_address.as_slice());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_duid_ll_exposes_lladdr() {
        let raw = &[
            0x00, 0x03, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02,
        ];
        let duid = DhcpV6Duid::parse(raw);
        assert_eq!(
            duid.lladdr(),
            Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02].as_slice())
        );

        let mut buf = BufferMut::new();
        duid.emit(&mut buf);
        assert_eq!(buf.data.as_slice(), raw);
    }

    #[test]
    fn parse_duid_llt_exposes_lladdr() {
        let raw = &[
            0x00, 0x01, 0x00, 0x01, 0x2a, 0x9f, 0x11, 0x04, 0xaa, 0xbb, 0xcc,
            0xdd, 0xee, 0x02,
        ];
        let duid = DhcpV6Duid::parse(raw);
        assert_eq!(
            duid,
            DhcpV6Duid::LinkLayerAddrPlusTime(DuidLinkLayerAddrPlusTime {
                hardware_type: 1,
                time: 0x2a9f_1104,
                link_layer_address: vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02],
            })
        );

        let mut buf = BufferMut::new();
        duid.emit(&mut buf);
        assert_eq!(buf.data.as_slice(), raw);
    }

    #[test]
    fn unknown_duid_type_is_opaque() {
        let raw = &[0x00, 0x04, 0x01, 0x02, 0x03];
        let duid = DhcpV6Duid::parse(raw);
        assert_eq!(duid, DhcpV6Duid::Raw(raw.to_vec()));
        assert_eq!(duid.lladdr(), None);
    }
}
