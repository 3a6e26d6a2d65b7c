// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv6Addr;

use crate::{
    buffer::{Buffer, BufferMut},
    option::{DhcpV6Option, DhcpV6OptionCode},
    ErrorContext, ErrorKind, PdError,
};

/// OPTION_IA_PD (RFC 8415 section 21.21). This daemon negotiates a single
/// prefix per identity association; if a server sends several prefix
/// sub-options the last one wins.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
#[non_exhaustive]
pub struct DhcpV6OptionIaPd {
    pub iaid: u32,
    pub t1_sec: u32,
    pub t2_sec: u32,
    pub prefix: Option<DhcpV6OptionIaPrefix>,
    pub status: Option<crate::DhcpV6OptionStatus>,
}

impl DhcpV6OptionIaPd {
    pub(crate) fn new(
        iaid: u32,
        t1_sec: u32,
        t2_sec: u32,
        prefix: DhcpV6OptionIaPrefix,
    ) -> Self {
        Self {
            iaid,
            t1_sec,
            t2_sec,
            prefix: Some(prefix),
            status: None,
        }
    }

    pub(crate) fn parse(buf: &mut Buffer, len: usize) -> Result<Self, PdError> {
        let raw = buf.get_bytes(len).context("Invalid OPTION_IA_PD")?;
        let mut buf = Buffer::new(raw);
        let mut ret = Self {
            iaid: buf.get_u32_be().context("Invalid OPTION_IA_PD IAID")?,
            t1_sec: buf.get_u32_be().context("Invalid OPTION_IA_PD T1")?,
            t2_sec: buf.get_u32_be().context("Invalid OPTION_IA_PD T2")?,
            ..Default::default()
        };

        // Sub-options can only be OPTION_IAPREFIX or OPTION_STATUS_CODE
        while !buf.is_empty() {
            match DhcpV6Option::parse(&mut buf)? {
                DhcpV6Option::StatusCode(v) => ret.status = Some(v),
                DhcpV6Option::IaPrefix(v) => ret.prefix = Some(v),
                opt => {
                    return Err(PdError::new(
                        ErrorKind::InvalidDhcpMessage,
                        format!(
                            "Expecting OPTION_IAPREFIX or OPTION_STATUS_CODE \
                             in OPTION_IA_PD option field, but got {}",
                            opt.code()
                        ),
                    ));
                }
            }
        }
        Ok(ret)
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        let mut value_buf = BufferMut::new();
        value_buf.write_u32_be(self.iaid);
        value_buf.write_u32_be(self.t1_sec);
        value_buf.write_u32_be(self.t2_sec);
        if let Some(prefix) = self.prefix.as_ref() {
            prefix.emit(&mut value_buf);
        }
        if let Some(status) = self.status.as_ref() {
            status.emit(&mut value_buf);
        }

        buf.write_u16_be(DhcpV6OptionCode::IaPd.into());
        buf.write_u16_be(value_buf.len() as u16);
        buf.write_bytes(&value_buf.data);
    }
}

/// OPTION_IAPREFIX (RFC 8415 section 21.22).
#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub struct DhcpV6OptionIaPrefix {
    pub preferred_time_sec: u32,
    pub valid_time_sec: u32,
    pub prefix_len: u8,
    pub prefix: Ipv6Addr,
}

impl Default for DhcpV6OptionIaPrefix {
    fn default() -> Self {
        Self {
            preferred_time_sec: 0,
            valid_time_sec: 0,
            prefix_len: 0,
            prefix: Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl DhcpV6OptionIaPrefix {
    pub(crate) fn new(prefix: Ipv6Addr, prefix_len: u8) -> Self {
        Self {
            prefix,
            prefix_len,
            // Set to 0 per RFC 8415 section 21.22 for client messages
            preferred_time_sec: 0,
            valid_time_sec: 0,
        }
    }

    pub(crate) fn parse(buf: &mut Buffer, len: usize) -> Result<Self, PdError> {
        let raw = buf.get_bytes(len).context("Invalid OPTION_IAPREFIX")?;
        let mut buf = Buffer::new(raw);
        let ret = Self {
            preferred_time_sec: buf
                .get_u32_be()
                .context("Invalid OPTION_IAPREFIX preferred time")?,
            valid_time_sec: buf
                .get_u32_be()
                .context("Invalid OPTION_IAPREFIX valid time")?,
            prefix_len: buf
                .get_u8()
                .context("Invalid OPTION_IAPREFIX prefix length")?,
            prefix: buf
                .get_ipv6()
                .context("Invalid OPTION_IAPREFIX prefix")?,
        };
        // Trailing IAprefix-options (e.g. a status code) are not used by
        // this daemon; the enclosing IA carries the status we act on.
        Ok(ret)
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        buf.write_u16_be(DhcpV6OptionCode::IaPrefix.into());
        buf.write_u16_be(25);
        buf.write_u32_be(self.preferred_time_sec);
        buf.write_u32_be(self.valid_time_sec);
        buf.write_u8(self.prefix_len);
        buf.write_ipv6(self.prefix);
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::DhcpV6OptionStatusCode;

    #[test]
    fn parse_ia_pd_with_prefix_and_status() {
        let raw = &[
            0x00, 0x19, 0x00, 0x36, 0x32, 0xaa, 0xbe, 0x4e, 0x00, 0x00, 0xa8,
            0xc0, 0x00, 0x01, 0x0e, 0x00, 0x00, 0x1a, 0x00, 0x19, 0x00, 0x01,
            0x51, 0x80, 0x00, 0x01, 0x51, 0x80, 0x3c, 0x24, 0x0e, 0x03, 0x9c,
            0x0e, 0x29, 0xdb, 0xf0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x0d, 0x00, 0x09, 0x00, 0x00, 0x53, 0x55, 0x43, 0x43,
            0x45, 0x53, 0x53,
        ];

        let mut buf = Buffer::new(raw);
        let opt = DhcpV6Option::parse(&mut buf).unwrap();

        assert_eq!(
            opt,
            DhcpV6Option::IaPd(DhcpV6OptionIaPd {
                iaid: 0x32aa_be4e,
                t1_sec: 43200,
                t2_sec: 69120,
                prefix: Some(DhcpV6OptionIaPrefix {
                    preferred_time_sec: 86400,
                    valid_time_sec: 86400,
                    prefix_len: 60,
                    prefix: Ipv6Addr::from_str("240e:39c:e29:dbf0::").unwrap(),
                }),
                status: Some(crate::DhcpV6OptionStatus {
                    status: DhcpV6OptionStatusCode::Success,
                    message: "SUCCESS".into(),
                })
            })
        );

        let mut buf = BufferMut::new();
        opt.emit(&mut buf);
        assert_eq!(buf.data.as_slice(), raw);
    }

    #[test]
    fn parse_ia_pd_without_prefix() {
        let raw = &[
            0x00, 0x19, 0x00, 0x1f, 0xc1, 0xdb, 0x20, 0x5c, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0d, 0x00, 0x0f, 0x00, 0x06,
            0x4e, 0x4f, 0x50, 0x52, 0x45, 0x46, 0x49, 0x58, 0x41, 0x56, 0x41,
            0x49, 0x4c,
        ];

        let mut buf = Buffer::new(raw);
        let opt = DhcpV6Option::parse(&mut buf).unwrap();

        assert_eq!(
            opt,
            DhcpV6Option::IaPd(DhcpV6OptionIaPd {
                iaid: 0xc1db_205c,
                t1_sec: 0,
                t2_sec: 0,
                prefix: None,
                status: Some(crate::DhcpV6OptionStatus {
                    status: DhcpV6OptionStatusCode::NoPrefixAvail,
                    message: "NOPREFIXAVAIL".into(),
                })
            })
        );

        let mut buf = BufferMut::new();
        opt.emit(&mut buf);
        assert_eq!(buf.data.as_slice(), raw);
    }
}
