// SPDX-License-Identifier: Apache-2.0

use crate::{
    buffer::{Buffer, BufferMut},
    option_ia::{DhcpV6OptionIaPd, DhcpV6OptionIaPrefix},
    option_status::DhcpV6OptionStatus,
    ErrorContext, ErrorKind, PdError,
};

const OPTION_CLIENTID: u16 = 1;
const OPTION_SERVERID: u16 = 2;
const OPTION_ORO: u16 = 6;
const OPTION_ELAPSED_TIME: u16 = 8;
const OPTION_STATUS_CODE: u16 = 13;
const OPTION_IA_PD: u16 = 25;
const OPTION_IAPREFIX: u16 = 26;

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum DhcpV6OptionCode {
    ClientId,
    ServerId,
    OptionRequestOption,
    ElapsedTime,
    StatusCode,
    IaPd,
    IaPrefix,
    Other(u16),
}

impl From<u16> for DhcpV6OptionCode {
    fn from(d: u16) -> Self {
        match d {
            OPTION_CLIENTID => Self::ClientId,
            OPTION_SERVERID => Self::ServerId,
            OPTION_ORO => Self::OptionRequestOption,
            OPTION_ELAPSED_TIME => Self::ElapsedTime,
            OPTION_STATUS_CODE => Self::StatusCode,
            OPTION_IA_PD => Self::IaPd,
            OPTION_IAPREFIX => Self::IaPrefix,
            _ => Self::Other(d),
        }
    }
}

impl From<DhcpV6OptionCode> for u16 {
    fn from(v: DhcpV6OptionCode) -> u16 {
        match v {
            DhcpV6OptionCode::ClientId => OPTION_CLIENTID,
            DhcpV6OptionCode::ServerId => OPTION_SERVERID,
            DhcpV6OptionCode::OptionRequestOption => OPTION_ORO,
            DhcpV6OptionCode::ElapsedTime => OPTION_ELAPSED_TIME,
            DhcpV6OptionCode::StatusCode => OPTION_STATUS_CODE,
            DhcpV6OptionCode::IaPd => OPTION_IA_PD,
            DhcpV6OptionCode::IaPrefix => OPTION_IAPREFIX,
            DhcpV6OptionCode::Other(d) => d,
        }
    }
}

impl std::fmt::Display for DhcpV6OptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientId => write!(f, "OPTION_CLIENTID"),
            Self::ServerId => write!(f, "OPTION_SERVERID"),
            Self::OptionRequestOption => write!(f, "OPTION_ORO"),
            Self::ElapsedTime => write!(f, "OPTION_ELAPSED_TIME"),
            Self::StatusCode => write!(f, "OPTION_STATUS_CODE"),
            Self::IaPd => write!(f, "OPTION_IA_PD"),
            Self::IaPrefix => write!(f, "OPTION_IAPREFIX"),
            Self::Other(d) => write!(f, "OPTION({d})"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum DhcpV6Option {
    /// Raw DUID bytes of OPTION_CLIENTID
    ClientId(Vec<u8>),
    /// Raw DUID bytes of OPTION_SERVERID
    ServerId(Vec<u8>),
    /// OPTION_ORO: tolerated on decode, never emitted by this daemon
    OptionRequestOption(Vec<u16>),
    /// Elapsed time in hundredths of a second
    ElapsedTime(u16),
    StatusCode(DhcpV6OptionStatus),
    IaPd(DhcpV6OptionIaPd),
    IaPrefix(DhcpV6OptionIaPrefix),
    Unknown { code: u16, data: Vec<u8> },
}

impl DhcpV6Option {
    pub(crate) fn code(&self) -> DhcpV6OptionCode {
        match self {
            Self::ClientId(_) => DhcpV6OptionCode::ClientId,
            Self::ServerId(_) => DhcpV6OptionCode::ServerId,
            Self::OptionRequestOption(_) => {
                DhcpV6OptionCode::OptionRequestOption
            }
            Self::ElapsedTime(_) => DhcpV6OptionCode::ElapsedTime,
            Self::StatusCode(_) => DhcpV6OptionCode::StatusCode,
            Self::IaPd(_) => DhcpV6OptionCode::IaPd,
            Self::IaPrefix(_) => DhcpV6OptionCode::IaPrefix,
            Self::Unknown { code, .. } => DhcpV6OptionCode::Other(*code),
        }
    }

    pub(crate) fn parse(buf: &mut Buffer) -> Result<Self, PdError> {
        let code = buf.get_u16_be().context("Invalid DHCPv6 option code")?;
        let len: usize = buf
            .get_u16_be()
            .context("Invalid DHCPv6 option length")?
            .into();
        Ok(match code {
            OPTION_CLIENTID => Self::ClientId(
                buf.get_bytes(len)
                    .context("Invalid OPTION_CLIENTID")?
                    .to_vec(),
            ),
            OPTION_SERVERID => Self::ServerId(
                buf.get_bytes(len)
                    .context("Invalid OPTION_SERVERID")?
                    .to_vec(),
            ),
            OPTION_ORO => {
                if len % 2 != 0 {
                    return Err(PdError::new(
                        ErrorKind::InvalidDhcpMessage,
                        format!("Odd OPTION_ORO length {len}"),
                    ));
                }
                let raw =
                    buf.get_bytes(len).context("Invalid OPTION_ORO")?.to_vec();
                let mut codes = Vec::new();
                let mut oro_buf = Buffer::new(&raw);
                while !oro_buf.is_empty() {
                    codes.push(
                        oro_buf
                            .get_u16_be()
                            .context("Invalid OPTION_ORO entry")?,
                    );
                }
                Self::OptionRequestOption(codes)
            }
            OPTION_ELAPSED_TIME => {
                if len != 2 {
                    return Err(PdError::new(
                        ErrorKind::InvalidDhcpMessage,
                        format!("Invalid OPTION_ELAPSED_TIME length {len}"),
                    ));
                }
                Self::ElapsedTime(
                    buf.get_u16_be().context("Invalid OPTION_ELAPSED_TIME")?,
                )
            }
            OPTION_STATUS_CODE => {
                Self::StatusCode(DhcpV6OptionStatus::parse(buf, len)?)
            }
            OPTION_IA_PD => Self::IaPd(DhcpV6OptionIaPd::parse(buf, len)?),
            OPTION_IAPREFIX => {
                Self::IaPrefix(DhcpV6OptionIaPrefix::parse(buf, len)?)
            }
            _ => {
                let data = buf
                    .get_bytes(len)
                    .context("Invalid DHCPv6 option payload")?
                    .to_vec();
                log::debug!("Unsupported DHCPv6 option {code}, keeping as raw");
                Self::Unknown { code, data }
            }
        })
    }

    pub(crate) fn emit(&self, buf: &mut BufferMut) {
        match self {
            Self::ClientId(duid) => {
                buf.write_u16_be(OPTION_CLIENTID);
                buf.write_u16_be(duid.len() as u16);
                buf.write_bytes(duid);
            }
            Self::ServerId(duid) => {
                buf.write_u16_be(OPTION_SERVERID);
                buf.write_u16_be(duid.len() as u16);
                buf.write_bytes(duid);
            }
            Self::OptionRequestOption(codes) => {
                buf.write_u16_be(OPTION_ORO);
                buf.write_u16_be((codes.len() * 2) as u16);
                for code in codes {
                    buf.write_u16_be(*code);
                }
            }
            Self::ElapsedTime(hundredths) => {
                buf.write_u16_be(OPTION_ELAPSED_TIME);
                buf.write_u16_be(2);
                buf.write_u16_be(*hundredths);
            }
            Self::StatusCode(v) => v.emit(buf),
            Self::IaPd(v) => v.emit(buf),
            Self::IaPrefix(v) => v.emit(buf),
            Self::Unknown { code, data } => {
                buf.write_u16_be(*code);
                buf.write_u16_be(data.len() as u16);
                buf.write_bytes(data);
            }
        }
    }
}
