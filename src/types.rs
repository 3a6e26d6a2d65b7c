// SPDX-License-Identifier: Apache-2.0

use crate::{ErrorKind, PdError, ETH_ALEN};

const TRANSACTION_ID_MAX: u32 = (1 << 24) - 1;

/// Ethernet MAC address in lowercase colon-hex form.
#[derive(Debug, PartialEq, Eq, Clone, PartialOrd, Ord, Hash)]
pub struct MacAddr {
    text: String,
    octets: [u8; ETH_ALEN],
}

impl MacAddr {
    pub fn new(value: &str) -> Result<Self, PdError> {
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != ETH_ALEN
            || parts.iter().any(|p| {
                p.len() != 2
                    || !p
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            })
        {
            return Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Invalid MAC address {value}, expecting lowercase format \
                     like 02:2a:2c:f7:04:01"
                ),
            ));
        }
        let mut octets = [0u8; ETH_ALEN];
        for (i, part) in parts.iter().enumerate() {
            // Validated above as two hex digits.
            octets[i] = u8::from_str_radix(part, 16).unwrap_or_default();
        }
        Ok(Self {
            text: value.to_string(),
            octets,
        })
    }

    pub fn from_octets(octets: &[u8]) -> Result<Self, PdError> {
        if octets.len() != ETH_ALEN {
            return Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Invalid MAC address bytes {octets:?}, expecting \
                     {ETH_ALEN} octets"
                ),
            ));
        }
        let mut fixed = [0u8; ETH_ALEN];
        fixed.copy_from_slice(octets);
        Ok(Self {
            text: bytes_to_colon_hex(octets),
            octets: fixed,
        })
    }

    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.octets
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// DHCP Unique Identifier in colon-hex text form, e.g.
/// `00:03:00:01:02:2a:2c:f7:04:01`.
#[derive(Debug, PartialEq, Eq, Clone, PartialOrd, Ord, Hash)]
pub struct Duid {
    text: String,
}

impl Duid {
    pub fn new(value: &str) -> Result<Self, PdError> {
        let valid = !value.is_empty()
            && value.split(':').all(|p| {
                p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit())
            });
        if !valid {
            return Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!("Invalid DUID {value}, expecting colon-hex string"),
            ));
        }
        Ok(Self {
            text: value.to_lowercase(),
        })
    }

    pub fn from_bytes(raw: &[u8]) -> Self {
        Self {
            text: bytes_to_colon_hex(raw),
        }
    }

    /// DUID-LL (type 3, hardware type Ethernet) for the given link-layer
    /// address bytes.
    pub fn new_link_layer(lladdr: &[u8]) -> Self {
        Self {
            text: format!("00:03:00:01:{}", bytes_to_colon_hex(lladdr)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.text
            .split(':')
            // Segments are validated as two hex digits at construction.
            .map(|p| u8::from_str_radix(p, 16).unwrap_or_default())
            .collect()
    }
}

impl std::fmt::Display for Duid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// IPv6 prefix length, limited to 8..=128.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct PrefixLen(u8);

impl PrefixLen {
    pub fn new(value: u8) -> Result<Self, PdError> {
        if !(8..=128).contains(&value) {
            return Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!("Invalid prefix length {value}, expecting 8..=128"),
            ));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for PrefixLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity Association identifier, a 32 bit value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Iaid(u32);

impl Iaid {
    pub fn new(value: u64) -> Result<Self, PdError> {
        match u32::try_from(value) {
            Ok(v) => Ok(Self(v)),
            Err(_) => Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!("Invalid IAID {value}, expecting 32 bit value"),
            )),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Iaid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DHCPv6 transaction-id, a 24 bit value (RFC 8415 section 8).
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct TransactionId(u32);

impl TransactionId {
    pub fn new(value: u32) -> Result<Self, PdError> {
        if value > TRANSACTION_ID_MAX {
            return Err(PdError::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Invalid transaction-id {value}, expecting 24 bit value"
                ),
            ));
        }
        Ok(Self(value))
    }

    pub fn random() -> Self {
        Self(rand::random_range(0..=TRANSACTION_ID_MAX))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#08x}", self.0)
    }
}

fn bytes_to_colon_hex(raw: &[u8]) -> String {
    raw.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<String>>()
        .join(":")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mac_requires_lowercase_colon_hex() {
        assert!(MacAddr::new("02:2a:2c:f7:04:01").is_ok());
        assert!(MacAddr::new("02:2A:2C:F7:04:01").is_err());
        assert!(MacAddr::new("02:2a:2c:f7:04").is_err());
        assert!(MacAddr::new("022a2cf70401").is_err());
    }

    #[test]
    fn mac_octets_round_trip() {
        let mac = MacAddr::new("aa:bb:cc:dd:ee:01").unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(
            MacAddr::from_octets(&mac.octets()).unwrap().to_string(),
            "aa:bb:cc:dd:ee:01"
        );
    }

    #[test]
    fn duid_link_layer_form() {
        let duid = Duid::new_link_layer(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02]);
        assert_eq!(duid.to_string(), "00:03:00:01:aa:bb:cc:dd:ee:02");
        assert_eq!(
            duid.to_bytes(),
            vec![0x00, 0x03, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02]
        );
    }

    #[test]
    fn duid_rejects_garbage() {
        assert!(Duid::new("").is_err());
        assert!(Duid::new("0003").is_err());
        assert!(Duid::new("zz:zz").is_err());
        assert!(Duid::new("00:03:00:01:aa:bb:cc:dd:ee:02").is_ok());
    }

    #[test]
    fn prefix_len_boundaries() {
        assert!(PrefixLen::new(7).is_err());
        assert!(PrefixLen::new(8).is_ok());
        assert!(PrefixLen::new(128).is_ok());
        assert!(PrefixLen::new(129).is_err());
    }

    #[test]
    fn iaid_boundaries() {
        assert!(Iaid::new(u64::from(u32::MAX)).is_ok());
        assert!(Iaid::new(u64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn transaction_id_boundaries() {
        assert!(TransactionId::new((1 << 24) - 1).is_ok());
        assert!(TransactionId::new(1 << 24).is_err());
        assert!(TransactionId::random().get() <= TRANSACTION_ID_MAX);
    }
}
