// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use serde::Deserialize;

use crate::{ErrorKind, PdError};

const DEFAULT_RETRY_TIME: u64 = 60;
const DEFAULT_EXPIRE_TIME_MULTI: f64 = 1.5;

/// Daemon configuration, loaded once at startup and never mutated. Unknown
/// keys are ignored.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct Config {
    /// Retransmission timeout in seconds for the Solicited, Requested,
    /// Renewing and Rebinding states.
    #[serde(default = "default_retry_time")]
    pub retry_time: u64,
    /// Multiplier applied to T2 to derive the absolute lease-expire timer.
    #[serde(default = "default_expire_time_multi")]
    pub expire_time_multi: f64,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub prefixes: Vec<PrefixConfig>,
}

#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    /// Auto-discovered from the OS when not given.
    #[serde(default)]
    pub mac: Option<String>,
    /// Link-local address, auto-discovered from the OS when not given.
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct PrefixConfig {
    /// Must name an entry of `interfaces`.
    pub interface: String,
    /// Client DUID in colon-hex form, unique across all prefixes.
    pub duid: String,
    pub address: String,
    pub length: u8,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, PdError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PdError::new(
                ErrorKind::InvalidConfig,
                format!(
                    "Failed to read configuration file {}: {e}",
                    path.display()
                ),
            )
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

fn default_retry_time() -> u64 {
    DEFAULT_RETRY_TIME
}

fn default_expire_time_multi() -> f64 {
    DEFAULT_EXPIRE_TIME_MULTI
}
