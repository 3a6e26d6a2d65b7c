// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Value rejected by a validated type or an API misuse.
    InvalidArgument,
    /// Configuration file missing, malformed or violating an invariant.
    InvalidConfig,
    /// Named interface not present on the host or MAC/link-local address
    /// not discoverable.
    Environment,
    /// Inbound packet could not be decoded as a DHCPv6 message.
    InvalidDhcpMessage,
    /// Receive timed out on a socket.
    Timeout,
    Bug,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidArgument => "invalid_argument",
                Self::InvalidConfig => "invalid_config",
                Self::Environment => "environment",
                Self::InvalidDhcpMessage => "invalid_dhcp_message",
                Self::Timeout => "timeout",
                Self::Bug => "bug",
            }
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PdError {
    kind: ErrorKind,
    msg: String,
}

impl PdError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::fmt::Display for PdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for PdError {}

impl From<std::io::Error> for PdError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Bug, format!("IO error: {e}"))
    }
}

impl From<std::ffi::NulError> for PdError {
    fn from(e: std::ffi::NulError) -> Self {
        Self::new(
            ErrorKind::InvalidArgument,
            format!("String contains NUL byte: {e}"),
        )
    }
}

impl From<rtnetlink::Error> for PdError {
    fn from(e: rtnetlink::Error) -> Self {
        Self::new(ErrorKind::Environment, format!("Netlink error: {e}"))
    }
}

impl From<serde_yaml::Error> for PdError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::InvalidConfig, format!("Invalid YAML: {e}"))
    }
}

pub(crate) trait ErrorContext<T> {
    /// Prepend `msg` to the error message, keeping the error kind.
    fn context(self, msg: &str) -> Result<T, PdError>;
}

impl<T> ErrorContext<T> for Result<T, PdError> {
    fn context(self, msg: &str) -> Result<T, PdError> {
        self.map_err(|e| PdError::new(e.kind, format!("{msg}: {}", e.msg)))
    }
}
