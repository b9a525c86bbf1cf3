//! Typed error taxonomy for memory domains, watchpoints and debugger hooks.

use std::fmt;

use thiserror::Error;

use crate::api::StepType;
use crate::watch::CallbackType;

/// Convenience alias for results carrying a [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Coarse error kinds callers branch on instead of matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorKind {
    /// Negative address, address past the end, range past the end or an empty range.
    AddressOutOfRange,
    /// Poke attempted on a domain without a write accessor.
    ReadOnlyDomainWrite,
    /// No domain with the requested name (lookup is case-insensitive).
    DomainNotFound,
    /// Register, callback type, scope or step mode this core does not provide.
    UnsupportedCapability,
    /// The storage behind a domain could not complete the access.
    BackendUnavailable,
}

/// Failure reported by a custom domain accessor, for example a stopped engine thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{reason}")]
pub struct AccessFault {
    /// Human readable cause.
    pub reason: String,
}

impl AccessFault {
    /// Fault with the given cause.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Feature a caller asked for that the core does not provide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Capability {
    /// Named CPU register or flag.
    Register(String),
    /// Memory callbacks of one access type.
    Callback(CallbackType),
    /// Memory callbacks restricted to a scope the core cannot observe.
    CallbackScope(String),
    /// Debugger stepping granularity.
    Step(StepType),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(name) => write!(f, "register \"{name}\""),
            Self::Callback(kind) => write!(f, "{kind} callbacks"),
            Self::CallbackScope(scope) => write!(f, "callbacks on scope \"{scope}\""),
            Self::Step(step) => write!(f, "{step:?} stepping"),
        }
    }
}

/// Failures raised synchronously by the domain, watchpoint and debugger layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CoreError {
    /// Requested address is below zero.
    #[error("requested address {addr} is negative (memory domain {domain})")]
    AddressNegative {
        /// Domain the access targeted.
        domain: String,
        /// Offending address.
        addr: i64,
    },
    /// Requested address is at or past the end of the domain.
    #[error("requested address {addr:X} is outside of memory domain {domain}'s range of {size:X}")]
    AddressOutOfRange {
        /// Domain the access targeted.
        domain: String,
        /// Offending address.
        addr: i64,
        /// Domain size in bytes.
        size: u64,
    },
    /// Start address is valid but the range runs past the end of the domain.
    #[error(
        "requested address {addr:X} + {len:X} bytes is outside of memory domain {domain}'s range of {size:X}"
    )]
    RangeOutOfRange {
        /// Domain the access targeted.
        domain: String,
        /// Start address.
        addr: i64,
        /// Requested byte count.
        len: u64,
        /// Domain size in bytes.
        size: u64,
    },
    /// Requested byte count is below one.
    #[error("requested length {len} is less than 1 (memory domain {domain})")]
    InvalidLength {
        /// Domain the access targeted.
        domain: String,
        /// Requested byte count.
        len: u64,
    },
    /// Domain has no write accessor.
    #[error("the domain {domain} is not writable")]
    ReadOnlyDomainWrite {
        /// Domain the poke targeted.
        domain: String,
    },
    /// Unknown domain name.
    #[error("memory domain \"{name}\" does not exist")]
    DomainNotFound {
        /// Name as requested by the caller.
        name: String,
    },
    /// Feature absent on this core.
    #[error("{core} does not support {capability}")]
    UnsupportedCapability {
        /// Human readable core name.
        core: String,
        /// Requested feature.
        capability: Capability,
    },
    /// The domain's backend failed the access.
    #[error("memory domain {domain} could not access address {addr:X}: {fault}")]
    BackendFault {
        /// Domain the access targeted.
        domain: String,
        /// Offset within the domain.
        addr: u64,
        /// What the backend reported.
        fault: AccessFault,
    },
}

impl CoreError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AddressNegative { .. }
            | Self::AddressOutOfRange { .. }
            | Self::RangeOutOfRange { .. }
            | Self::InvalidLength { .. } => ErrorKind::AddressOutOfRange,
            Self::ReadOnlyDomainWrite { .. } => ErrorKind::ReadOnlyDomainWrite,
            Self::DomainNotFound { .. } => ErrorKind::DomainNotFound,
            Self::UnsupportedCapability { .. } => ErrorKind::UnsupportedCapability,
            Self::BackendFault { .. } => ErrorKind::BackendUnavailable,
        }
    }

    /// Name of the domain involved, for the kinds that carry one.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::AddressNegative { domain, .. }
            | Self::AddressOutOfRange { domain, .. }
            | Self::RangeOutOfRange { domain, .. }
            | Self::InvalidLength { domain, .. }
            | Self::ReadOnlyDomainWrite { domain }
            | Self::BackendFault { domain, .. } => Some(domain),
            Self::DomainNotFound { name } => Some(name),
            Self::UnsupportedCapability { .. } => None,
        }
    }

    pub(crate) fn unsupported(core: &str, capability: Capability) -> Self {
        tracing::warn!(core, %capability, "refusing unsupported capability");
        Self::UnsupportedCapability {
            core: core.to_owned(),
            capability,
        }
    }
}
