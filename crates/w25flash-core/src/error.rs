//! Error types for w25flash-core
//!
//! This module provides a no_std compatible error type that is used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
///
/// Every fallible operation in this crate returns one of these outcomes.
/// None of them are recoverable by retrying at the same layer; retry
/// policy, if any, belongs to the caller, and a whole logical operation
/// must be retried from scratch (a partially-sent command sequence cannot
/// be resumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The bus did not complete a byte exchange within its bounded time window
    TransportTimeout,
    /// Address is beyond the chip's 8 MiB address space
    InvalidAddress,
    /// Length is outside the operation's contract (e.g. page program > 256 bytes)
    InvalidLength,
    /// The chip kept reporting busy until the poll deadline expired
    DeviceNotReady,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportTimeout => write!(f, "bus transfer timed out"),
            Self::InvalidAddress => write!(f, "address out of chip range"),
            Self::InvalidLength => write!(f, "length out of range for operation"),
            Self::DeviceNotReady => write!(f, "device stayed busy past the poll deadline"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
