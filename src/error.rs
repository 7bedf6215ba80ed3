//! Unified error type for bthid.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data, and
//! the whole enum is `Copy` so a failed mode can keep its cause.

use core::fmt;

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Malformed address or name, out-of-range report id, mismatched
    /// peer service.
    InvalidArgument,

    /// The required mode/adapter is not active, not enabled, or already
    /// connected.
    InvalidState,

    /// Device or key lookup miss.
    NotFound,

    /// Scan or handshake did not complete in time.
    Timeout,

    /// Feature excluded at build time or refused by the active profile.
    NotSupported,

    /// One-shot radio stack error; a mode transition proceeds anyway.
    Transient(RadioError),

    /// The radio stack cannot be reconfigured without a restart.
    NeedsReboot,

    /// Persisted configuration could not be read or written.
    Storage,

    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Failure reported by the vendor radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Raw vendor status code.
    Raw(i32),
    /// The stack is busy with another procedure.
    Busy,
    /// The stack ran out of memory or handles.
    NoMemory,
    /// The call was issued in the wrong stack state.
    WrongState,
    /// Generic failure without a code.
    Failed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::NotFound => write!(f, "not found"),
            Self::Timeout => write!(f, "timeout"),
            Self::NotSupported => write!(f, "not supported"),
            Self::Transient(e) => write!(f, "radio error: {}", e),
            Self::NeedsReboot => write!(f, "reboot required"),
            Self::Storage => write!(f, "storage error"),
            Self::BufferOverflow => write!(f, "buffer overflow"),
        }
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(code) => write!(f, "code {:#x}", code),
            Self::Busy => write!(f, "busy"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::WrongState => write!(f, "wrong stack state"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for Error {}

// Convenience conversions

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Error::Transient(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_error_converts_to_transient() {
        let e: Error = RadioError::Busy.into();
        assert_eq!(e, Error::Transient(RadioError::Busy));
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Error::NeedsReboot.to_string(), "reboot required");
        assert_eq!(
            Error::Transient(RadioError::Raw(0x103)).to_string(),
            "radio error: code 0x103"
        );
    }
}
