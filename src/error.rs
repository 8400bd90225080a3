//! Error types for the Oxxius driver.
//!
//! `LaserError` is the single error type returned by the transaction engine and
//! the device facades. It follows the same layout as the rest of the crate:
//! a `thiserror` enum with `#[from]` conversions so `?` works across layers.
//!
//! ## Error Hierarchy
//!
//! - **`TransportTimeout`**: the device produced no reply bytes within the
//!   configured read window. Fatal during handle construction, retryable for
//!   ordinary get/set calls.
//! - **`Decode`**: a reply arrived but does not parse into the expected type
//!   (non-numeric fault code, a boolean token other than `0`/`1`, ...).
//! - **`Unsupported`**: the selected protocol profile has no mnemonic for the
//!   requested command or query. Raised before anything is written.
//! - **`Io`** / **`Serial`**: raw transport failures.
//! - **`Config`** / **`Configuration`**: configuration parsing and semantic
//!   validation failures.
//!
//! Domain-constraint violations on setters are *not* errors: they are reported
//! through [`ValidationError`] inside a rejected
//! [`SetOutcome`](crate::hardware::SetOutcome).

use crate::protocol::Profile;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type LaserResult<T> = std::result::Result<T, LaserError>;

#[derive(Error, Debug)]
pub enum LaserError {
    #[error("No reply from '{port}' within {timeout:?}")]
    TransportTimeout { port: String, timeout: Duration },

    #[error("Could not decode reply '{reply}' to '{mnemonic}': {reason}")]
    Decode {
        mnemonic: String,
        reply: String,
        reason: String,
    },

    #[error("'{item}' is not part of the {profile} protocol profile")]
    Unsupported { item: String, profile: Profile },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl LaserError {
    /// Build a decode failure for a reply to `mnemonic`.
    pub fn decode(mnemonic: &str, reply: &str, reason: impl Into<String>) -> Self {
        LaserError::Decode {
            mnemonic: mnemonic.to_string(),
            reply: reply.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures a caller may retry on an already-constructed handle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LaserError::TransportTimeout { .. } | LaserError::Decode { .. }
        )
    }
}

/// A setter argument that violates a domain constraint.
///
/// The command is never transmitted when one of these is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Power setpoint {value} mW is negative or not a number")]
    InvalidPower { value: f64 },

    #[error("Power setpoint {value} mW outside [0, {max}] mW")]
    PowerOutOfRange { value: f64, max: f64 },

    #[error("Current setpoint {value}% outside [0, 100]%")]
    CurrentOutOfRange { value: f64 },

    #[error("Percentage split {value}% outside [0, 100]%")]
    PercentageOutOfRange { value: f64 },

    #[error("Digital modulation requires constant-current mode")]
    RequiresConstantCurrent,
}
