//! Error types for blescan-core.
//!
//! Errors fall into two groups, and the scan loop treats them differently:
//!
//! | Error Type | Raised by | Handling in [`crate::Scanner`] |
//! |------------|-----------|-------------------------------|
//! | [`Error::Bluetooth`] | BLE stack | Reported, cycle counts as zero devices |
//! | [`Error::AdapterUnavailable`] | BLE stack | Reported, adapter re-acquired next cycle |
//! | [`Error::Timeout`] | Discovery | Reported, cycle counts as zero devices |
//! | [`Error::Discovery`] | Discovery | Reported, cycle counts as zero devices |
//! | [`Error::InvalidConfig`] | Options | Fatal before the loop starts |
//! | [`Error::Io`] | Report output | Fatal, loop ends |
//! | [`Error::Json`] | Report output | Fatal, loop ends |
//!
//! Use [`Error::is_discovery_error`] to tell the two groups apart.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while scanning for BLE devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy stack error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is present or it could not be opened.
    #[error("No Bluetooth adapter available")]
    AdapterUnavailable,

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Any other failure reported by a discovery backend.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while writing a report.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON report could not be encoded.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a generic discovery failure.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error came from the discovery step.
    ///
    /// Discovery errors are recoverable: the scan loop reports them and
    /// carries on with the next cycle.
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            Self::Bluetooth(_) | Self::AdapterUnavailable | Self::Timeout { .. } | Self::Discovery(_)
        )
    }
}

/// Result type alias using blescan-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
