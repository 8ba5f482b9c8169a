//! Error types for the driver.

use espat_protocol::ProtocolError;
use thiserror::Error;

/// Errors reported by driver operations.
///
/// None of these is fatal: the driver stays usable and the caller decides
/// whether to retry, reset, or give up.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No qualifying line arrived within the budget.
    #[error("timeout waiting for '{expected}'")]
    Timeout {
        /// Token that was expected.
        expected: String,
    },

    /// A line arrived but did not match.
    #[error("expected '{expected}', got '{received}'")]
    Mismatch {
        /// Token that was expected.
        expected: String,
        /// Line that was received.
        received: String,
    },

    /// An explicit error token was observed.
    #[error("modem reported '{sentinel}'")]
    SentinelMatched {
        /// The sentinel that matched.
        sentinel: String,
    },

    /// The reply line exceeded the buffer and was truncated.
    #[error("reply overran buffer while waiting for '{expected}' (kept {kept} bytes)")]
    BufferOverrun {
        /// Token that was expected.
        expected: String,
        /// Number of bytes kept.
        kept: usize,
    },

    /// The length announcement was not acknowledged; no payload was written.
    #[error("length announcement of {length} bytes was not acknowledged")]
    FramingFailure {
        /// Announced payload length.
        length: usize,
    },

    /// A request needs an open TCP session with a known host.
    #[error("no open TCP session")]
    NotConnected,

    /// The requested mode is outside this driver's profile.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Boot marker does not fit.
    #[error("boot marker too long: max {max} bytes, got {actual}")]
    BootMarkerTooLong {
        /// Maximum length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Protocol-level error (payload building).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Writing to the transport failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
