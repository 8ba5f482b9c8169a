//! Error types for the AT protocol.

use thiserror::Error;

/// Errors that can occur when building or interpreting AT protocol data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Too many variables for a single Ubidots payload.
    #[error("too many variables: max {max}, got {actual}")]
    TooManyVariables { max: usize, actual: usize },

    /// Variable names and values do not line up.
    #[error("variable count mismatch: {names} names, {values} values")]
    VariableCountMismatch { names: usize, values: usize },

    /// A reply line could not be parsed.
    #[error("failed to parse reply: {0}")]
    ParseError(String),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
