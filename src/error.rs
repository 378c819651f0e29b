//! Error types for the LWM2M client

use lwm2m_senml::SenMLError;
use thiserror::Error;

/// Closed result-code taxonomy shared by storage, data model, codecs and the
/// protocol state machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Unclassified failure
    #[error("operation failed: {0}")]
    Generic(String),

    /// An encode buffer or allocation limit was exceeded
    #[error("out of memory")]
    NoMemory,

    /// A capacity-bounded collection is full
    #[error("out of capacity")]
    OutOfCapacity,

    /// The caller has no access to the addressed entity
    #[error("no access")]
    NoAccess,

    /// The addressed entity does not exist
    #[error("not found")]
    NotFound,

    /// An entity with the requested id already exists
    #[error("already exists")]
    AlreadyExists,

    /// The operation is not permitted in the current state or by the resource's operations
    #[error("not allowed")]
    NotAllowed,

    /// A value violates bounds, an id is out of range, or a numeric conversion is inexact
    #[error("invalid value")]
    InvalidValue,

    /// A request or procedure timed out
    #[error("timeout")]
    Timeout,

    /// No converter is registered for the requested content format
    #[error("unsupported content format")]
    UnsupportedFormat,

    /// A payload could not be parsed
    #[error("format error: {0}")]
    FormatError(String),
}

impl Error {
    /// Create a generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Create a format error
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::FormatError(message.into())
    }
}

impl From<SenMLError> for Error {
    fn from(err: SenMLError) -> Self {
        Self::FormatError(err.to_string())
    }
}

/// Result type alias for LWM2M client operations
pub type Result<T> = std::result::Result<T, Error>;
