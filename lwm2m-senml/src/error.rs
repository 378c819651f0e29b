//! Error types for SenML operations

use thiserror::Error;

/// Result type alias for SenML operations
pub type Result<T> = std::result::Result<T, SenMLError>;

/// Errors that can occur during SenML operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SenMLError {
    /// Invalid SenML structure or data
    #[error("Invalid SenML data: {message}")]
    InvalidData { message: String },

    /// Invalid field value
    #[error("Invalid value for field '{field}': {value}")]
    InvalidFieldValue { field: String, value: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Deserialization error
    #[error("Deserialization error: {message}")]
    DeserializationError { message: String },
}

impl SenMLError {
    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid field value error
    pub fn invalid_field_value<S: Into<String>>(field: S, value: S) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a deserialization error
    pub fn deserialization<S: Into<String>>(message: S) -> Self {
        Self::DeserializationError {
            message: message.into(),
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for SenMLError {
    fn from(err: serde_json::Error) -> Self {
        Self::DeserializationError {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "cbor")]
impl From<ciborium::de::Error<std::io::Error>> for SenMLError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::DeserializationError {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "cbor")]
impl From<ciborium::ser::Error<std::io::Error>> for SenMLError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}
