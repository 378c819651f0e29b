//! JSON serialization support for SenML

#[cfg(feature = "json")]
use crate::{Result, SenMLError, SenMLPack};

#[cfg(feature = "json")]
impl SenMLPack {
    /// Serialize to compact JSON (no whitespace)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SenMLError::serialization(e.to_string()))
    }

    /// Serialize SenML pack to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SenMLError::serialization(e.to_string()))
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SenMLError::deserialization(e.to_string()))
    }

    /// Deserialize SenML pack from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SenMLError::deserialization(e.to_string()))
    }
}

/// JSON-specific utilities
#[cfg(feature = "json")]
pub mod utils {
    /// Content-Type for SenML JSON format
    pub const SENML_JSON_CONTENT_TYPE: &str = "application/senml+json";

    /// Check if a payload looks like a SenML JSON array
    pub fn is_senml_json(data: &[u8]) -> bool {
        data.iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'[')
    }
}
