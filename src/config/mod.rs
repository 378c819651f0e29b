//! Client configuration

use serde::{Deserialize, Serialize};

use crate::converter::Format;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint client name sent in Register and Bootstrap-Request
    pub endpoint_name: String,

    /// LWM2M version sent in Register
    pub lwm2m_version: String,

    /// Fraction of the lifetime after which an Update is sent
    pub lifetime_scale: f64,

    /// Bootstrap timeout in seconds
    pub bootstrap_timeout: u64,

    /// Content format for Bootstrap-Request and Send
    pub preferred_format: Format,

    pub queue_mode: bool,

    /// Initial registration delay in seconds when the Server object does not set one
    pub initial_registration_delay: u64,

    /// Communication sequence delay in seconds when the Server object does not set one
    pub sequence_delay: u64,

    /// Communication sequence retry count when the Server object does not set one
    pub sequence_retry_count: u32,

    /// Encode buffer size in bytes, 0 for unbounded
    pub encode_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_name: "lwm2m-client".to_string(),
            lwm2m_version: "1.1".to_string(),
            lifetime_scale: 0.5,
            bootstrap_timeout: 60,
            preferred_format: Format::SenmlJson,
            queue_mode: false,
            initial_registration_delay: 0,
            sequence_delay: 86400,
            sequence_retry_count: 1,
            encode_capacity: 1024,
        }
    }
}

impl ClientConfig {
    pub fn new<S: Into<String>>(endpoint_name: S) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration document; absent keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::format(e.to_string()))?;
        if !(config.lifetime_scale > 0.0 && config.lifetime_scale <= 1.0) {
            return Err(Error::InvalidValue);
        }
        Ok(config)
    }
}
