//! SenML Record types and values

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::{Result, SenMLError};

/// A SenML Record as carried by LWM2M payloads
///
/// Base fields (`bn`, `bt`) may appear on any record and replace the running
/// base for that record and every following one. Exactly one value field is
/// expected on records that carry a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SenMLRecord {
    /// Base Name - prepended to this and following record names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bn: Option<String>,

    /// Base Time - added to this and following record times
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bt: Option<f64>,

    /// Name - appended to the running base name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Time - offset relative to the running base time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,

    /// Value - numeric value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,

    /// String Value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs: Option<String>,

    /// Boolean Value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vb: Option<bool>,

    /// Object Link Value - `"objectId:instanceId"` (LWM2M extension)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlo: Option<String>,

    /// Data Value - base64-encoded binary data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vd: Option<String>,
}

/// Union type for SenML values
#[derive(Debug, Clone, PartialEq)]
pub enum SenMLValue {
    /// Numeric value (`v`)
    Number(f64),
    /// String value (`vs`)
    String(String),
    /// Boolean value (`vb`)
    Boolean(bool),
    /// Object link (`vlo`), kept in its textual `"a:b"` form
    ObjectLink(String),
    /// Binary data (`vd`), already decoded
    Data(Vec<u8>),
}

impl SenMLRecord {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named record holding `value`
    pub fn with_value<S: Into<String>>(name: S, value: SenMLValue) -> Self {
        let mut record = Self::from(value);
        record.n = Some(name.into());
        record
    }

    /// Set the base name for this record
    pub fn with_base_name<S: Into<String>>(mut self, base_name: S) -> Self {
        self.bn = Some(base_name.into());
        self
    }

    /// Set the base time for this record
    pub fn with_base_time(mut self, base_time: f64) -> Self {
        self.bt = Some(base_time);
        self
    }

    /// Set the time offset for this record
    pub fn with_time(mut self, time: f64) -> Self {
        self.t = Some(time);
        self
    }

    /// Number of value fields present on this record
    fn value_count(&self) -> usize {
        [
            self.v.is_some(),
            self.vs.is_some(),
            self.vb.is_some(),
            self.vlo.is_some(),
            self.vd.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Check if this record has a value
    pub fn has_value(&self) -> bool {
        self.value_count() > 0
    }

    /// Get the value carried by this record
    ///
    /// Fails when more than one value field is present or when `vd` is not
    /// valid base64.
    pub fn value(&self) -> Result<Option<SenMLValue>> {
        if self.value_count() > 1 {
            return Err(SenMLError::invalid_data(
                "record carries more than one value field",
            ));
        }

        if let Some(v) = self.v {
            if !v.is_finite() {
                return Err(SenMLError::invalid_field_value("v", v.to_string().as_str()));
            }
            return Ok(Some(SenMLValue::Number(v)));
        }
        if let Some(ref vs) = self.vs {
            return Ok(Some(SenMLValue::String(vs.clone())));
        }
        if let Some(vb) = self.vb {
            return Ok(Some(SenMLValue::Boolean(vb)));
        }
        if let Some(ref vlo) = self.vlo {
            return Ok(Some(SenMLValue::ObjectLink(vlo.clone())));
        }
        if let Some(ref vd) = self.vd {
            let data = BASE64
                .decode(vd)
                .map_err(|e| SenMLError::invalid_field_value("vd".to_string(), e.to_string()))?;
            return Ok(Some(SenMLValue::Data(data)));
        }

        Ok(None)
    }
}

impl From<SenMLValue> for SenMLRecord {
    fn from(value: SenMLValue) -> Self {
        match value {
            SenMLValue::Number(n) => Self {
                v: Some(n),
                ..Default::default()
            },
            SenMLValue::String(s) => Self {
                vs: Some(s),
                ..Default::default()
            },
            SenMLValue::Boolean(b) => Self {
                vb: Some(b),
                ..Default::default()
            },
            SenMLValue::ObjectLink(link) => Self {
                vlo: Some(link),
                ..Default::default()
            },
            SenMLValue::Data(d) => Self {
                vd: Some(BASE64.encode(d)),
                ..Default::default()
            },
        }
    }
}
