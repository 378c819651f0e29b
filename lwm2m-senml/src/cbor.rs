//! CBOR serialization support for SenML
//!
//! RFC 8428 section 6 replaces the JSON field names with integer labels in
//! CBOR. LWM2M adds the object link field, which keeps its text label.

#[cfg(feature = "cbor")]
use ciborium::value::Value;

#[cfg(feature = "cbor")]
use crate::{Result, SenMLError, SenMLPack, SenMLRecord};

/// SenML CBOR labels
#[cfg(feature = "cbor")]
pub mod labels {
    pub const BASE_NAME: i64 = -2;
    pub const BASE_TIME: i64 = -3;
    pub const NAME: i64 = 0;
    pub const VALUE: i64 = 2;
    pub const STRING_VALUE: i64 = 3;
    pub const BOOL_VALUE: i64 = 4;
    pub const TIME: i64 = 6;
    pub const DATA_VALUE: i64 = 8;
    /// LWM2M object link, carried with a text label
    pub const OBJECT_LINK: &str = "vlo";
}

#[cfg(feature = "cbor")]
impl SenMLPack {
    /// Serialize to CBOR bytes
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let value = Value::Array(self.records.iter().map(record_to_cbor).collect::<Result<_>>()?);

        let mut buffer = Vec::new();
        ciborium::ser::into_writer(&value, &mut buffer)?;
        Ok(buffer)
    }

    /// Deserialize from CBOR bytes
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let value: Value = ciborium::de::from_reader(bytes)?;

        let Value::Array(items) = value else {
            return Err(SenMLError::deserialization("SenML CBOR pack must be an array"));
        };

        items.iter().map(record_from_cbor).collect()
    }
}

#[cfg(feature = "cbor")]
fn label(value: i64) -> Value {
    Value::Integer(value.into())
}

/// Integral numbers are written as CBOR integers, everything else as floats
#[cfg(feature = "cbor")]
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Value::Integer((value as i64).into())
    } else {
        Value::Float(value)
    }
}

#[cfg(feature = "cbor")]
fn record_to_cbor(record: &SenMLRecord) -> Result<Value> {
    let mut map = Vec::new();

    if let Some(ref bn) = record.bn {
        map.push((label(labels::BASE_NAME), Value::Text(bn.clone())));
    }
    if let Some(bt) = record.bt {
        map.push((label(labels::BASE_TIME), number(bt)));
    }
    if let Some(ref n) = record.n {
        map.push((label(labels::NAME), Value::Text(n.clone())));
    }
    if let Some(t) = record.t {
        map.push((label(labels::TIME), number(t)));
    }
    if let Some(v) = record.v {
        map.push((label(labels::VALUE), number(v)));
    }
    if let Some(ref vs) = record.vs {
        map.push((label(labels::STRING_VALUE), Value::Text(vs.clone())));
    }
    if let Some(vb) = record.vb {
        map.push((label(labels::BOOL_VALUE), Value::Bool(vb)));
    }
    if let Some(ref vlo) = record.vlo {
        map.push((Value::Text(labels::OBJECT_LINK.to_string()), Value::Text(vlo.clone())));
    }
    if record.vd.is_some() {
        // CBOR carries opaque data as a byte string rather than base64
        if let Some(crate::SenMLValue::Data(data)) = record.value()? {
            map.push((label(labels::DATA_VALUE), Value::Bytes(data)));
        }
    }

    Ok(Value::Map(map))
}

#[cfg(feature = "cbor")]
fn as_number(field: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Integer(i) => Ok(i128::from(*i) as f64),
        Value::Float(f) => Ok(*f),
        _ => Err(SenMLError::invalid_field_value(field, "expected a number")),
    }
}

#[cfg(feature = "cbor")]
fn as_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(SenMLError::invalid_field_value(field, "expected a text string")),
    }
}

#[cfg(feature = "cbor")]
fn record_from_cbor(value: &Value) -> Result<SenMLRecord> {
    let Value::Map(entries) = value else {
        return Err(SenMLError::deserialization("SenML CBOR record must be a map"));
    };

    let mut record = SenMLRecord::new();

    for (key, value) in entries {
        match key {
            Value::Integer(i) => match i128::from(*i) as i64 {
                labels::BASE_NAME => record.bn = Some(as_text("bn", value)?),
                labels::BASE_TIME => record.bt = Some(as_number("bt", value)?),
                labels::NAME => record.n = Some(as_text("n", value)?),
                labels::TIME => record.t = Some(as_number("t", value)?),
                labels::VALUE => record.v = Some(as_number("v", value)?),
                labels::STRING_VALUE => record.vs = Some(as_text("vs", value)?),
                labels::BOOL_VALUE => match value {
                    Value::Bool(b) => record.vb = Some(*b),
                    _ => return Err(SenMLError::invalid_field_value("vb", "expected a boolean")),
                },
                labels::DATA_VALUE => match value {
                    Value::Bytes(data) => {
                        let encoded = SenMLRecord::from(crate::SenMLValue::Data(data.clone()));
                        record.vd = encoded.vd;
                    }
                    _ => return Err(SenMLError::invalid_field_value("vd", "expected a byte string")),
                },
                // Units, sums and other labels carry nothing LWM2M uses
                _ => {}
            },
            Value::Text(name) if name == labels::OBJECT_LINK => {
                record.vlo = Some(as_text("vlo", value)?);
            }
            _ => {}
        }
    }

    Ok(record)
}

/// CBOR-specific utilities
#[cfg(feature = "cbor")]
pub mod utils {
    /// Content-Type for SenML CBOR format
    pub const SENML_CBOR_CONTENT_TYPE: &str = "application/senml+cbor";

    /// Check CBOR major type of the data
    pub fn get_cbor_major_type(bytes: &[u8]) -> Option<u8> {
        bytes.first().map(|b| b >> 5)
    }

    /// Check if CBOR data starts with array (major type 4)
    pub fn is_cbor_array(bytes: &[u8]) -> bool {
        get_cbor_major_type(bytes) == Some(4)
    }
}

#[cfg(test)]
#[cfg(feature = "cbor")]
mod tests {
    use super::*;
    use crate::{SenMLBuilder, SenMLValue};

    #[test]
    fn test_cbor_roundtrip_all_value_kinds() {
        let pack = SenMLBuilder::new()
            .add("/0/1/", "0", SenMLValue::String("coap://server".into()))
            .add("/0/1/", "1", SenMLValue::Boolean(false))
            .add("/0/1/", "3", SenMLValue::Data(vec![0x00, 0xFF, 0x10]))
            .add("/0/1/", "10", SenMLValue::Number(101.0))
            .add("/1/0/", "10", SenMLValue::ObjectLink("2:0".into()))
            .add("/3303/0/", "5700", SenMLValue::Number(21.25))
            .build();

        let bytes = pack.to_cbor().unwrap();
        assert!(utils::is_cbor_array(&bytes));

        let restored = SenMLPack::from_cbor(&bytes).unwrap();
        assert_eq!(pack, restored);
    }

    #[test]
    fn test_integer_labels_are_used() {
        let pack = SenMLBuilder::new()
            .add("/3/0/", "9", SenMLValue::Number(80.0))
            .build();
        let bytes = pack.to_cbor().unwrap();

        let value: Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        let Value::Array(items) = value else {
            panic!("expected array");
        };
        let Value::Map(entries) = &items[0] else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, Value::Integer((-2i64).into()));
        assert_eq!(entries[2], (Value::Integer(2i64.into()), Value::Integer(80i64.into())));
    }

    #[test]
    fn test_non_array_is_rejected() {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&Value::Bool(true), &mut bytes).unwrap();
        assert!(SenMLPack::from_cbor(&bytes).is_err());
    }
}
