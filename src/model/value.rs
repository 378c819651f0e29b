//! Resource values and their declared types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Path;

/// Declared value type of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// No value; executable resources
    None,
    String,
    Integer,
    UnsignedInteger,
    Float,
    Boolean,
    Opaque,
    Time,
    ObjectLink,
    CoreLink,
}

/// An LWM2M object link `objectId:instanceId`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectLink {
    pub object_id: u16,
    pub instance_id: u16,
}

impl ObjectLink {
    pub const fn new(object_id: u16, instance_id: u16) -> Self {
        Self {
            object_id,
            instance_id,
        }
    }

    /// The null link `65535:65535`
    pub const fn null() -> Self {
        Self::new(u16::MAX, u16::MAX)
    }
}

impl fmt::Display for ObjectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_id, self.instance_id)
    }
}

impl FromStr for ObjectLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (object, instance) = s
            .split_once(':')
            .ok_or_else(|| Error::format(format!("invalid object link '{s}'")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u16>()
                .map_err(|_| Error::format(format!("invalid object link '{s}'")))
        };
        Ok(Self::new(parse(object)?, parse(instance)?))
    }
}

/// A typed value held by a resource instance or carried by a decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    String(String),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
    Opaque(Vec<u8>),
    /// Seconds since the Unix epoch
    Time(i64),
    ObjectLink(ObjectLink),
    CoreLink(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::None => DataType::None,
            Value::String(_) => DataType::String,
            Value::Integer(_) => DataType::Integer,
            Value::UnsignedInteger(_) => DataType::UnsignedInteger,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::Opaque(_) => DataType::Opaque,
            Value::Time(_) => DataType::Time,
            Value::ObjectLink(_) => DataType::ObjectLink,
            Value::CoreLink(_) => DataType::CoreLink,
        }
    }

    /// Type-appropriate initial value
    pub fn default_for(data_type: DataType) -> Value {
        match data_type {
            DataType::None => Value::None,
            DataType::String => Value::String(String::new()),
            DataType::Integer => Value::Integer(0),
            DataType::UnsignedInteger => Value::UnsignedInteger(0),
            DataType::Float => Value::Float(0.0),
            DataType::Boolean => Value::Boolean(false),
            DataType::Opaque => Value::Opaque(Vec::new()),
            DataType::Time => Value::Time(0),
            DataType::ObjectLink => Value::ObjectLink(ObjectLink::null()),
            DataType::CoreLink => Value::CoreLink(String::new()),
        }
    }

    /// Converts to `target` where the conversion is unambiguous
    ///
    /// Numeric conversions must be exact: a float with a fractional part or a
    /// value outside the target range fails with `InvalidValue`. String input
    /// is parsed according to `target` and fails with `FormatError`.
    pub fn coerce(&self, target: DataType) -> Result<Value> {
        if self.data_type() == target {
            return Ok(self.clone());
        }

        match (self, target) {
            (Value::String(s), _) => Value::parse_text(s, target),
            (Value::CoreLink(s), DataType::String) => Ok(Value::String(s.clone())),

            (Value::Float(f), DataType::Integer) => float_to_i64(*f).map(Value::Integer),
            (Value::Float(f), DataType::Time) => float_to_i64(*f).map(Value::Time),
            (Value::Float(f), DataType::UnsignedInteger) => {
                float_to_u64(*f).map(Value::UnsignedInteger)
            }

            (Value::Integer(i), DataType::Float) | (Value::Time(i), DataType::Float) => {
                Ok(Value::Float(*i as f64))
            }
            (Value::Integer(i), DataType::Time) => Ok(Value::Time(*i)),
            (Value::Time(i), DataType::Integer) => Ok(Value::Integer(*i)),
            (Value::Integer(i), DataType::UnsignedInteger)
            | (Value::Time(i), DataType::UnsignedInteger) => u64::try_from(*i)
                .map(Value::UnsignedInteger)
                .map_err(|_| Error::InvalidValue),

            (Value::UnsignedInteger(u), DataType::Float) => Ok(Value::Float(*u as f64)),
            (Value::UnsignedInteger(u), DataType::Integer) => i64::try_from(*u)
                .map(Value::Integer)
                .map_err(|_| Error::InvalidValue),
            (Value::UnsignedInteger(u), DataType::Time) => i64::try_from(*u)
                .map(Value::Time)
                .map_err(|_| Error::InvalidValue),

            (Value::Integer(0), DataType::Boolean) | (Value::UnsignedInteger(0), DataType::Boolean) => {
                Ok(Value::Boolean(false))
            }
            (Value::Integer(1), DataType::Boolean) | (Value::UnsignedInteger(1), DataType::Boolean) => {
                Ok(Value::Boolean(true))
            }
            (Value::Float(f), DataType::Boolean) if *f == 0.0 || *f == 1.0 => {
                Ok(Value::Boolean(*f == 1.0))
            }

            _ => Err(Error::InvalidValue),
        }
    }

    /// Parses a plain-text payload according to `target`
    pub fn parse_text(text: &str, target: DataType) -> Result<Value> {
        let parse_error = || Error::format(format!("cannot parse '{text}' as {target:?}"));
        let trimmed = text.trim();

        match target {
            DataType::String => Ok(Value::String(text.to_string())),
            DataType::CoreLink => Ok(Value::CoreLink(text.to_string())),
            DataType::Integer => trimmed
                .parse()
                .map(Value::Integer)
                .map_err(|_| parse_error()),
            DataType::UnsignedInteger => trimmed
                .parse()
                .map(Value::UnsignedInteger)
                .map_err(|_| parse_error()),
            DataType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float)
                .ok_or_else(parse_error),
            DataType::Time => trimmed.parse().map(Value::Time).map_err(|_| parse_error()),
            DataType::Boolean => match trimmed {
                "1" | "true" => Ok(Value::Boolean(true)),
                "0" | "false" => Ok(Value::Boolean(false)),
                _ => Err(parse_error()),
            },
            DataType::ObjectLink => trimmed.parse().map(Value::ObjectLink),
            DataType::Opaque => Ok(Value::Opaque(text.as_bytes().to_vec())),
            DataType::None => Err(Error::InvalidValue),
        }
    }

    /// Plain-text rendering, `None` for values that have no text form
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) | Value::CoreLink(s) => Some(s.clone()),
            Value::Integer(i) | Value::Time(i) => Some(i.to_string()),
            Value::UnsignedInteger(u) => Some(u.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::ObjectLink(link) => Some(link.to_string()),
            Value::Opaque(_) | Value::None => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::CoreLink(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) | Value::Time(i) => Some(*i),
            Value::UnsignedInteger(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UnsignedInteger(u) => Some(*u),
            Value::Integer(i) | Value::Time(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

fn float_to_i64(f: f64) -> Result<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(Error::InvalidValue)
    }
}

fn float_to_u64(f: f64) -> Result<u64> {
    if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 {
        Ok(f as u64)
    } else {
        Err(Error::InvalidValue)
    }
}

/// A path-tagged value: the unit exchanged between converters and the data model
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    pub path: Path,
    pub value: Value,
}

impl ResourceData {
    pub fn new(path: Path, value: Value) -> Self {
        Self { path, value }
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}
