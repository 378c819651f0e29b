//! Record mapping shared by the SenML-JSON and SenML-CBOR converters

use std::collections::VecDeque;

use lwm2m_senml::{NormalizedRecord, SenMLBuilder, SenMLPack, SenMLValue};
use tracing::trace;

use crate::converter::CodecState;
use crate::error::{Error, Result};
use crate::model::{Path, ResourceData, Value};

/// Decode queue and encode builder behind a SenML converter
///
/// Base names are resolved when decoding starts. Name parsing and value
/// mapping happen per `next_decoding` call, so a bad record surfaces at the
/// step that reaches it.
#[derive(Debug, Default)]
pub(crate) struct SenmlCodec {
    state: CodecState,
    request_path: Path,
    pending: VecDeque<lwm2m_senml::Result<NormalizedRecord>>,
    builder: SenMLBuilder,
    capacity: usize,
}

impl SenmlCodec {
    pub fn state(&self) -> CodecState {
        self.state
    }

    pub fn start_decoding(&mut self, path: &Path, pack: lwm2m_senml::Result<SenMLPack>) -> Result<()> {
        self.builder = SenMLBuilder::new();
        self.pending.clear();
        self.request_path = *path;

        match pack {
            Ok(pack) => {
                self.pending = pack.resolve().collect();
                self.state = CodecState::Decoding;
                Ok(())
            }
            Err(err) => {
                self.state = CodecState::Error;
                Err(err.into())
            }
        }
    }

    pub fn next_decoding(&mut self) -> Result<Option<ResourceData>> {
        match self.state {
            CodecState::Decoding => {}
            CodecState::Done => return Ok(None),
            _ => return Err(Error::generic("converter is not decoding")),
        }

        let Some(next) = self.pending.pop_front() else {
            self.state = CodecState::Done;
            return Ok(None);
        };

        match next.map_err(Error::from).and_then(|record| self.to_resource_data(record)) {
            Ok(data) => {
                trace!(path = %data.path, "Decoded SenML record");
                Ok(Some(data))
            }
            Err(err) => {
                self.state = CodecState::Error;
                self.pending.clear();
                Err(err)
            }
        }
    }

    fn to_resource_data(&self, record: NormalizedRecord) -> Result<ResourceData> {
        let path = if record.name.is_empty() {
            self.request_path
        } else {
            Path::parse(&record.name)?
        };

        let value = match record.value {
            SenMLValue::Number(v) => Value::Float(v),
            SenMLValue::String(s) => Value::String(s),
            SenMLValue::Boolean(b) => Value::Boolean(b),
            SenMLValue::ObjectLink(link) => Value::ObjectLink(link.parse()?),
            SenMLValue::Data(data) => Value::Opaque(data),
        };

        Ok(ResourceData::new(path, value))
    }

    pub fn start_encoding(&mut self, capacity: usize) -> Result<()> {
        self.pending.clear();
        self.builder = SenMLBuilder::new();
        self.capacity = capacity;
        self.state = CodecState::Encoding;
        Ok(())
    }

    pub fn next_encoding(&mut self, record: &ResourceData) -> Result<()> {
        if self.state != CodecState::Encoding {
            return Err(Error::generic("converter is not encoding"));
        }

        let result = encode_record(record);
        match result {
            Ok((base, name, value)) => {
                self.builder.push(&base, name, value);
                Ok(())
            }
            Err(err) => {
                self.state = CodecState::Error;
                Err(err)
            }
        }
    }

    /// Serializes the collected records with `serialize`
    pub fn finish_encoding<F>(&mut self, serialize: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&SenMLPack) -> lwm2m_senml::Result<Vec<u8>>,
    {
        if self.state != CodecState::Encoding {
            return Err(Error::generic("converter is not encoding"));
        }

        let pack = std::mem::take(&mut self.builder).build();
        let bytes = match serialize(&pack) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.state = CodecState::Error;
                return Err(err.into());
            }
        };

        if self.capacity > 0 && bytes.len() > self.capacity {
            self.state = CodecState::Error;
            return Err(Error::NoMemory);
        }

        self.state = CodecState::Done;
        Ok(bytes)
    }
}

/// Splits a record into `("/o/i/", "r" | "r/ri", value)`
fn encode_record(record: &ResourceData) -> Result<(String, String, SenMLValue)> {
    let path = &record.path;
    let (Some(object), Some(instance), Some(resource)) = (path.object, path.instance, path.resource)
    else {
        return Err(Error::InvalidValue);
    };

    let base = format!("/{object}/{instance}/");
    let name = match path.resource_instance {
        Some(resource_instance) => format!("{resource}/{resource_instance}"),
        None => resource.to_string(),
    };

    let value = match &record.value {
        Value::Integer(i) | Value::Time(i) => SenMLValue::Number(*i as f64),
        Value::UnsignedInteger(u) => SenMLValue::Number(*u as f64),
        Value::Float(f) => SenMLValue::Number(*f),
        Value::Boolean(b) => SenMLValue::Boolean(*b),
        Value::String(s) | Value::CoreLink(s) => SenMLValue::String(s.clone()),
        Value::Opaque(data) => SenMLValue::Data(data.clone()),
        Value::ObjectLink(link) => SenMLValue::ObjectLink(link.to_string()),
        Value::None => return Err(Error::generic(format!("no value to encode at {path}"))),
    };

    Ok((base, name, value))
}
