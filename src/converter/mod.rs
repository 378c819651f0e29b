//! Pluggable streaming codecs between wire payloads and [`ResourceData`] records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Path, ResourceData};

pub mod cbor;
pub mod json;
mod senml;
pub mod text;

pub use cbor::CborConverter;
pub use json::JsonConverter;
pub use text::TextConverter;

/// LWM2M content formats, by CoAP content-format id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Text,
    LinkFormat,
    Opaque,
    SenmlJson,
    SenmlCbor,
}

impl Format {
    pub const fn id(self) -> u16 {
        match self {
            Format::Text => 0,
            Format::LinkFormat => 40,
            Format::Opaque => 42,
            Format::SenmlJson => lwm2m_senml::content_format::SENML_JSON,
            Format::SenmlCbor => lwm2m_senml::content_format::SENML_CBOR,
        }
    }
}

impl TryFrom<u16> for Format {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self> {
        match id {
            0 => Ok(Format::Text),
            40 => Ok(Format::LinkFormat),
            42 => Ok(Format::Opaque),
            110 => Ok(Format::SenmlJson),
            112 => Ok(Format::SenmlCbor),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

impl From<Format> for u16 {
    fn from(format: Format) -> Self {
        format.id()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Codec pipeline state; decoding and encoding never run at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecState {
    #[default]
    Idle,
    Decoding,
    Encoding,
    Done,
    Error,
}

/// A streaming codec for one content format
///
/// Decoding: `start_decoding` then `next_decoding` until it yields `None`.
/// Encoding: `start_encoding`, one `next_encoding` per record, then
/// `finish_encoding`. Starting either pipeline discards the previous one.
pub trait DataConverter {
    fn format(&self) -> Format;

    fn state(&self) -> CodecState;

    /// `path` is the request target, used for records that carry no name
    fn start_decoding(&mut self, path: &Path, data: &[u8]) -> Result<()>;

    /// Next decoded record, `None` once the payload is exhausted
    fn next_decoding(&mut self) -> Result<Option<ResourceData>>;

    /// `capacity` bounds the encoded size in bytes, 0 for unbounded
    fn start_encoding(&mut self, capacity: usize) -> Result<()>;

    fn next_encoding(&mut self, record: &ResourceData) -> Result<()>;

    /// Fails with `NoMemory` when the output exceeds the capacity
    fn finish_encoding(&mut self) -> Result<Vec<u8>>;
}

/// Encodes `records` in one pass
pub fn encode_all(
    converter: &mut dyn DataConverter,
    records: &[ResourceData],
    capacity: usize,
) -> Result<Vec<u8>> {
    converter.start_encoding(capacity)?;
    for record in records {
        converter.next_encoding(record)?;
    }
    converter.finish_encoding()
}

/// Decodes a whole payload into records
pub fn decode_all(converter: &mut dyn DataConverter, path: &Path, data: &[u8]) -> Result<Vec<ResourceData>> {
    converter.start_decoding(path, data)?;
    let mut records = Vec::new();
    while let Some(record) = converter.next_decoding()? {
        records.push(record);
    }
    Ok(records)
}

/// The converters registered by default: SenML-JSON, SenML-CBOR and plain text
pub fn default_converters() -> Vec<Box<dyn DataConverter>> {
    vec![
        Box::new(JsonConverter::new()),
        Box::new(CborConverter::new()),
        Box::new(TextConverter::new()),
    ]
}
