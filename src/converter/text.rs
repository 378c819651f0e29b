//! Plain-text content format (0): one resource value per payload

use super::{CodecState, DataConverter, Format};
use crate::error::{Error, Result};
use crate::model::{Path, ResourceData, Value};

/// Plain-text codec (content format 0)
///
/// Carries exactly one resource (instance) value. Decoded values are always
/// strings; the resource write coerces them to the declared type.
#[derive(Debug, Default)]
pub struct TextConverter {
    state: CodecState,
    decoded: Option<ResourceData>,
    encoded: Option<String>,
    capacity: usize,
}

impl TextConverter {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = CodecState::Error;
        err
    }
}

impl DataConverter for TextConverter {
    fn format(&self) -> Format {
        Format::Text
    }

    fn state(&self) -> CodecState {
        self.state
    }

    fn start_decoding(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        self.encoded = None;
        self.decoded = None;

        if path.resource.is_none() {
            return Err(self.fail(Error::InvalidValue));
        }
        let text = match std::str::from_utf8(data) {
            Ok(text) => text,
            Err(err) => return Err(self.fail(Error::format(err.to_string()))),
        };

        self.decoded = Some(ResourceData::new(*path, Value::String(text.to_string())));
        self.state = CodecState::Decoding;
        Ok(())
    }

    fn next_decoding(&mut self) -> Result<Option<ResourceData>> {
        match self.state {
            CodecState::Decoding => {
                let record = self.decoded.take();
                if record.is_none() {
                    self.state = CodecState::Done;
                }
                Ok(record)
            }
            CodecState::Done => Ok(None),
            _ => Err(Error::generic("converter is not decoding")),
        }
    }

    fn start_encoding(&mut self, capacity: usize) -> Result<()> {
        self.decoded = None;
        self.encoded = None;
        self.capacity = capacity;
        self.state = CodecState::Encoding;
        Ok(())
    }

    fn next_encoding(&mut self, record: &ResourceData) -> Result<()> {
        if self.state != CodecState::Encoding {
            return Err(Error::generic("converter is not encoding"));
        }
        if self.encoded.is_some() {
            return Err(self.fail(Error::generic("text format carries a single value")));
        }

        match record.value.to_text() {
            Some(text) => {
                self.encoded = Some(text);
                Ok(())
            }
            None => Err(self.fail(Error::generic(format!(
                "{:?} has no text representation",
                record.data_type()
            )))),
        }
    }

    fn finish_encoding(&mut self) -> Result<Vec<u8>> {
        if self.state != CodecState::Encoding {
            return Err(Error::generic("converter is not encoding"));
        }
        let Some(text) = self.encoded.take() else {
            return Err(self.fail(Error::NotFound));
        };
        if self.capacity > 0 && text.len() > self.capacity {
            return Err(self.fail(Error::NoMemory));
        }

        self.state = CodecState::Done;
        Ok(text.into_bytes())
    }
}
