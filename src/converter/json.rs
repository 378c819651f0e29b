//! SenML-JSON content format (110)

use lwm2m_senml::SenMLPack;

use super::senml::SenmlCodec;
use super::{CodecState, DataConverter, Format};
use crate::error::Result;
use crate::model::{Path, ResourceData};

/// SenML-JSON codec (content format 110)
#[derive(Debug, Default)]
pub struct JsonConverter {
    codec: SenmlCodec,
}

impl JsonConverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataConverter for JsonConverter {
    fn format(&self) -> Format {
        Format::SenmlJson
    }

    fn state(&self) -> CodecState {
        self.codec.state()
    }

    fn start_decoding(&mut self, path: &Path, data: &[u8]) -> Result<()> {
        self.codec.start_decoding(path, SenMLPack::from_json_bytes(data))
    }

    fn next_decoding(&mut self) -> Result<Option<ResourceData>> {
        self.codec.next_decoding()
    }

    fn start_encoding(&mut self, capacity: usize) -> Result<()> {
        self.codec.start_encoding(capacity)
    }

    fn next_encoding(&mut self, record: &ResourceData) -> Result<()> {
        self.codec.next_encoding(record)
    }

    fn finish_encoding(&mut self) -> Result<Vec<u8>> {
        self.codec.finish_encoding(SenMLPack::to_json_bytes)
    }
}
