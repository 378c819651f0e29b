//! SenML Pack - collection of SenML records

use crate::{Resolver, SenMLRecord};
use serde::{Deserialize, Serialize};

/// A SenML Pack represents an ordered collection of SenML records
///
/// According to RFC 8428, a SenML Pack is an array of SenML Records. Base
/// fields on any record apply to that record and the ones after it; use
/// [`SenMLPack::resolve`] to walk the pack with those bases applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SenMLPack {
    /// Array of SenML records
    pub records: Vec<SenMLRecord>,
}

impl SenMLPack {
    /// Create a new empty pack
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Add a record to this pack
    pub fn add_record(&mut self, record: SenMLRecord) {
        self.records.push(record);
    }

    /// Get the number of records in this pack
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if this pack is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in this pack
    pub fn iter(&self) -> impl Iterator<Item = &SenMLRecord> {
        self.records.iter()
    }

    /// Walk the pack, resolving base name and base time on every record
    pub fn resolve(&self) -> Resolver<'_> {
        Resolver::new(&self.records)
    }
}

impl FromIterator<SenMLRecord> for SenMLPack {
    fn from_iter<I: IntoIterator<Item = SenMLRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SenMLPack {
    type Item = SenMLRecord;
    type IntoIter = std::vec::IntoIter<SenMLRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a SenMLPack {
    type Item = &'a SenMLRecord;
    type IntoIter = std::slice::Iter<'a, SenMLRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
