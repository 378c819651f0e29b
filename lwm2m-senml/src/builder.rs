//! Builder pattern for creating SenML packs

use crate::{SenMLPack, SenMLRecord, SenMLValue};

/// Builder for creating SenML packs with a fluent API
///
/// Records are added as `(base, name, value)` triples. A `bn` field is only
/// emitted when `base` differs from the base name currently in effect, so
/// consecutive records under the same prefix share a single `bn`.
#[derive(Debug, Default)]
pub struct SenMLBuilder {
    current_base: Option<String>,
    records: Vec<SenMLRecord>,
}

impl SenMLBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under `base` named `name`
    pub fn add<B, N>(mut self, base: B, name: N, value: SenMLValue) -> Self
    where
        B: AsRef<str>,
        N: Into<String>,
    {
        self.push(base.as_ref(), name, value);
        self
    }

    /// Add a record with an absolute time
    pub fn add_with_time<B, N>(mut self, base: B, name: N, value: SenMLValue, time: f64) -> Self
    where
        B: AsRef<str>,
        N: Into<String>,
    {
        self.push(base.as_ref(), name, value);
        if let Some(last) = self.records.last_mut() {
            last.t = Some(time);
        }
        self
    }

    /// Append a record in place, for callers that build incrementally
    pub fn push<N: Into<String>>(&mut self, base: &str, name: N, value: SenMLValue) {
        let mut record = SenMLRecord::with_value(name, value);

        if self.current_base.as_deref() != Some(base) {
            record.bn = Some(base.to_string());
            self.current_base = Some(base.to_string());
        }

        self.records.push(record);
    }

    /// Number of records added so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no record was added yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build the SenML pack
    pub fn build(self) -> SenMLPack {
        SenMLPack {
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_base_name_emitted_once() {
        let pack = SenMLBuilder::new()
            .add("/1/0/", "0", SenMLValue::Number(1.0))
            .add("/1/0/", "1", SenMLValue::Number(300.0))
            .add("/1/0/", "7", SenMLValue::String("U".into()))
            .build();

        assert_eq!(pack.len(), 3);
        assert_eq!(pack.records[0].bn.as_deref(), Some("/1/0/"));
        assert!(pack.records[1].bn.is_none());
        assert!(pack.records[2].bn.is_none());
    }

    #[test]
    fn test_base_name_changes_with_prefix() {
        let pack = SenMLBuilder::new()
            .add("/0/0/", "1", SenMLValue::Boolean(true))
            .add("/0/1/", "1", SenMLValue::Boolean(false))
            .build();

        assert_eq!(pack.records[0].bn.as_deref(), Some("/0/0/"));
        assert_eq!(pack.records[1].bn.as_deref(), Some("/0/1/"));
    }

    #[test]
    fn test_time_is_attached() {
        let pack = SenMLBuilder::new()
            .add_with_time("/3303/0/", "5700", SenMLValue::Number(20.5), 1700000000.0)
            .build();

        assert_eq!(pack.records[0].t, Some(1700000000.0));
    }
}
