//! SenML resolution - applying running base values record by record

use crate::{Result, SenMLError, SenMLRecord, SenMLValue};

/// A fully resolved SenML record with the running base name and base time applied
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Full resolved name (running base name + record name)
    pub name: String,
    /// Resolved timestamp (running base time + record time), if any time was given
    pub time: Option<f64>,
    /// The single value carried by the record
    pub value: SenMLValue,
}

/// Streaming resolver over the records of a pack
///
/// Any record may replace the running base name or base time. Records that
/// carry only base fields yield nothing.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    records: &'a [SenMLRecord],
    position: usize,
    base_name: String,
    base_time: Option<f64>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver positioned before the first record
    pub fn new(records: &'a [SenMLRecord]) -> Self {
        Self {
            records,
            position: 0,
            base_name: String::new(),
            base_time: None,
        }
    }

    /// The running base name
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    fn resolve_record(&mut self, record: &SenMLRecord) -> Result<Option<NormalizedRecord>> {
        if let Some(ref bn) = record.bn {
            self.base_name = bn.clone();
        }
        if let Some(bt) = record.bt {
            if !bt.is_finite() {
                return Err(SenMLError::invalid_field_value("bt", bt.to_string().as_str()));
            }
            self.base_time = Some(bt);
        }

        let value = match record.value()? {
            Some(value) => value,
            None if record.n.is_some() || record.t.is_some() => {
                return Err(SenMLError::invalid_data("record without a value field"));
            }
            None => return Ok(None),
        };

        // Resolve name; a record without one inherits the base name in full
        let name = match &record.n {
            Some(n) => format!("{}{}", self.base_name, n),
            None => self.base_name.clone(),
        };

        // Resolve time (add base time if record time is relative)
        let time = match (self.base_time, record.t) {
            (Some(bt), Some(t)) => Some(bt + t),
            (Some(bt), None) => Some(bt),
            (None, Some(t)) => Some(t),
            (None, None) => None,
        };

        Ok(Some(NormalizedRecord { name, time, value }))
    }
}

impl Iterator for Resolver<'_> {
    type Item = Result<NormalizedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let records = self.records;
        while self.position < records.len() {
            let record = &records[self.position];
            self.position += 1;

            match self.resolve_record(record) {
                Ok(Some(resolved)) => return Some(Ok(resolved)),
                Ok(None) => continue,
                Err(e) => {
                    // Stop after the first failure
                    self.position = records.len();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
