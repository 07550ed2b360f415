//! Hand-over of results to whoever stores them.
//!
//! The validation only produces plain records: named fields holding numbers, text or sequences,
//! plus raw sample tables of captured waveforms. How and where they are persisted is up to the
//! [`Recorder`] implementation.

use std::fmt::Display;

/// A single value of a [`Record`] field.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A floating point number.
    Scalar(f64),
    /// A count or an index.
    Integer(i64),
    /// Free text, e.g., an error message.
    Text(String),
    /// A sequence of floating point numbers, e.g., all samples of a measurement.
    Sequence(Vec<f64>),
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        RecordValue::Scalar(value)
    }
}

impl From<usize> for RecordValue {
    fn from(value: usize) -> Self {
        RecordValue::Integer(value.try_into().unwrap_or(i64::MAX))
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::Text(value)
    }
}

impl From<Vec<f64>> for RecordValue {
    fn from(value: Vec<f64>) -> Self {
        RecordValue::Sequence(value)
    }
}

impl From<&[f64]> for RecordValue {
    fn from(value: &[f64]) -> Self {
        RecordValue::Sequence(value.to_vec())
    }
}

impl Display for RecordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordValue::Scalar(v) => write!(f, "{v}"),
            RecordValue::Integer(v) => write!(f, "{v}"),
            RecordValue::Text(v) => write!(f, "{v}"),
            RecordValue::Sequence(v) => write!(f, "{v:?}"),
        }
    }
}

/// Named fields in insertion order.
///
/// Setting a field that already exists replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    name: String,
    fields: Vec<(String, RecordValue)>,
}

impl Record {
    /// Create an empty record.
    pub fn new(name: &str) -> Self {
        Record {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Name of the record, e.g., the step of the test that produced it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a field, builder style.
    pub fn with(mut self, key: &str, value: impl Into<RecordValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field.
    pub fn set(&mut self, key: &str, value: impl Into<RecordValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// Get a field by name.
    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Append all fields of another record.
    pub fn extend(&mut self, other: Record) {
        for (key, value) in other.fields {
            self.set(&key, value);
        }
    }

    /// Iterate over the fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Receiver of validation results.
pub trait Recorder {
    /// Store a record of named values.
    fn record_values(&mut self, record: Record);

    /// Store a raw sample table, e.g., a captured waveform.
    fn record_samples(&mut self, name: &str, time: &[f64], voltage: &[f64]);
}

/// A raw sample table kept by the [`MemoryRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    /// Name the table was recorded under.
    pub name: String,
    /// Time in seconds.
    pub time: Vec<f64>,
    /// Voltage in volts.
    pub voltage: Vec<f64>,
}

/// A [`Recorder`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    /// All records in the order they were received.
    pub records: Vec<Record>,
    /// All sample tables in the order they were received.
    pub samples: Vec<SampleTable>,
}

impl MemoryRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last record with the given name.
    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().rev().find(|r| r.name() == name)
    }

    /// The last sample table with the given name.
    pub fn sample_table(&self, name: &str) -> Option<&SampleTable> {
        self.samples.iter().rev().find(|s| s.name == name)
    }
}

impl Recorder for MemoryRecorder {
    fn record_values(&mut self, record: Record) {
        log::debug!("Recording {} fields for {}", record.len(), record.name());
        self.records.push(record);
    }

    fn record_samples(&mut self, name: &str, time: &[f64], voltage: &[f64]) {
        log::debug!("Recording {} samples for {name}", time.len());
        self.samples.push(SampleTable {
            name: name.to_string(),
            time: time.to_vec(),
            voltage: voltage.to_vec(),
        });
    }
}
