//! Waveform preamble and the conversion of raw sample codes into engineering units.

use std::{fmt::Display, str::FromStr};

use thiserror::Error;

/// Number of comma separated fields in a `:WAV:PRE?` response.
pub const PREAMBLE_FIELDS: usize = 10;

/// Errors when parsing a waveform preamble.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PreambleError {
    /// The preamble does not have the expected number of fields.
    #[error("Preamble has {found} fields, expected {PREAMBLE_FIELDS}: {preamble}")]
    FieldCount {
        /// Number of fields found.
        found: usize,
        /// The preamble as received.
        preamble: String,
    },
    /// A field could not be parsed.
    #[error("Preamble field `{name}` has invalid value `{value}`")]
    InvalidField {
        /// Name of the field.
        name: &'static str,
        /// The value as received.
        value: String,
    },
}

/// Data format of the returned sample memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformFormat {
    /// Two bytes per sample.
    Word,
    /// One unsigned byte per sample.
    Byte,
    /// Comma separated ASCII values.
    Ascii,
}

impl WaveformFormat {
    /// Command argument for `:WAVeform:FORMat`.
    pub fn as_str(&self) -> &str {
        match self {
            WaveformFormat::Word => "WORD",
            WaveformFormat::Byte => "BYTE",
            WaveformFormat::Ascii => "ASCii",
        }
    }

    fn from_code(value: &str) -> Result<Self, PreambleError> {
        match value.trim() {
            "0" => Ok(WaveformFormat::Word),
            "1" => Ok(WaveformFormat::Byte),
            "2" => Ok(WaveformFormat::Ascii),
            _ => Err(PreambleError::InvalidField {
                name: "format",
                value: value.to_string(),
            }),
        }
    }
}

/// How raw codes are scaled into volts.
///
/// Instruments and firmware revisions disagree whether the vertical origin has to be added. Both
/// variants are available, [`VoltageScaling::WithOrigin`] is the default.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VoltageScaling {
    /// `voltage = (code - y_reference) * y_increment + y_origin`
    #[default]
    WithOrigin,
    /// `voltage = (code - y_reference) * y_increment`, i.e., `y_origin` is taken as zero.
    WithoutOrigin,
}

/// Scaling information that comes with every waveform transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Preamble {
    /// Format of the sample memory.
    pub format: WaveformFormat,
    /// Acquisition type code (normal, peak, average, high resolution).
    pub acquisition: u8,
    /// Number of points in the waveform.
    pub points: usize,
    /// Number of averages, one if not averaging.
    pub count: u32,
    /// Time between two samples in seconds.
    pub x_increment: f64,
    /// Time of the first sample in seconds.
    pub x_origin: f64,
    /// Reference sample in x direction.
    pub x_reference: f64,
    /// Volts per code.
    pub y_increment: f64,
    /// Vertical offset in codes.
    pub y_origin: f64,
    /// Code that corresponds to the vertical reference position.
    pub y_reference: f64,
}

impl Preamble {
    /// Time of the sample with the given index.
    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 * self.x_increment + self.x_origin
    }

    /// Voltage of a raw sample code.
    pub fn voltage_of(&self, code: u8, scaling: VoltageScaling) -> f64 {
        let volts = (f64::from(code) - self.y_reference) * self.y_increment;
        match scaling {
            VoltageScaling::WithOrigin => volts + self.y_origin,
            VoltageScaling::WithoutOrigin => volts,
        }
    }

    /// Convert raw sample codes into a [`Waveform`].
    pub fn decode(&self, codes: &[u8], scaling: VoltageScaling) -> Waveform {
        let time = (0..codes.len()).map(|i| self.time_at(i)).collect();
        let voltage = codes
            .iter()
            .map(|&code| self.voltage_of(code, scaling))
            .collect();
        Waveform { time, voltage }
    }
}

impl FromStr for Preamble {
    type Err = PreambleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if fields.len() != PREAMBLE_FIELDS {
            return Err(PreambleError::FieldCount {
                found: fields.len(),
                preamble: s.to_string(),
            });
        }

        Ok(Preamble {
            format: WaveformFormat::from_code(fields[0])?,
            acquisition: parse_field("type", fields[1])?,
            points: parse_field("points", fields[2])?,
            count: parse_field("count", fields[3])?,
            x_increment: parse_field("xincrement", fields[4])?,
            x_origin: parse_field("xorigin", fields[5])?,
            x_reference: parse_field("xreference", fields[6])?,
            y_increment: parse_field("yincrement", fields[7])?,
            y_origin: parse_field("yorigin", fields[8])?,
            y_reference: parse_field("yreference", fields[9])?,
        })
    }
}

fn parse_field<F: FromStr>(name: &'static str, value: &str) -> Result<F, PreambleError> {
    value.parse().map_err(|_| PreambleError::InvalidField {
        name,
        value: value.to_string(),
    })
}

/// A captured waveform as parallel time (s) and voltage (V) vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    /// Sample times in seconds, strictly increasing.
    pub time: Vec<f64>,
    /// Sample voltages in volts.
    pub voltage: Vec<f64>,
}

impl Waveform {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns `true` if the waveform holds no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Iterate over `(time, voltage)` pairs.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.voltage.iter().copied())
    }
}

impl Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => write!(
                f,
                "{} samples from {first:e} s to {last:e} s",
                self.len()
            ),
            _ => write!(f, "empty waveform"),
        }
    }
}
