//! Automatic measurements of the oscilloscope.

use std::fmt::Display;

/// Value the oscilloscope reports when a measurement cannot be made, e.g., no signal edge
/// within the screen. Everything at or above this value is invalid.
pub const OVERFLOW_SENTINEL: f64 = 9.9e37;

/// Automatic measurement items used on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementItem {
    /// Signal frequency in Hz.
    Frequency,
    /// Peak to peak voltage in V.
    Vpp,
    /// RMS voltage in V.
    Vrms,
    /// Signal period in s.
    Period,
    /// Positive pulse width in s.
    PositiveWidth,
    /// Negative pulse width in s.
    NegativeWidth,
}

impl MeasurementItem {
    /// Command argument for `:MEASure:ITEM`.
    pub fn as_str(&self) -> &str {
        match self {
            MeasurementItem::Frequency => "FREQuency",
            MeasurementItem::Vpp => "VPP",
            MeasurementItem::Vrms => "VRMS",
            MeasurementItem::Period => "PERiod",
            MeasurementItem::PositiveWidth => "PWIDth",
            MeasurementItem::NegativeWidth => "NWIDth",
        }
    }
}

impl Display for MeasurementItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasurementItem::Frequency => write!(f, "frequency"),
            MeasurementItem::Vpp => write!(f, "peak-to-peak voltage"),
            MeasurementItem::Vrms => write!(f, "RMS voltage"),
            MeasurementItem::Period => write!(f, "period"),
            MeasurementItem::PositiveWidth => write!(f, "positive pulse width"),
            MeasurementItem::NegativeWidth => write!(f, "negative pulse width"),
        }
    }
}

/// A single reading of a measurement item.
///
/// Readings at or above [`OVERFLOW_SENTINEL`] and non-finite readings are kept as
/// [`MeasurementSample::Invalid`], so they can be reported but never enter statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementSample {
    /// A usable reading.
    Valid(f64),
    /// The overflow sentinel or another unusable reading, as received.
    Invalid(f64),
}

impl MeasurementSample {
    /// Classify a raw reading.
    pub fn classify(value: f64) -> Self {
        if value.is_finite() && value < OVERFLOW_SENTINEL {
            MeasurementSample::Valid(value)
        } else {
            MeasurementSample::Invalid(value)
        }
    }

    /// The value as received, valid or not.
    pub fn raw(&self) -> f64 {
        match self {
            MeasurementSample::Valid(v) | MeasurementSample::Invalid(v) => *v,
        }
    }

    /// The value if the reading is valid.
    pub fn valid(&self) -> Option<f64> {
        match self {
            MeasurementSample::Valid(v) => Some(*v),
            MeasurementSample::Invalid(_) => None,
        }
    }

    /// Returns `true` for a valid reading.
    pub fn is_valid(&self) -> bool {
        matches!(self, MeasurementSample::Valid(_))
    }
}
