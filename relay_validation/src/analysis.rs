//! Transition and contact bounce analysis of a captured relay waveform.
//!
//! The analysis is a pure function of the sample sequences. Levels before and after the
//! transition are taken as the mean of the first and last [`EDGE_SAMPLES`] samples. The
//! transition runs from the 10 % to the 90 % threshold between these levels. After the
//! transition, every excursion back across the threshold that was crossed last counts as a
//! bounce.

use std::fmt::Display;

use thiserror::Error;

use crate::record::Record;

/// Number of samples at each end of the waveform that define the start and end level.
pub const EDGE_SAMPLES: usize = 10;

/// Fraction of the level difference where the transition starts and ends.
const THRESHOLD_FRACTION: f64 = 0.1;

/// Minimum number of samples that can hold a transition.
const MIN_SAMPLES: usize = 2;

/// Reasons why a waveform cannot be analyzed.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    /// Time and voltage sequences differ in length.
    #[error("Time has {time} samples but voltage has {voltage}")]
    LengthMismatch {
        /// Number of time samples.
        time: usize,
        /// Number of voltage samples.
        voltage: usize,
    },
    /// Not enough samples to find a transition.
    #[error("Waveform has {found} samples, at least {MIN_SAMPLES} are required")]
    TooFewSamples {
        /// Number of samples found.
        found: usize,
    },
    /// The voltage never crosses one of the thresholds.
    #[error(
        "No {transition_type} threshold crossing found (thresholds {low_threshold} V / {high_threshold} V)"
    )]
    NoThresholdCrossing {
        /// Direction the transition was expected in.
        transition_type: TransitionType,
        /// Lower threshold.
        low_threshold: f64,
        /// Upper threshold.
        high_threshold: f64,
    },
    /// The very first sample is already past the end threshold.
    #[error("Waveform starts after the {transition_type} transition")]
    TransitionAtStart {
        /// Direction of the transition.
        transition_type: TransitionType,
    },
}

/// Direction of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionType {
    /// Low to high, e.g., a relay closing onto a live line.
    Rising,
    /// High to low.
    Falling,
}

impl TransitionType {
    /// Lowercase name of the direction.
    pub fn as_str(&self) -> &str {
        match self {
            TransitionType::Rising => "rising",
            TransitionType::Falling => "falling",
        }
    }
}

impl Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A span of samples where the contacts bounced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceRegion {
    /// First sample on the wrong side of the threshold.
    pub start: usize,
    /// First sample back on the right side of the threshold.
    pub end: usize,
    /// Time between `start` and `end` in seconds.
    pub duration: f64,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAnalysis {
    /// Direction of the transition.
    pub transition_type: TransitionType,
    /// Mean voltage of the first samples.
    pub start_voltage: f64,
    /// Mean voltage of the last samples.
    pub end_voltage: f64,
    /// 10 % threshold.
    pub low_threshold: f64,
    /// 90 % threshold.
    pub high_threshold: f64,
    /// Index where the transition starts.
    pub start_index: usize,
    /// Index where the transition ends.
    pub end_index: usize,
    /// Transition time in seconds.
    pub transition_time: f64,
    /// Bounces after the transition, in order.
    pub bounce_regions: Vec<BounceRegion>,
    /// Number of bounces.
    pub bounce_count: usize,
    /// Sum of all bounce durations in seconds.
    pub bounce_duration: f64,
}

impl TransitionAnalysis {
    /// Flatten the analysis into a record, with times in milliseconds.
    pub fn to_record(&self, name: &str) -> Record {
        let durations_ms: Vec<f64> = self
            .bounce_regions
            .iter()
            .map(|r| r.duration * 1e3)
            .collect();
        Record::new(name)
            .with("transition_type", self.transition_type.as_str())
            .with("start_voltage", self.start_voltage)
            .with("end_voltage", self.end_voltage)
            .with("low_threshold", self.low_threshold)
            .with("high_threshold", self.high_threshold)
            .with("start_index", self.start_index)
            .with("end_index", self.end_index)
            .with("transition_time_ms", self.transition_time * 1e3)
            .with("bounce_count", self.bounce_count)
            .with("bounce_duration_ms", self.bounce_duration * 1e3)
            .with("bounce_durations_ms", durations_ms)
    }
}

/// Analyze a transition in a waveform.
///
/// # Arguments
/// - `time`: Sample times in seconds, increasing.
/// - `voltage`: Sample voltages, same length as `time`.
///
/// If the transition happens between two consecutive samples, the sample before the end of the
/// transition is taken as its start, so that the transition time is one sample period.
pub fn analyze(time: &[f64], voltage: &[f64]) -> Result<TransitionAnalysis, AnalysisError> {
    if time.len() != voltage.len() {
        return Err(AnalysisError::LengthMismatch {
            time: time.len(),
            voltage: voltage.len(),
        });
    }
    let n = voltage.len();
    if n < MIN_SAMPLES {
        return Err(AnalysisError::TooFewSamples { found: n });
    }

    let edge = EDGE_SAMPLES.min(n);
    let start_voltage = mean(&voltage[..edge]);
    let end_voltage = mean(&voltage[n - edge..]);
    let transition_type = if end_voltage > start_voltage {
        TransitionType::Rising
    } else {
        TransitionType::Falling
    };

    let v_min = start_voltage.min(end_voltage);
    let v_max = start_voltage.max(end_voltage);
    let low_threshold = v_min + THRESHOLD_FRACTION * (v_max - v_min);
    let high_threshold = v_min + (1.0 - THRESHOLD_FRACTION) * (v_max - v_min);

    let crossing = |pred: &dyn Fn(f64) -> bool| voltage.iter().position(|&v| pred(v));
    let (start, end) = match transition_type {
        TransitionType::Rising => (
            crossing(&|v| v > low_threshold),
            crossing(&|v| v > high_threshold),
        ),
        TransitionType::Falling => (
            crossing(&|v| v < high_threshold),
            crossing(&|v| v < low_threshold),
        ),
    };
    let (Some(mut start_index), Some(end_index)) = (start, end) else {
        return Err(AnalysisError::NoThresholdCrossing {
            transition_type,
            low_threshold,
            high_threshold,
        });
    };
    if start_index >= end_index {
        if end_index == 0 {
            return Err(AnalysisError::TransitionAtStart { transition_type });
        }
        start_index = end_index - 1;
    }

    let bounce_regions = bounce_regions(
        time,
        voltage,
        end_index,
        transition_type,
        low_threshold,
        high_threshold,
    );
    let bounce_duration = bounce_regions.iter().map(|r| r.duration).sum();

    Ok(TransitionAnalysis {
        transition_type,
        start_voltage,
        end_voltage,
        low_threshold,
        high_threshold,
        start_index,
        end_index,
        transition_time: time[end_index] - time[start_index],
        bounce_count: bounce_regions.len(),
        bounce_regions,
        bounce_duration,
    })
}

/// Find excursions back across the end threshold after `end_index`.
///
/// A rising transition bounces when the voltage drops below the high threshold and ends the
/// bounce when it is back above. A falling transition uses the low threshold the other way
/// around. A bounce that has not ended by the last sample is not counted.
fn bounce_regions(
    time: &[f64],
    voltage: &[f64],
    end_index: usize,
    transition_type: TransitionType,
    low_threshold: f64,
    high_threshold: f64,
) -> Vec<BounceRegion> {
    let settled = |v: f64| match transition_type {
        TransitionType::Rising => v >= high_threshold,
        TransitionType::Falling => v <= low_threshold,
    };

    let mut regions = Vec::new();
    let mut open: Option<usize> = None;
    for i in end_index + 1..voltage.len() {
        let (prev, curr) = (settled(voltage[i - 1]), settled(voltage[i]));
        match open {
            None if prev && !curr => open = Some(i),
            Some(start) if !prev && curr => {
                regions.push(BounceRegion {
                    start,
                    end: i,
                    duration: time[i] - time[start],
                });
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        log::debug!("Ignoring bounce starting at sample {start} that did not settle");
    }
    regions
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
