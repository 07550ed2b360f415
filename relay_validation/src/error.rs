//! Errors of the relay validation.
//!
//! Only transport errors and trigger timeouts are worth a retry of the same step, everything else
//! needs someone to look at the bench.

use std::{fmt::Display, time::Duration};

use rigol_ds1000z::{ProtocolError, ScopeError};
use thiserror::Error;

use crate::{analysis::AnalysisError, capture::CaptureError, limits::RangeSpec};

/// What the relay was asked to do when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    /// Open the connection to the relay module.
    Connect,
    /// Switch the relay on.
    TurnOn,
    /// Switch the relay off.
    TurnOff,
}

impl From<bool> for RelayAction {
    fn from(on: bool) -> Self {
        if on {
            RelayAction::TurnOn
        } else {
            RelayAction::TurnOff
        }
    }
}

impl Display for RelayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self {
            RelayAction::Connect => "connect",
            RelayAction::TurnOn => "turn on",
            RelayAction::TurnOff => "turn off",
        };
        write!(f, "{action}")
    }
}

/// Everything that makes a validation step fail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Communication with the oscilloscope failed.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The oscilloscope answered with something that cannot be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// No edge was seen within the trigger window.
    #[error("No trigger within {0:?}")]
    TriggerTimeout(Duration),
    /// No valid reading was obtained for a quantity after all attempts.
    #[error("No valid {quantity} measurement, raw samples {samples:?}")]
    MeasurementInvalid {
        /// Name of the measured quantity.
        quantity: String,
        /// All raw readings, including invalid ones.
        samples: Vec<f64>,
    },
    /// Valid readings outside the acceptance range.
    #[error("{quantity} out of range {range}: {values:?}")]
    OutOfRange {
        /// Name of the measured quantity.
        quantity: String,
        /// All readings of the quantity.
        values: Vec<f64>,
        /// The acceptance range.
        range: RangeSpec,
    },
    /// A required setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A trigger synchronized capture failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// The captured waveform could not be analyzed.
    #[error("Waveform analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// The relay module did not do what it was asked to.
    #[error("Failed to {action} relay {relay_number}")]
    Relay {
        /// One-indexed relay number.
        relay_number: usize,
        /// The requested action.
        action: RelayAction,
    },
}

impl ValidationError {
    /// Returns `true` if repeating the whole step could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ValidationError::Transport(_) | ValidationError::TriggerTimeout(_) => true,
            ValidationError::Capture(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<ScopeError> for ValidationError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::Protocol(e) => ValidationError::Protocol(e),
            ScopeError::TriggerTimeout(timeout) => ValidationError::TriggerTimeout(timeout),
            ScopeError::Argument(e) => ValidationError::Configuration(e.to_string()),
            other => ValidationError::Transport(other.to_string()),
        }
    }
}
