//! Channel, trigger, and timing settings of the oscilloscope.

use std::{fmt::Display, time::Duration};

use measurements::Voltage;

use crate::error::ScopeError;

/// Input coupling of a channel or of the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    /// AC coupling, blocks the DC component.
    Ac,
    /// DC coupling.
    Dc,
    /// Input grounded.
    Gnd,
}

impl Coupling {
    /// Command argument for the coupling.
    pub fn as_str(&self) -> &str {
        match self {
            Coupling::Ac => "AC",
            Coupling::Dc => "DC",
            Coupling::Gnd => "GND",
        }
    }
}

/// Edge direction the trigger reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSlope {
    /// Rising edge, e.g., a relay switching on.
    Positive,
    /// Falling edge, e.g., a relay switching off.
    Negative,
}

impl TriggerSlope {
    /// Command argument for `:TRIGger:EDGE:SLOPe`.
    pub fn as_str(&self) -> &str {
        match self {
            TriggerSlope::Positive => "POSitive",
            TriggerSlope::Negative => "NEGative",
        }
    }
}

/// Trigger sweep mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSweep {
    /// Acquire continuously, trigger or not.
    Auto,
    /// Acquire only when triggered.
    Normal,
    /// Acquire once when triggered, then stop.
    Single,
}

impl TriggerSweep {
    /// Command argument for `:TRIGger:SWEep`.
    pub fn as_str(&self) -> &str {
        match self {
            TriggerSweep::Auto => "AUTO",
            TriggerSweep::Normal => "NORMal",
            TriggerSweep::Single => "SINGle",
        }
    }
}

/// State of the trigger system as reported by `:TRIGger:STATus?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    /// Triggered, acquisition still running.
    Triggered,
    /// Armed and waiting for the trigger condition.
    Wait,
    /// Running.
    Run,
    /// Auto sweep without trigger.
    Auto,
    /// Acquisition stopped. In single sweep this means the capture is complete.
    Stop,
}

impl TriggerStatus {
    /// Parse the response to `:TRIGger:STATus?`.
    pub fn from_cmd_str(value: &str) -> Result<Self, ScopeError> {
        match value.trim() {
            "TD" => Ok(TriggerStatus::Triggered),
            "WAIT" => Ok(TriggerStatus::Wait),
            "RUN" => Ok(TriggerStatus::Run),
            "AUTO" => Ok(TriggerStatus::Auto),
            "STOP" => Ok(TriggerStatus::Stop),
            _ => Err(crate::ProtocolError::Response {
                query: ":TRIGger:STATus?".to_string(),
                response: value.to_string(),
            }
            .into()),
        }
    }
}

impl Display for TriggerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerStatus::Triggered => write!(f, "triggered"),
            TriggerStatus::Wait => write!(f, "waiting"),
            TriggerStatus::Run => write!(f, "running"),
            TriggerStatus::Auto => write!(f, "auto"),
            TriggerStatus::Stop => write!(f, "stopped"),
        }
    }
}

/// Fixed vertical and trigger setup used for relay captures.
///
/// The default is sized for mains level signals: 50 V/div behind a 10x probe gives 500 V of
/// headroom, and the edge trigger sits at 25 V.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeProfile {
    /// Channel input coupling.
    pub coupling: Coupling,
    /// Probe attenuation ratio.
    pub probe_ratio: f64,
    /// Vertical scale per division.
    pub vertical_scale: Voltage,
    /// Edge trigger level.
    pub trigger_level: Voltage,
    /// Trigger coupling.
    pub trigger_coupling: Coupling,
}

impl Default for ScopeProfile {
    fn default() -> Self {
        Self {
            coupling: Coupling::Ac,
            probe_ratio: 10.0,
            vertical_scale: Voltage::from_volts(50.0),
            trigger_level: Voltage::from_volts(25.0),
            trigger_coupling: Coupling::Ac,
        }
    }
}

/// Delays the oscilloscope firmware needs between commands, and the trigger poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeTiming {
    /// Wait after `*RST`.
    pub reset: Duration,
    /// Wait after stopping the acquisition during setup.
    pub stop: Duration,
    /// Wait after every configuration command.
    pub settle: Duration,
    /// Wait after setting the timebase before reading it back.
    pub timebase_settle: Duration,
    /// Wait before re-sending a timebase that did not verify.
    pub timebase_retry: Duration,
    /// Interval between two trigger status polls.
    pub poll_interval: Duration,
}

impl Default for ScopeTiming {
    fn default() -> Self {
        Self {
            reset: Duration::from_secs(2),
            stop: Duration::from_secs(1),
            settle: Duration::from_millis(100),
            timebase_settle: Duration::from_millis(200),
            timebase_retry: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ScopeTiming {
    /// Timing without any delays and with the given poll interval.
    ///
    /// Useful to drive the controller against a loopback interface.
    pub fn immediate(poll_interval: Duration) -> Self {
        Self {
            reset: Duration::ZERO,
            stop: Duration::ZERO,
            settle: Duration::ZERO,
            timebase_settle: Duration::ZERO,
            timebase_retry: Duration::ZERO,
            poll_interval,
        }
    }
}

/// Sleep for the given duration, skipping the call for zero.
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
