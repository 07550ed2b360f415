//! Trigger synchronized capture of a relay transition.
//!
//! The oscilloscope and the relay module have no common clock. The only thing that ties the
//! captured edge to the relay command is the order of operations: the trigger is armed, the relay
//! is switched, and then the oscilloscope is polled until it stopped on the edge.

use std::time::Duration;

use benchlink::InstrumentInterface;
use rigol_ds1000z::{ScopeController, ScopeError, TriggerSlope, Waveform};
use thiserror::Error;

use crate::{
    actuator::RelayActuator,
    analysis::{TransitionAnalysis, analyze},
    error::ValidationError,
    faults::{FaultInjector, FaultPoint},
    settle,
};

/// Timing and channel of a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    /// Zero-indexed oscilloscope channel.
    pub channel: usize,
    /// Wait between arming the trigger and switching the relay.
    pub arm_settle: Duration,
    /// Time the relay has to produce an edge.
    pub trigger_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            channel: 0,
            arm_settle: Duration::from_millis(500),
            trigger_timeout: Duration::from_secs(4),
        }
    }
}

/// The stage of a capture that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    /// Setting the slope or arming the trigger.
    Arm,
    /// Switching the relay.
    Actuation,
    /// Waiting for the trigger.
    Trigger,
    /// Reading the waveform.
    Read,
}

impl CaptureStage {
    /// Where the operator should look first.
    pub fn hint(&self) -> &'static str {
        match self {
            CaptureStage::Arm => "check the oscilloscope connection",
            CaptureStage::Actuation => "check the relay module and its serial connection",
            CaptureStage::Trigger => "check that the relay actuates and the probe is connected",
            CaptureStage::Read => "check the oscilloscope connection and firmware",
        }
    }
}

/// Failure of [`capture_edge`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The trigger could not be set up.
    #[error("Could not arm the trigger: {0}")]
    Arm(#[source] ScopeError),
    /// The relay did not confirm the switch command.
    #[error("Relay {relay_number} did not switch {}", on_off(.turn_on))]
    Actuation {
        /// One-indexed relay number.
        relay_number: usize,
        /// Requested state.
        turn_on: bool,
    },
    /// No edge within the trigger window. The relay may not have actuated mechanically.
    #[error("No edge within {timeout:?}, the relay may have failed to actuate")]
    TriggerTimeout {
        /// The trigger window.
        timeout: Duration,
    },
    /// Polling the trigger failed for another reason than a timeout.
    #[error("Could not poll the trigger: {0}")]
    Trigger(#[source] ScopeError),
    /// The waveform could not be read.
    #[error("Could not read the waveform: {0}")]
    Read(#[source] ScopeError),
}

impl CaptureError {
    /// The stage that failed.
    pub fn stage(&self) -> CaptureStage {
        match self {
            CaptureError::Arm(_) => CaptureStage::Arm,
            CaptureError::Actuation { .. } => CaptureStage::Actuation,
            CaptureError::TriggerTimeout { .. } | CaptureError::Trigger(_) => CaptureStage::Trigger,
            CaptureError::Read(_) => CaptureStage::Read,
        }
    }

    /// Returns `true` if repeating the capture could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::TriggerTimeout { .. } => true,
            CaptureError::Actuation { .. } => false,
            CaptureError::Arm(e) | CaptureError::Trigger(e) | CaptureError::Read(e) => {
                e.is_retryable()
            }
        }
    }
}

fn on_off(on: &bool) -> &'static str {
    if *on { "on" } else { "off" }
}

/// Capture the edge produced by switching a relay.
///
/// The trigger slope follows the requested state: switching on captures a rising edge,
/// switching off a falling one. A simulated mechanical failure skips the actual switching when
/// turning on, which shows up as a trigger timeout.
///
/// # Arguments
/// - `scope`: Oscilloscope, configured with [`ScopeController::configure_for_transition_capture`].
/// - `relay`: Connected relay module.
/// - `relay_number`: One-indexed relay to switch.
/// - `turn_on`: Requested relay state.
/// - `config`: Channel and timing of the capture.
/// - `faults`: Fault injection, use [`crate::NoFaults`] on a real bench.
pub fn capture_edge<T, R>(
    scope: &mut ScopeController<T>,
    relay: &mut R,
    relay_number: usize,
    turn_on: bool,
    config: &CaptureConfig,
    faults: &mut dyn FaultInjector,
) -> Result<Waveform, CaptureError>
where
    T: InstrumentInterface,
    R: RelayActuator + ?Sized,
{
    let slope = if turn_on {
        TriggerSlope::Positive
    } else {
        TriggerSlope::Negative
    };
    log::info!("Capturing {slope:?} edge of relay {relay_number}");

    scope.set_trigger_slope(slope).map_err(CaptureError::Arm)?;
    scope.arm_single_trigger().map_err(CaptureError::Arm)?;
    settle(config.arm_settle);

    if turn_on && faults.should_fail(FaultPoint::MechanicalFailure) {
        log::warn!("Relay {relay_number} is not actuated");
    } else if !relay.set_power(turn_on, relay_number) {
        return Err(CaptureError::Actuation {
            relay_number,
            turn_on,
        });
    }

    match scope.poll_trigger_status(config.trigger_timeout) {
        Ok(()) => {}
        Err(ScopeError::TriggerTimeout(timeout)) => {
            log::error!("Relay {relay_number} produced no edge within {timeout:?}");
            return Err(CaptureError::TriggerTimeout { timeout });
        }
        Err(e) => return Err(CaptureError::Trigger(e)),
    }

    let waveform = scope
        .capture_waveform(config.channel)
        .map_err(CaptureError::Read)?;
    log::info!("Captured {} samples", waveform.len());
    Ok(waveform)
}

/// A capture together with its analysis.
#[derive(Debug)]
pub struct CaptureResult {
    /// Zero-indexed oscilloscope channel.
    pub channel: usize,
    /// The captured waveform, if the capture succeeded.
    pub waveform: Option<Waveform>,
    /// The analysis, if the waveform could be analyzed.
    pub analysis: Option<TransitionAnalysis>,
    /// Why the capture or the analysis failed.
    pub error: Option<ValidationError>,
}

impl CaptureResult {
    /// Analyze the outcome of [`capture_edge`].
    pub fn analyzed(channel: usize, capture: Result<Waveform, CaptureError>) -> Self {
        let waveform = match capture {
            Ok(waveform) => waveform,
            Err(e) => {
                return CaptureResult {
                    channel,
                    waveform: None,
                    analysis: None,
                    error: Some(e.into()),
                };
            }
        };
        match analyze(&waveform.time, &waveform.voltage) {
            Ok(analysis) => CaptureResult {
                channel,
                waveform: Some(waveform),
                analysis: Some(analysis),
                error: None,
            },
            Err(e) => {
                log::warn!("Could not analyze capture of channel {channel}: {e}");
                CaptureResult {
                    channel,
                    waveform: Some(waveform),
                    analysis: None,
                    error: Some(e.into()),
                }
            }
        }
    }

    /// Returns `true` if the waveform was captured and analyzed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
