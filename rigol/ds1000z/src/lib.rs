//! A rust driver for Rigol DS1000Z series oscilloscopes, tailored to triggered relay captures.
//!
//! The driver is split into two layers:
//! - [`InstrumentLink`] holds the connection and never fails loudly: commands return `false` and
//!   queries return an empty string if anything goes wrong.
//! - [`ScopeController`] interprets these sentinels and returns a [`ScopeError`] that says what
//!   failed, so callers can decide whether to retry.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rigol_ds1000z::{InstrumentLink, ScopeController, TriggerSlope};
//!
//! let mut link = InstrumentLink::new();
//! assert!(link.connect("192.168.1.50", 5555));
//!
//! let mut scope = ScopeController::new(link);
//! scope
//!     .configure_for_transition_capture(0, Duration::from_millis(5))
//!     .unwrap();
//! scope.set_trigger_slope(TriggerSlope::Positive).unwrap();
//! scope.arm_single_trigger().unwrap();
//! // ... switch something ...
//! scope.poll_trigger_status(Duration::from_secs(4)).unwrap();
//! let waveform = scope.capture_waveform(0).unwrap();
//! println!("{waveform}");
//! ```

#![warn(missing_docs)]

pub mod block;
mod error;
mod link;
mod measure;
mod settings;
mod waveform;

pub use block::BlockError;
pub use error::{ProtocolError, ScopeError};
pub use link::{
    Connector, IDN_TOKENS, InstrumentLink, LXI_RAW_PORT, Resource, TcpConnector,
    is_recognized_idn,
};
pub use measure::{MeasurementItem, MeasurementSample, OVERFLOW_SENTINEL};
pub use settings::{
    Coupling, ScopeProfile, ScopeTiming, TriggerSlope, TriggerStatus, TriggerSweep,
};
pub use waveform::{Preamble, PreambleError, VoltageScaling, Waveform, WaveformFormat};

use std::time::Duration;

use benchlink::{InstrumentError, InstrumentInterface};
use measurements::Voltage;

use settings::settle;

/// Number of analog channels of the DS1000Z series.
const NUM_CHANNELS: usize = 4;

/// Number of attempts to set and verify the timebase.
const TIMEBASE_ATTEMPTS: usize = 3;

/// Relative tolerance when verifying the timebase read-back.
const TIMEBASE_TOLERANCE: f64 = 0.01;

/// Controller for a Rigol DS1000Z oscilloscope.
///
/// Channels are zero-indexed, i.e., index 0 is `CHANnel1` on the front panel.
pub struct ScopeController<T: InstrumentInterface> {
    link: InstrumentLink<T>,
    profile: ScopeProfile,
    timing: ScopeTiming,
    scaling: VoltageScaling,
}

impl<T: InstrumentInterface> ScopeController<T> {
    /// Create a new controller around a link with the default profile and timing.
    pub fn new(link: InstrumentLink<T>) -> Self {
        Self {
            link,
            profile: ScopeProfile::default(),
            timing: ScopeTiming::default(),
            scaling: VoltageScaling::default(),
        }
    }

    /// Use the given vertical and trigger profile.
    pub fn with_profile(mut self, profile: ScopeProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Use the given command timing.
    pub fn with_timing(mut self, timing: ScopeTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Use the given voltage scaling when decoding waveforms.
    pub fn with_scaling(mut self, scaling: VoltageScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// The profile that is applied by [`ScopeController::configure_for_transition_capture`].
    pub fn profile(&self) -> &ScopeProfile {
        &self.profile
    }

    /// The command timing in use.
    pub fn timing(&self) -> &ScopeTiming {
        &self.timing
    }

    /// Mutable access to the underlying link.
    pub fn link_mut(&mut self) -> &mut InstrumentLink<T> {
        &mut self.link
    }

    /// Returns `true` if the oscilloscope is connected.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Close the connection to the oscilloscope. Safe to call more than once.
    pub fn disconnect(&mut self) {
        self.link.disconnect();
    }

    /// Query the identification of the oscilloscope.
    pub fn identify(&mut self) -> Result<String, ScopeError> {
        self.query("*IDN?")
    }

    /// Reset the oscilloscope to its default state.
    pub fn reset(&mut self) -> Result<(), ScopeError> {
        self.sendcmd("*RST")?;
        settle(self.timing.reset);
        Ok(())
    }

    /// Start continuous acquisition.
    pub fn run(&mut self) -> Result<(), ScopeError> {
        self.sendcmd(":RUN")
    }

    /// Stop the acquisition.
    pub fn stop(&mut self) -> Result<(), ScopeError> {
        self.sendcmd(":STOP")
    }

    /// Let the oscilloscope find a suitable setup for the current signal.
    ///
    /// The result should never be used as the final setup, set the vertical scale afterwards.
    pub fn autoscale(&mut self) -> Result<(), ScopeError> {
        self.sendcmd(":AUToscale")
    }

    /// Force a trigger event.
    pub fn force_trigger(&mut self) -> Result<(), ScopeError> {
        self.sendcmd(":TFORce")
    }

    /// Reset, then set up channel, timebase and an edge trigger with the configured profile.
    ///
    /// # Arguments
    /// - `channel`: Zero-indexed channel to capture on.
    /// - `timebase`: Time per horizontal division.
    pub fn configure_for_transition_capture(
        &mut self,
        channel: usize,
        timebase: Duration,
    ) -> Result<(), ScopeError> {
        let ch = check_channel(channel)?;
        log::info!("Configuring oscilloscope for transition capture on CHANnel{ch}");

        self.reset()?;
        self.stop()?;
        settle(self.timing.stop);

        self.set_timebase(timebase)?;

        self.settled(&format!(":CHANnel{ch}:DISPlay ON"))?;
        self.settled(&format!(
            ":CHANnel{ch}:COUPling {}",
            self.profile.coupling.as_str()
        ))?;
        self.settled(&format!(":CHANnel{ch}:PROBe {}", self.profile.probe_ratio))?;
        self.set_vertical_scale(channel, self.profile.vertical_scale)?;

        self.settled(":TRIGger:MODE EDGE")?;
        self.settled(&format!(":TRIGger:EDGE:SOURce CHANnel{ch}"))?;
        self.set_trigger_slope(TriggerSlope::Positive)?;
        self.settled(&format!(
            ":TRIGger:COUPling {}",
            self.profile.trigger_coupling.as_str()
        ))?;
        self.set_trigger_sweep(TriggerSweep::Normal)
    }

    /// Set the timebase and verify it by reading it back.
    ///
    /// Up to three attempts are made. Returns the timebase in s/div that was read back last. If
    /// it never matched within 1 %, a warning is logged and the last read-back is returned.
    pub fn set_timebase(&mut self, timebase: Duration) -> Result<f64, ScopeError> {
        let requested = timebase.as_secs_f64();
        let mut last = Err(ScopeError::Transport(
            "timebase was never read back".to_string(),
        ));

        for attempt in 1..=TIMEBASE_ATTEMPTS {
            self.sendcmd(&format!(":TIMebase:SCALe {requested}"))?;
            settle(self.timing.timebase_settle);

            last = self.query_f64(":TIMebase:SCALe?");
            settle(self.timing.settle);
            match &last {
                Ok(actual) if (actual - requested).abs() <= requested * TIMEBASE_TOLERANCE => {
                    log::info!("Timebase set to {actual} s/div");
                    return Ok(*actual);
                }
                Ok(actual) => log::warn!(
                    "Timebase verification failed (attempt {attempt}): wanted {requested}, got {actual}"
                ),
                Err(e) => log::warn!("Timebase read-back failed (attempt {attempt}): {e}"),
            }
            if attempt < TIMEBASE_ATTEMPTS {
                settle(self.timing.timebase_retry);
            }
        }

        let actual = last?;
        log::warn!("Keeping timebase {actual} s/div instead of {requested} s/div");
        Ok(actual)
    }

    /// Set the vertical scale of a channel.
    pub fn set_vertical_scale(&mut self, channel: usize, scale: Voltage) -> Result<(), ScopeError> {
        let ch = check_channel(channel)?;
        let volts = scale.as_volts();
        if volts <= 0.0 {
            return Err(InstrumentError::FloatValueOutOfRange {
                value: volts,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            }
            .into());
        }
        self.settled(&format!(":CHANnel{ch}:SCALe {volts}"))
    }

    /// Select the edge direction of the trigger, keeping the profile's trigger level.
    pub fn set_trigger_slope(&mut self, slope: TriggerSlope) -> Result<(), ScopeError> {
        self.settled(&format!(":TRIGger:EDGE:SLOPe {}", slope.as_str()))?;
        self.settled(&format!(
            ":TRIGger:EDGE:LEVel {}",
            self.profile.trigger_level.as_volts()
        ))
    }

    /// Set the trigger sweep mode.
    pub fn set_trigger_sweep(&mut self, sweep: TriggerSweep) -> Result<(), ScopeError> {
        self.settled(&format!(":TRIGger:SWEep {}", sweep.as_str()))
    }

    /// Switch to single sweep and arm the trigger.
    ///
    /// This must be called before the stimulus, otherwise the edge is missed.
    pub fn arm_single_trigger(&mut self) -> Result<(), ScopeError> {
        self.sendcmd(&format!(":TRIGger:SWEep {}", TriggerSweep::Single.as_str()))?;
        self.sendcmd(":SINGle")
    }

    /// Query the current state of the trigger system.
    pub fn trigger_status(&mut self) -> Result<TriggerStatus, ScopeError> {
        let response = self.query(":TRIGger:STATus?")?;
        TriggerStatus::from_cmd_str(&response)
    }

    /// Poll the trigger status until the acquisition stopped or the timeout elapsed.
    ///
    /// The status is polled at most `ceil(timeout / poll_interval)` times with the poll interval
    /// of the [`ScopeTiming`] in between. A missing or unparsable answer counts as not stopped,
    /// unless it is the last one: then the poll fails with [`ScopeError::Transport`] instead of
    /// [`ScopeError::TriggerTimeout`], since a silent scope says nothing about the edge.
    pub fn poll_trigger_status(&mut self, timeout: Duration) -> Result<(), ScopeError> {
        let interval = self.timing.poll_interval;
        let polls = if interval.is_zero() {
            1
        } else {
            timeout.as_nanos().div_ceil(interval.as_nanos()).max(1)
        };

        let mut last_failure = None;
        for poll in 0..polls {
            if !self.link.is_connected() {
                return Err(ScopeError::NotConnected);
            }
            match self.trigger_status() {
                Ok(TriggerStatus::Stop) => {
                    log::info!("Trigger stopped after {} polls", poll + 1);
                    return Ok(());
                }
                Ok(status) => {
                    log::trace!("Trigger {status}");
                    last_failure = None;
                }
                Err(e) => {
                    log::debug!("Trigger status failure while polling: {e}");
                    last_failure = Some(e);
                }
            }
            settle(interval);
        }

        if let Some(e) = last_failure {
            log::error!("Lost trigger status while waiting for the edge: {e}");
            return Err(ScopeError::Transport(format!(
                "trigger status unavailable after {polls} polls: {e}"
            )));
        }
        log::warn!("Trigger did not stop within {timeout:?}");
        Err(ScopeError::TriggerTimeout(timeout))
    }

    /// Remove all automatic measurements from the screen.
    pub fn clear_measurements(&mut self) -> Result<(), ScopeError> {
        self.settled(":MEASure:CLEar ALL")
    }

    /// Enable an automatic measurement item on a channel.
    pub fn enable_measurement(
        &mut self,
        item: MeasurementItem,
        channel: usize,
    ) -> Result<(), ScopeError> {
        let ch = check_channel(channel)?;
        self.settled(&format!(":MEASure:ITEM {},CHANnel{ch}", item.as_str()))
    }

    /// Read an automatic measurement item of a channel.
    ///
    /// Readings at the overflow sentinel are returned as [`MeasurementSample::Invalid`].
    pub fn measure(
        &mut self,
        item: MeasurementItem,
        channel: usize,
    ) -> Result<MeasurementSample, ScopeError> {
        let ch = check_channel(channel)?;
        let value = self.query_f64(&format!(":MEASure:ITEM? {},CHANnel{ch}", item.as_str()))?;
        Ok(MeasurementSample::classify(value))
    }

    /// Stop the acquisition and read the waveform of a channel.
    ///
    /// The preamble is read first and used to scale the sample codes. The acquisition is
    /// restarted afterwards, also if reading failed.
    pub fn capture_waveform(&mut self, channel: usize) -> Result<Waveform, ScopeError> {
        let ch = check_channel(channel)?;
        let result = self.read_waveform(ch);
        if !self.link.send(":RUN") {
            log::warn!("Could not restart acquisition after reading CHANnel{ch}");
        }
        result
    }

    fn read_waveform(&mut self, ch: usize) -> Result<Waveform, ScopeError> {
        self.sendcmd(":STOP")?;
        self.sendcmd(&format!(":WAVeform:SOURce CHANnel{ch}"))?;
        self.sendcmd(&format!(":WAVeform:FORMat {}", WaveformFormat::Byte.as_str()))?;

        let preamble: Preamble = self.query(":WAVeform:PREamble?")?.parse()?;
        log::info!(
            "Capturing {} points with time increment {} s",
            preamble.points,
            preamble.x_increment
        );

        self.sendcmd(":WAVeform:DATA?")?;
        let codes = self.link.read_block()?;
        if codes.len() != preamble.points {
            log::warn!(
                "Received {} samples, preamble announced {}",
                codes.len(),
                preamble.points
            );
        }
        Ok(preamble.decode(&codes, self.scaling))
    }

    /// Send a command and wait for the settle delay.
    fn settled(&mut self, cmd: &str) -> Result<(), ScopeError> {
        self.sendcmd(cmd)?;
        settle(self.timing.settle);
        Ok(())
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), ScopeError> {
        if !self.link.is_connected() {
            return Err(ScopeError::NotConnected);
        }
        if self.link.send(cmd) {
            Ok(())
        } else {
            Err(ScopeError::Transport(format!("could not send `{cmd}`")))
        }
    }

    fn query(&mut self, cmd: &str) -> Result<String, ScopeError> {
        if !self.link.is_connected() {
            return Err(ScopeError::NotConnected);
        }
        let response = self.link.query(cmd);
        if response.is_empty() {
            Err(ScopeError::Transport(format!("no response to `{cmd}`")))
        } else {
            Ok(response)
        }
    }

    fn query_f64(&mut self, cmd: &str) -> Result<f64, ScopeError> {
        let response = self.query(cmd)?;
        response.trim().parse().map_err(|_| {
            ProtocolError::Response {
                query: cmd.to_string(),
                response,
            }
            .into()
        })
    }
}

/// Validate a zero-indexed channel and return the one-indexed channel number used in commands.
fn check_channel(channel: usize) -> Result<usize, InstrumentError> {
    if channel >= NUM_CHANNELS {
        return Err(InstrumentError::ChannelIndexOutOfRange {
            idx: channel,
            nof_channels: NUM_CHANNELS,
        });
    }
    Ok(channel + 1)
}
