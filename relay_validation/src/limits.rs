//! Acceptance limits and bench configuration, read from TOML.
//!
//! ```
//! use relay_validation::TestLimits;
//!
//! let limits = TestLimits::from_toml_str(
//!     r#"
//!     ac_frequency = { min = 55.0, max = 65.0 }
//!     ac_voltage = { min = 100.0, max = 130.0 }
//!     "#,
//! )
//! .unwrap();
//! assert!(limits.ac_frequency.unwrap().contains(60.0));
//! assert!(limits.duty_cycle.is_none());
//! ```

use std::{fmt::Display, time::Duration};

use serde::Deserialize;

use crate::error::ValidationError;

/// Inclusive acceptance range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RangeSpec {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
}

impl RangeSpec {
    /// Create a new range.
    pub fn new(min: f64, max: f64) -> Self {
        RangeSpec { min, max }
    }

    /// Returns `true` if `value` lies within the range, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Returns the values outside the range. An empty result means every value passed.
    pub fn violations(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .copied()
            .filter(|v| !self.contains(*v))
            .collect()
    }

    /// Check a single value against the range.
    pub fn check(&self, quantity: &str, value: f64) -> Result<(), ValidationError> {
        self.check_all(quantity, &[value])
    }

    /// Check every value against the range.
    ///
    /// On failure, all values are attached to the error, not only the offending ones.
    pub fn check_all(&self, quantity: &str, values: &[f64]) -> Result<(), ValidationError> {
        let violations = self.violations(values);
        if violations.is_empty() {
            return Ok(());
        }
        log::warn!("{quantity} out of range {self}: {violations:?}");
        Err(ValidationError::OutOfRange {
            quantity: quantity.to_string(),
            values: values.to_vec(),
            range: *self,
        })
    }
}

impl Display for RangeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Acceptance limits of the line quality checks.
///
/// Limits that are not given stay `None`. The step that needs a missing limit fails with a
/// [`ValidationError::Configuration`] before it talks to any hardware.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestLimits {
    /// AC line frequency in Hz.
    pub ac_frequency: Option<RangeSpec>,
    /// AC line RMS voltage in V.
    pub ac_voltage: Option<RangeSpec>,
    /// Duty cycle in %.
    pub duty_cycle: Option<RangeSpec>,
    /// Coefficient of variation of the RMS voltage in %.
    pub voltage_stability: Option<RangeSpec>,
}

impl TestLimits {
    /// Limits for a 120 V / 60 Hz mains line.
    pub fn mains_60hz() -> Self {
        TestLimits {
            ac_frequency: Some(RangeSpec::new(55.0, 65.0)),
            ac_voltage: Some(RangeSpec::new(100.0, 130.0)),
            duty_cycle: Some(RangeSpec::new(45.0, 55.0)),
            voltage_stability: Some(RangeSpec::new(0.0, 2.0)),
        }
    }

    /// Parse limits from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ValidationError> {
        toml::from_str(s).map_err(|e| ValidationError::Configuration(e.to_string()))
    }

    /// Return a limit or a configuration error naming it.
    pub fn require(limit: Option<RangeSpec>, name: &str) -> Result<RangeSpec, ValidationError> {
        limit.ok_or_else(|| ValidationError::Configuration(format!("missing range `{name}`")))
    }

    /// Check that every limit of the line quality measurement is given.
    pub fn require_line_quality(&self) -> Result<(), ValidationError> {
        TestLimits::require(self.ac_frequency, "ac_frequency")?;
        TestLimits::require(self.ac_voltage, "ac_voltage")?;
        TestLimits::require(self.duty_cycle, "duty_cycle")?;
        TestLimits::require(self.voltage_stability, "voltage_stability")?;
        Ok(())
    }
}

/// Settings of the oscilloscope on the bench.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port of the raw SCPI socket.
    pub port: u16,
    /// Zero-indexed channel the relay output is connected to.
    pub channel: usize,
    /// Timebase in seconds per division.
    pub timebase: f64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        ScopeConfig {
            host: "192.168.1.100".to_string(),
            port: rigol_ds1000z::LXI_RAW_PORT,
            channel: 0,
            timebase: 0.005,
        }
    }
}

impl ScopeConfig {
    /// Timebase as a duration per division.
    pub fn timebase(&self) -> Result<Duration, ValidationError> {
        Duration::try_from_secs_f64(self.timebase).map_err(|e| {
            ValidationError::Configuration(format!("invalid timebase {}: {e}", self.timebase))
        })
    }
}

/// Settings of the relay module on the bench.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Serial port, e.g., `/dev/ttyUSB0`.
    pub serial_port: String,
    /// Baud rate of the serial console.
    pub baud_rate: u32,
    /// One-indexed relay to test.
    pub relay_number: usize,
    /// Number of relays on the module.
    pub num_relays: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: tasmota_relay::BAUD_RATE,
            relay_number: 1,
            num_relays: 1,
        }
    }
}

/// Everything needed to run the relay response test on a bench.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Oscilloscope settings.
    pub scope: ScopeConfig,
    /// Relay module settings.
    pub relay: RelayConfig,
    /// Acceptance limits.
    pub limits: TestLimits,
    /// Probability of simulated faults, zero on a real bench.
    pub fault_chance: f64,
}

impl BenchConfig {
    /// Parse a bench configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ValidationError> {
        let config: BenchConfig =
            toml::from_str(s).map_err(|e| ValidationError::Configuration(e.to_string()))?;
        if config.relay.relay_number == 0 || config.relay.relay_number > config.relay.num_relays {
            return Err(ValidationError::Configuration(format!(
                "relay number {} is not on a module with {} relays",
                config.relay.relay_number, config.relay.num_relays
            )));
        }
        Ok(config)
    }
}
