//! AC line quality behind a closed relay.
//!
//! Frequency and voltage are read from the automatic measurements of the oscilloscope. The
//! oscilloscope reports the overflow sentinel until it has a stable signal, so readings are
//! repeated a few times and only valid ones are kept. Duty cycle and voltage stability are then
//! derived from a second set of timing measurements and the RMS voltages.

use std::time::Duration;

use benchlink::InstrumentInterface;
use rigol_ds1000z::{MeasurementItem, MeasurementSample, ScopeController, ScopeError};

use crate::{
    error::ValidationError,
    faults::{FaultInjector, FaultPoint},
    limits::TestLimits,
    record::{Record, Recorder},
    settle,
};

/// Name of the record written by [`LineQualityMeasurer::measure`].
pub const LINE_QUALITY_RECORD: &str = "line_quality";

/// Channel, retry counts and delays of the line quality measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineQualityConfig {
    /// Zero-indexed oscilloscope channel.
    pub channel: usize,
    /// Maximum number of frequency/voltage reading rounds.
    pub max_attempts: usize,
    /// Stop reading once this many valid rounds were collected.
    pub min_valid: usize,
    /// Wait after autoscale.
    pub autoscale_settle: Duration,
    /// Wait after forcing a trigger before reading frequency and voltage.
    pub trigger_settle: Duration,
    /// Wait after forcing a trigger before reading period and pulse widths.
    pub timing_settle: Duration,
    /// Wait between two readings.
    pub read_interval: Duration,
    /// Wait after a round that could not be read.
    pub retry_delay: Duration,
}

impl Default for LineQualityConfig {
    fn default() -> Self {
        LineQualityConfig {
            channel: 0,
            max_attempts: 3,
            min_valid: 2,
            autoscale_settle: Duration::from_secs(5),
            trigger_settle: Duration::from_secs(3),
            timing_settle: Duration::from_secs(2),
            read_interval: Duration::from_millis(200),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl LineQualityConfig {
    /// The default retry counts without any delays.
    pub fn immediate() -> Self {
        LineQualityConfig {
            autoscale_settle: Duration::ZERO,
            trigger_settle: Duration::ZERO,
            timing_settle: Duration::ZERO,
            read_interval: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..Default::default()
        }
    }
}

/// Statistics of the RMS voltage readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageStability {
    /// Mean in V.
    pub mean: f64,
    /// Population standard deviation in V.
    pub std_dev: f64,
    /// Smallest reading in V.
    pub min: f64,
    /// Largest reading in V.
    pub max: f64,
    /// Standard deviation relative to the mean, in %.
    pub variation_coefficient: f64,
}

impl VoltageStability {
    /// Compute the statistics, `None` if there are no samples.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        Some(VoltageStability {
            mean,
            std_dev,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            variation_coefficient: std_dev / mean * 100.0,
        })
    }
}

/// Period and pulse widths of the line voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTiming {
    /// Period in s.
    pub period: f64,
    /// Positive pulse width in s.
    pub positive_width: f64,
    /// Negative pulse width in s.
    pub negative_width: f64,
}

impl LineTiming {
    /// Share of the positive pulse in the sum of both pulse widths, in %.
    pub fn duty_cycle(&self) -> f64 {
        self.positive_width / (self.positive_width + self.negative_width) * 100.0
    }
}

/// Results of a passed line quality measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct LineQualityReport {
    /// Valid frequency readings in Hz.
    pub frequency: Vec<f64>,
    /// Valid peak-to-peak voltage readings in V.
    pub vpp: Vec<f64>,
    /// Valid RMS voltage readings in V.
    pub vrms: Vec<f64>,
    /// Period and pulse widths.
    pub timing: LineTiming,
    /// Duty cycle in %.
    pub duty_cycle: f64,
    /// Statistics of the RMS voltage.
    pub voltage_stability: VoltageStability,
}

impl LineQualityReport {
    /// Mean of the frequency readings.
    pub fn mean_frequency(&self) -> f64 {
        self.frequency.iter().sum::<f64>() / self.frequency.len() as f64
    }
}

/// Valid readings of the frequency/voltage rounds, and the raw readings of all rounds.
#[derive(Debug, Default)]
struct LineSamples {
    frequency: Vec<f64>,
    vpp: Vec<f64>,
    vrms: Vec<f64>,
    raw_frequency: Vec<f64>,
    raw_vrms: Vec<f64>,
}

impl LineSamples {
    fn record(&self) -> Record {
        Record::new(LINE_QUALITY_RECORD)
            .with("frequency_hz", self.frequency.as_slice())
            .with("vpp_volts", self.vpp.as_slice())
            .with("vrms_volts", self.vrms.as_slice())
    }
}

/// Measures frequency, voltage, duty cycle and voltage stability of the line behind the relay.
#[derive(Debug, Clone, Default)]
pub struct LineQualityMeasurer {
    config: LineQualityConfig,
}

impl LineQualityMeasurer {
    /// Create a measurer with the given configuration.
    pub fn new(config: LineQualityConfig) -> Self {
        LineQualityMeasurer { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &LineQualityConfig {
        &self.config
    }

    /// Measure the line quality and check it against the limits.
    ///
    /// The readings are handed to the recorder as soon as they exist, also when a check fails.
    /// A limit that is missing fails the step before it sends anything to the oscilloscope.
    pub fn measure<T: InstrumentInterface>(
        &self,
        scope: &mut ScopeController<T>,
        limits: &TestLimits,
        recorder: &mut dyn Recorder,
        faults: &mut dyn FaultInjector,
    ) -> Result<LineQualityReport, ValidationError> {
        let frequency_range = TestLimits::require(limits.ac_frequency, "ac_frequency")?;
        let voltage_range = TestLimits::require(limits.ac_voltage, "ac_voltage")?;

        self.acquire_signal(scope)?;
        let samples = self.read_line_samples(scope)?;

        if samples.frequency.is_empty() || faults.should_fail(FaultPoint::Measurement) {
            let frequency_seen = samples.raw_frequency.iter().any(|v| valid_positive(*v));
            let (item, raw) = if frequency_seen {
                (MeasurementItem::Vrms, &samples.raw_vrms)
            } else {
                (MeasurementItem::Frequency, &samples.raw_frequency)
            };
            recorder.record_values(samples.record().with("error", "no valid measurements"));
            return Err(ValidationError::MeasurementInvalid {
                quantity: item.to_string(),
                samples: raw.clone(),
            });
        }

        let in_range = frequency_range
            .check_all(&MeasurementItem::Frequency.to_string(), &samples.frequency)
            .and_then(|()| voltage_range.check_all(&MeasurementItem::Vrms.to_string(), &samples.vrms));
        if let Err(e) = in_range {
            recorder.record_values(samples.record());
            return Err(e);
        }

        let duty_range = TestLimits::require(limits.duty_cycle, "duty_cycle")?;
        let stability_range = TestLimits::require(limits.voltage_stability, "voltage_stability")?;

        let timing = match self.read_timing(scope) {
            Ok(timing) => timing,
            Err(e) => {
                recorder.record_values(samples.record().with("error", e.to_string()));
                return Err(e);
            }
        };
        let duty_cycle = timing.duty_cycle();
        let voltage_stability = VoltageStability::from_samples(&samples.vrms).ok_or_else(|| {
            ValidationError::MeasurementInvalid {
                quantity: MeasurementItem::Vrms.to_string(),
                samples: samples.raw_vrms.clone(),
            }
        })?;

        recorder.record_values(
            samples
                .record()
                .with("period", timing.period)
                .with("pos_width", timing.positive_width)
                .with("neg_width", timing.negative_width)
                .with("duty_cycle", duty_cycle)
                .with("vrms_mean", voltage_stability.mean)
                .with("vrms_std_dev", voltage_stability.std_dev)
                .with("vrms_min", voltage_stability.min)
                .with("vrms_max", voltage_stability.max)
                .with(
                    "vrms_variation_coefficient",
                    voltage_stability.variation_coefficient,
                ),
        );

        duty_range.check("duty cycle", duty_cycle)?;
        stability_range.check(
            "RMS voltage variation",
            voltage_stability.variation_coefficient,
        )?;

        let report = LineQualityReport {
            frequency: samples.frequency,
            vpp: samples.vpp,
            vrms: samples.vrms,
            timing,
            duty_cycle,
            voltage_stability,
        };
        log::info!(
            "Line quality passed: {:.1} Hz, {:.1} Vrms, duty cycle {:.1} %, variation {:.2} %",
            report.mean_frequency(),
            report.voltage_stability.mean,
            report.duty_cycle,
            report.voltage_stability.variation_coefficient
        );
        Ok(report)
    }

    /// Autoscale to find the signal, then restore the vertical scale of the profile.
    fn acquire_signal<T: InstrumentInterface>(
        &self,
        scope: &mut ScopeController<T>,
    ) -> Result<(), ScopeError> {
        log::info!("Autoscaling to find the line signal");
        scope.autoscale()?;
        settle(self.config.autoscale_settle);

        let scale = scope.profile().vertical_scale;
        scope.set_vertical_scale(self.config.channel, scale)?;
        scope.force_trigger()?;
        settle(self.config.trigger_settle);
        Ok(())
    }

    /// Read frequency, Vpp and Vrms in rounds until enough valid rounds were collected.
    fn read_line_samples<T: InstrumentInterface>(
        &self,
        scope: &mut ScopeController<T>,
    ) -> Result<LineSamples, ScopeError> {
        let mut samples = LineSamples::default();

        for attempt in 1..=self.config.max_attempts {
            let readings = self.read_round(scope);
            let last = attempt == self.config.max_attempts;
            let (frequency, vpp, vrms) = match readings {
                Ok(readings) => readings,
                Err(ScopeError::NotConnected) => return Err(ScopeError::NotConnected),
                Err(e) => {
                    log::warn!("Attempt {attempt}: error reading measurements: {e}");
                    if !last {
                        settle(self.config.retry_delay);
                    }
                    continue;
                }
            };
            samples.raw_frequency.push(frequency.raw());
            samples.raw_vrms.push(vrms.raw());

            match (frequency.valid(), vrms.valid()) {
                (Some(f), Some(v)) if f > 0.0 && v > 0.0 => {
                    log::info!("Attempt {attempt}: found signal, {f:.1} Hz, {v:.1} Vrms");
                    samples.frequency.push(f);
                    samples.vrms.push(v);
                    match vpp.valid() {
                        Some(p) => samples.vpp.push(p),
                        None => log::warn!("Attempt {attempt}: Vpp reading {} dropped", vpp.raw()),
                    }
                    if samples.frequency.len() >= self.config.min_valid {
                        break;
                    }
                }
                _ => {
                    log::warn!("Attempt {attempt}: no valid measurements");
                    if !last {
                        scope.force_trigger()?;
                        settle(self.config.trigger_settle);
                    }
                }
            }
        }
        Ok(samples)
    }

    fn read_round<T: InstrumentInterface>(
        &self,
        scope: &mut ScopeController<T>,
    ) -> Result<(MeasurementSample, MeasurementSample, MeasurementSample), ScopeError> {
        let ch = self.config.channel;
        let frequency = scope.measure(MeasurementItem::Frequency, ch)?;
        settle(self.config.read_interval);
        let vpp = scope.measure(MeasurementItem::Vpp, ch)?;
        settle(self.config.read_interval);
        let vrms = scope.measure(MeasurementItem::Vrms, ch)?;
        settle(self.config.read_interval);
        Ok((frequency, vpp, vrms))
    }

    /// Set up and read period and pulse widths.
    ///
    /// All three items are read before any is checked, so an invalid reading is reported
    /// together with the other two.
    fn read_timing<T: InstrumentInterface>(
        &self,
        scope: &mut ScopeController<T>,
    ) -> Result<LineTiming, ValidationError> {
        let ch = self.config.channel;
        let items = [
            MeasurementItem::Period,
            MeasurementItem::PositiveWidth,
            MeasurementItem::NegativeWidth,
        ];

        log::info!("Measuring power quality metrics");
        scope.clear_measurements()?;
        for item in items {
            scope.enable_measurement(item, ch)?;
        }
        scope.force_trigger()?;
        settle(self.config.timing_settle);

        let mut samples = Vec::with_capacity(items.len());
        for item in items {
            samples.push(scope.measure(item, ch)?);
            settle(self.config.read_interval);
        }

        let mut values = [0.0; 3];
        for ((value, item), sample) in values.iter_mut().zip(items).zip(&samples) {
            *value = match sample.valid() {
                Some(v) if v > 0.0 => v,
                _ => {
                    log::error!("Invalid {item} reading {}", sample.raw());
                    return Err(ValidationError::MeasurementInvalid {
                        quantity: item.to_string(),
                        samples: samples.iter().map(|s| s.raw()).collect(),
                    });
                }
            };
        }

        let [period, positive_width, negative_width] = values;
        Ok(LineTiming {
            period,
            positive_width,
            negative_width,
        })
    }
}

fn valid_positive(value: f64) -> bool {
    MeasurementSample::classify(value)
        .valid()
        .is_some_and(|v| v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_stability() {
        let stability = VoltageStability::from_samples(&[118.0, 122.0]).unwrap();
        assert_eq!(stability.mean, 120.0);
        assert_eq!(stability.std_dev, 2.0);
        assert_eq!(stability.min, 118.0);
        assert_eq!(stability.max, 122.0);
        assert!((stability.variation_coefficient - 100.0 / 60.0).abs() < 1e-12);
        assert!(VoltageStability::from_samples(&[]).is_none());
    }

    #[test]
    fn test_duty_cycle() {
        let timing = LineTiming {
            period: 1.0 / 60.0,
            positive_width: 0.008,
            negative_width: 0.008,
        };
        assert_eq!(timing.duty_cycle(), 50.0);
    }
}
