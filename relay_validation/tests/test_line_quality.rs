//! Tests for the AC line quality measurement.

use std::time::Duration;

use rstest::*;

use benchlink::{InstrumentError, LoopbackInterfaceBytes};
use rigol_ds1000z::{InstrumentLink, Resource, ScopeController, ScopeTiming};

use relay_validation::{
    LINE_QUALITY_RECORD, LineQualityConfig, LineQualityMeasurer, MemoryRecorder, NoFaults,
    RandomFaults, RangeSpec, RecordValue, TestLimits, ValidationError,
};

type ScopeLbk = ScopeController<LoopbackInterfaceBytes>;

const IDN: &str = "RIGOL TECHNOLOGIES,DS1054Z,DS1ZA000000001,00.04.04.SP4";

const ACQUIRE: [&str; 3] = [":AUToscale", ":CHANnel1:SCALe 50", ":TFORce"];

const ROUND: [&str; 3] = [
    ":MEASure:ITEM? FREQuency,CHANnel1",
    ":MEASure:ITEM? VPP,CHANnel1",
    ":MEASure:ITEM? VRMS,CHANnel1",
];

const TIMING_SETUP: [&str; 5] = [
    ":MEASure:CLEar ALL",
    ":MEASure:ITEM PERiod,CHANnel1",
    ":MEASure:ITEM PWIDth,CHANnel1",
    ":MEASure:ITEM NWIDth,CHANnel1",
    ":TFORce",
];

const TIMING_QUERIES: [&str; 3] = [
    ":MEASure:ITEM? PERiod,CHANnel1",
    ":MEASure:ITEM? PWIDth,CHANnel1",
    ":MEASure:ITEM? NWIDth,CHANnel1",
];

const SENTINEL: &str = "9.9E37";

fn line(s: &str) -> Vec<u8> {
    format!("{s}\n").into_bytes()
}

fn lines(cmds: &[&str]) -> Vec<Vec<u8>> {
    cmds.iter().map(|s| line(s)).collect()
}

fn crt_scope(host2inst: Vec<Vec<u8>>, inst2host: Vec<Vec<u8>>) -> ScopeLbk {
    let mut inp = vec![line("*IDN?")];
    let mut out = vec![line(IDN)];
    inp.extend(host2inst);
    out.extend(inst2host);

    let mut lbk = Some(LoopbackInterfaceBytes::new(inp, out));
    let mut connector = |_: &Resource| {
        lbk.take()
            .ok_or_else(|| InstrumentError::InvalidArgument("already opened".to_string()))
    };
    let mut link = InstrumentLink::new();
    let resource = Resource::Raw {
        host: "scope.local".to_string(),
        port: 5555,
    };
    assert!(link.connect_with(&mut connector, &[resource]));
    ScopeController::new(link).with_timing(ScopeTiming::immediate(Duration::from_nanos(1)))
}

/// Host commands and scope answers of a measurement, built step by step.
struct Script {
    inp: Vec<Vec<u8>>,
    out: Vec<Vec<u8>>,
}

impl Script {
    fn acquire() -> Self {
        Script {
            inp: lines(&ACQUIRE),
            out: vec![],
        }
    }

    fn round(mut self, frequency: &str, vpp: &str, vrms: &str) -> Self {
        self.inp.extend(lines(&ROUND));
        self.out.extend(lines(&[frequency, vpp, vrms]));
        self
    }

    fn cmd(mut self, cmd: &str) -> Self {
        self.inp.push(line(cmd));
        self
    }

    fn query(mut self, cmd: &str, response: &str) -> Self {
        self.inp.push(line(cmd));
        self.out.push(line(response));
        self
    }

    fn timing(mut self, period: &str, pwidth: &str, nwidth: &str) -> Self {
        self.inp.extend(lines(&TIMING_SETUP));
        self.inp.extend(lines(&TIMING_QUERIES));
        self.out.extend(lines(&[period, pwidth, nwidth]));
        self
    }

    fn scope(self) -> ScopeLbk {
        crt_scope(self.inp, self.out)
    }
}

#[fixture]
fn measurer() -> LineQualityMeasurer {
    LineQualityMeasurer::new(LineQualityConfig::immediate())
}

#[fixture]
fn limits() -> TestLimits {
    TestLimits::mains_60hz()
}

#[rstest]
fn test_measure(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.010000e+01", "3.400000e+02", "1.210000e+02")
        .timing("1.666000e-02", "8.330000e-03", "8.330000e-03")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let report = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap();

    assert_eq!(report.frequency, vec![60.0, 60.1]);
    assert_eq!(report.vpp, vec![339.0, 340.0]);
    assert_eq!(report.vrms, vec![120.0, 121.0]);
    assert!((report.duty_cycle - 50.0).abs() < 1e-9);
    assert_eq!(report.voltage_stability.mean, 120.5);
    assert_eq!(report.voltage_stability.std_dev, 0.5);
    assert!((report.voltage_stability.variation_coefficient - 0.5 / 120.5 * 100.0).abs() < 1e-12);

    let record = recorder.record(LINE_QUALITY_RECORD).unwrap();
    assert_eq!(
        record.get("vrms_volts"),
        Some(&RecordValue::Sequence(vec![120.0, 121.0]))
    );
    assert!(record.get("duty_cycle").is_some());
    assert!(record.get("error").is_none());
}

/// Sentinel readings are retried after a forced trigger and never enter the statistics.
#[rstest]
fn test_measure_skips_invalid_rounds(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round(SENTINEL, SENTINEL, "1.200000e+02")
        .cmd(":TFORce")
        .round("6.000000e+01", "3.390000e+02", "1.210000e+02")
        .round("6.000000e+01", SENTINEL, "1.220000e+02")
        .timing("1.666000e-02", "8.330000e-03", "8.330000e-03")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let report = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap();

    assert_eq!(report.frequency, vec![60.0, 60.0]);
    assert_eq!(report.vrms, vec![121.0, 122.0]);
    assert_eq!(report.vpp, vec![339.0]);
    assert_eq!(report.voltage_stability.min, 121.0);
    assert!(report.voltage_stability.max < 1e3);
}

/// A reading that cannot be parsed ends the round without a forced trigger.
#[rstest]
fn test_measure_unparsable_round(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .query(":MEASure:ITEM? FREQuency,CHANnel1", "****")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .timing("1.666000e-02", "8.330000e-03", "8.330000e-03")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let report = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap();
    assert_eq!(report.frequency.len(), 2);
    assert_eq!(report.voltage_stability.variation_coefficient, 0.0);
}

#[rstest]
fn test_measure_no_valid_samples(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round(SENTINEL, SENTINEL, SENTINEL)
        .cmd(":TFORce")
        .round(SENTINEL, SENTINEL, "1.200000e+02")
        .cmd(":TFORce")
        .round("0.000000e+00", SENTINEL, "1.200000e+02")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    match err {
        ValidationError::MeasurementInvalid { quantity, samples } => {
            assert_eq!(quantity, "frequency");
            assert_eq!(samples, vec![9.9e37, 9.9e37, 0.0]);
        }
        other => panic!("Expected invalid measurement, got {other:?}"),
    }
    let record = recorder.record(LINE_QUALITY_RECORD).unwrap();
    assert!(record.get("error").is_some());
}

#[rstest]
fn test_measure_frequency_out_of_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("5.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    match err {
        ValidationError::OutOfRange {
            quantity,
            values,
            range,
        } => {
            assert_eq!(quantity, "frequency");
            assert_eq!(values, vec![50.0, 60.0]);
            assert_eq!(range, RangeSpec::new(55.0, 65.0));
        }
        other => panic!("Expected out of range, got {other:?}"),
    }
    let record = recorder.record(LINE_QUALITY_RECORD).unwrap();
    assert_eq!(
        record.get("frequency_hz"),
        Some(&RecordValue::Sequence(vec![50.0, 60.0]))
    );
}

#[rstest]
fn test_measure_voltage_out_of_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.350000e+02")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::OutOfRange { ref quantity, .. } if quantity == "RMS voltage"
    ));
    assert!(!err.is_retryable());
}

#[rstest]
fn test_measure_duty_cycle_out_of_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .timing("1.666000e-02", "1.000000e-02", "6.660000e-03")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::OutOfRange { ref quantity, .. } if quantity == "duty cycle"
    ));
    let record = recorder.record(LINE_QUALITY_RECORD).unwrap();
    assert!(record.get("duty_cycle").is_some());
}

#[rstest]
fn test_measure_stability_out_of_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.050000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.250000e+02")
        .timing("1.666000e-02", "8.330000e-03", "8.330000e-03")
        .scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::OutOfRange { ref quantity, .. } if quantity == "RMS voltage variation"
    ));
}

/// An invalid timing reading is reported with all three readings.
#[rstest]
#[case(["9.9E37", "8.330000e-03", "8.330000e-03"], "period", [9.9e37, 8.33e-3, 8.33e-3])]
#[case(["1.666000e-02", "9.9E37", "8.330000e-03"], "positive pulse width", [1.666e-2, 9.9e37, 8.33e-3])]
#[case(["1.666000e-02", "8.330000e-03", "-8.330000e-03"], "negative pulse width", [1.666e-2, 8.33e-3, -8.33e-3])]
fn test_measure_invalid_timing(
    measurer: LineQualityMeasurer,
    limits: TestLimits,
    #[case] answers: [&str; 3],
    #[case] expected_quantity: &str,
    #[case] expected_samples: [f64; 3],
) {
    let mut script = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02");
    for cmd in TIMING_SETUP {
        script = script.cmd(cmd);
    }
    for (query, answer) in TIMING_QUERIES.into_iter().zip(answers) {
        script = script.query(query, answer);
    }
    let mut scope = script.scope();
    let mut recorder = MemoryRecorder::new();

    let err = measurer
        .measure(&mut scope, &limits, &mut recorder, &mut NoFaults)
        .unwrap_err();
    match err {
        ValidationError::MeasurementInvalid { quantity, samples } => {
            assert_eq!(quantity, expected_quantity);
            assert_eq!(samples, expected_samples.to_vec());
        }
        other => panic!("Expected invalid measurement, got {other:?}"),
    }
    assert!(
        recorder
            .record(LINE_QUALITY_RECORD)
            .and_then(|r| r.get("error"))
            .is_some()
    );
}

/// A missing range fails before any command is sent.
#[rstest]
fn test_measure_missing_frequency_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = crt_scope(vec![], vec![]);
    let limits = TestLimits {
        ac_frequency: None,
        ..limits
    };
    let err = measurer
        .measure(&mut scope, &limits, &mut MemoryRecorder::new(), &mut NoFaults)
        .unwrap_err();
    assert!(matches!(err, ValidationError::Configuration(_)));
}

/// A missing duty cycle range fails after frequency and voltage, before the timing setup.
#[rstest]
fn test_measure_missing_duty_cycle_range(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .scope();
    let limits = TestLimits {
        duty_cycle: None,
        ..limits
    };
    let err = measurer
        .measure(&mut scope, &limits, &mut MemoryRecorder::new(), &mut NoFaults)
        .unwrap_err();
    match err {
        ValidationError::Configuration(msg) => assert!(msg.contains("duty_cycle")),
        other => panic!("Expected configuration error, got {other:?}"),
    }
}

#[rstest]
fn test_measure_simulated_fault(measurer: LineQualityMeasurer, limits: TestLimits) {
    let mut scope = Script::acquire()
        .round("6.000000e+01", "3.390000e+02", "1.200000e+02")
        .round("6.000000e+01", "3.390000e+02", "1.210000e+02")
        .scope();
    let mut faults = RandomFaults::seeded(1.0, 11);

    let err = measurer
        .measure(&mut scope, &limits, &mut MemoryRecorder::new(), &mut faults)
        .unwrap_err();
    match err {
        ValidationError::MeasurementInvalid { samples, .. } => {
            assert_eq!(samples, vec![120.0, 121.0]);
        }
        other => panic!("Expected invalid measurement, got {other:?}"),
    }
}
