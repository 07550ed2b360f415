//! Tests for the Rigol DS1000Z oscilloscope driver.

use std::time::Duration;

use measurements::Voltage;
use rstest::*;

use benchlink::{InstrumentError, LoopbackInterfaceBytes};

use rigol_ds1000z::{
    BlockError, InstrumentLink, MeasurementItem, MeasurementSample, ProtocolError, Resource,
    ScopeController, ScopeError, ScopeTiming, TriggerSlope, TriggerStatus, VoltageScaling,
};

type ScopeLbk = ScopeController<LoopbackInterfaceBytes>;

const IDN: &str = "RIGOL TECHNOLOGIES,DS1054Z,DS1ZA000000001,00.04.04.SP4";

/// Preamble of a three point byte waveform: 1 us per sample, 10 mV per code, reference 128.
const PREAMBLE: &str = "1,0,3,1,1.000000e-06,0.000000e+00,0,1.000000e-02,0,128";

/// Commands sent while reading a waveform from channel 1, up to the data query.
const CAPTURE_CMDS: [&str; 5] = [
    ":STOP",
    ":WAVeform:SOURce CHANnel1",
    ":WAVeform:FORMat BYTE",
    ":WAVeform:PREamble?",
    ":WAVeform:DATA?",
];

fn line(s: &str) -> Vec<u8> {
    format!("{s}\n").into_bytes()
}

fn lines(cmds: &[&str]) -> Vec<Vec<u8>> {
    cmds.iter().map(|s| line(s)).collect()
}

fn raddr() -> Resource {
    Resource::Raw {
        host: "scope.local".to_string(),
        port: 5555,
    }
}

/// Connect a controller to a loopback that first answers the identification query.
///
/// The controller runs without delays and polls the trigger every nanosecond.
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
    assert!(link.connect_with(&mut connector, &[raddr()]));
    ScopeController::new(link).with_timing(ScopeTiming::immediate(Duration::from_nanos(1)))
}

#[fixture]
fn emp_scope() -> ScopeLbk {
    crt_scope(vec![], vec![])
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[rstest]
fn test_connect(emp_scope: ScopeLbk) {
    assert!(emp_scope.is_connected());
}

/// Resources are tried in order until a recognized oscilloscope answers.
#[rstest]
fn test_connect_tries_resources_in_order() {
    let mut tried = Vec::new();
    let mut connector = |resource: &Resource| {
        tried.push(resource.to_string());
        match resource {
            Resource::Instr { .. } => Err(InstrumentError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))),
            Resource::Socket { .. } => Ok(LoopbackInterfaceBytes::new(
                lines(&["*IDN?"]),
                lines(&["KEYSIGHT TECHNOLOGIES,DSOX1204G,CN0000,2.10"]),
            )),
            Resource::Raw { .. } => Ok(LoopbackInterfaceBytes::new(
                lines(&["*IDN?"]),
                lines(&[IDN]),
            )),
        }
    };

    let mut link = InstrumentLink::new();
    assert!(link.connect_with(&mut connector, &Resource::candidates("10.0.0.7", 5555)));
    assert_eq!(link.idn(), Some(IDN));
    assert_eq!(
        tried,
        vec![
            "TCPIP0::10.0.0.7::INSTR",
            "TCPIP0::10.0.0.7::5555::SOCKET",
            "10.0.0.7:5555"
        ]
    );
}

#[rstest]
fn test_connect_unrecognized_device() {
    let mut connector = |_: &Resource| {
        Ok::<_, InstrumentError>(LoopbackInterfaceBytes::new(
            lines(&["*IDN?"]),
            lines(&["Tektronix,TBS1052B,C010000,CF:91.1CT"]),
        ))
    };
    let mut link = InstrumentLink::new();
    assert!(!link.connect_with(&mut connector, &[raddr()]));
    assert!(!link.is_connected());
    assert_eq!(link.idn(), None);
}

/// A disconnected link answers with sentinels and disconnecting twice is fine.
#[rstest]
fn test_link_sentinels_when_disconnected(mut emp_scope: ScopeLbk) {
    let link = emp_scope.link_mut();
    link.disconnect();
    link.disconnect();
    assert!(!link.send(":RUN"));
    assert_eq!(link.query("*IDN?"), "");
    assert!(matches!(link.read_block(), Err(ScopeError::NotConnected)));
}

#[rstest]
fn test_controller_not_connected(mut emp_scope: ScopeLbk) {
    emp_scope.disconnect();
    assert!(matches!(emp_scope.run(), Err(ScopeError::NotConnected)));
    assert!(matches!(
        emp_scope.trigger_status(),
        Err(ScopeError::NotConnected)
    ));
    assert!(matches!(
        emp_scope.poll_trigger_status(Duration::from_nanos(5)),
        Err(ScopeError::NotConnected)
    ));
}

#[rstest]
fn test_identify() {
    let mut scope = crt_scope(lines(&["*IDN?"]), lines(&[IDN]));
    assert_eq!(scope.identify().unwrap(), IDN);
}

#[rstest]
fn test_simple_commands() {
    let mut scope = crt_scope(
        lines(&["*RST", ":RUN", ":STOP", ":AUToscale", ":TFORce"]),
        vec![],
    );
    scope.reset().unwrap();
    scope.run().unwrap();
    scope.stop().unwrap();
    scope.autoscale().unwrap();
    scope.force_trigger().unwrap();
}

#[rstest]
fn test_configure_for_transition_capture() {
    let mut scope = crt_scope(
        lines(&[
            "*RST",
            ":STOP",
            ":TIMebase:SCALe 0.005",
            ":TIMebase:SCALe?",
            ":CHANnel2:DISPlay ON",
            ":CHANnel2:COUPling AC",
            ":CHANnel2:PROBe 10",
            ":CHANnel2:SCALe 50",
            ":TRIGger:MODE EDGE",
            ":TRIGger:EDGE:SOURce CHANnel2",
            ":TRIGger:EDGE:SLOPe POSitive",
            ":TRIGger:EDGE:LEVel 25",
            ":TRIGger:COUPling AC",
            ":TRIGger:SWEep NORMal",
        ]),
        lines(&["5.000000e-03"]),
    );
    scope
        .configure_for_transition_capture(1, Duration::from_millis(5))
        .unwrap();
}

/// The timebase is re-sent until the read-back matches.
#[rstest]
fn test_set_timebase_retries() {
    let mut scope = crt_scope(
        lines(&[
            ":TIMebase:SCALe 0.005",
            ":TIMebase:SCALe?",
            ":TIMebase:SCALe 0.005",
            ":TIMebase:SCALe?",
        ]),
        lines(&["1.000000e-02", "5.000000e-03"]),
    );
    assert_eq!(scope.set_timebase(Duration::from_millis(5)).unwrap(), 5e-3);
}

/// After three failed verifications the last read-back is kept.
#[rstest]
fn test_set_timebase_keeps_last_readback() {
    let cmds = [":TIMebase:SCALe 0.005", ":TIMebase:SCALe?"];
    let mut scope = crt_scope(
        lines(&[cmds, cmds, cmds].concat()),
        lines(&["2.000000e-03", "2.000000e-03", "2.000000e-03"]),
    );
    assert_eq!(scope.set_timebase(Duration::from_millis(5)).unwrap(), 2e-3);
}

#[rstest]
fn test_set_vertical_scale() {
    let mut scope = crt_scope(lines(&[":CHANnel4:SCALe 0.5"]), vec![]);
    scope
        .set_vertical_scale(3, Voltage::from_millivolts(500.0))
        .unwrap();
    assert!(matches!(
        scope.set_vertical_scale(0, Voltage::from_volts(0.0)),
        Err(ScopeError::Argument(
            InstrumentError::FloatValueOutOfRange { .. }
        ))
    ));
}

#[rstest]
fn test_channel_out_of_range(mut emp_scope: ScopeLbk) {
    match emp_scope.capture_waveform(4) {
        Err(ScopeError::Argument(InstrumentError::ChannelIndexOutOfRange {
            idx,
            nof_channels,
        })) => {
            assert_eq!(idx, 4);
            assert_eq!(nof_channels, 4);
        }
        other => panic!("Expected channel out of range, got {other:?}"),
    }
}

#[rstest]
#[case(TriggerSlope::Positive, ":TRIGger:EDGE:SLOPe POSitive")]
#[case(TriggerSlope::Negative, ":TRIGger:EDGE:SLOPe NEGative")]
fn test_set_trigger_slope(#[case] slope: TriggerSlope, #[case] cmd: &str) {
    let mut scope = crt_scope(lines(&[cmd, ":TRIGger:EDGE:LEVel 25"]), vec![]);
    scope.set_trigger_slope(slope).unwrap();
}

#[rstest]
fn test_arm_single_trigger() {
    let mut scope = crt_scope(lines(&[":TRIGger:SWEep SINGle", ":SINGle"]), vec![]);
    scope.arm_single_trigger().unwrap();
}

#[rstest]
#[case("TD", TriggerStatus::Triggered)]
#[case("WAIT", TriggerStatus::Wait)]
#[case("RUN", TriggerStatus::Run)]
#[case("AUTO", TriggerStatus::Auto)]
#[case("STOP", TriggerStatus::Stop)]
fn test_trigger_status(#[case] response: &str, #[case] expected: TriggerStatus) {
    let mut scope = crt_scope(lines(&[":TRIGger:STATus?"]), lines(&[response]));
    assert_eq!(scope.trigger_status().unwrap(), expected);
}

/// Polling continues through waiting states and missing answers until the scope stops.
#[rstest]
fn test_poll_trigger_status_stops() {
    let mut scope = crt_scope(
        lines(&[":TRIGger:STATus?"; 4]),
        lines(&["WAIT", "", "TD", "STOP"]),
    );
    scope.poll_trigger_status(Duration::from_nanos(10)).unwrap();
}

/// Three polls fit into the timeout; none of them sees the stopped state.
#[rstest]
fn test_poll_trigger_status_timeout() {
    let mut scope = crt_scope(
        lines(&[":TRIGger:STATus?"; 3]),
        lines(&["WAIT", "WAIT", "WAIT"]),
    );
    let timeout = Duration::from_nanos(3);
    match scope.poll_trigger_status(timeout) {
        Err(ScopeError::TriggerTimeout(t)) => assert_eq!(t, timeout),
        other => panic!("Expected trigger timeout, got {other:?}"),
    }
}

/// A scope that stops answering is a transport failure, not a missing edge.
#[rstest]
#[case(vec!["", "", ""])]
#[case(vec!["WAIT", "WAIT", ""])]
fn test_poll_trigger_status_silent(#[case] answers: Vec<&str>) {
    let mut scope = crt_scope(lines(&[":TRIGger:STATus?"; 3]), lines(&answers));
    match scope.poll_trigger_status(Duration::from_nanos(3)) {
        Err(ScopeError::Transport(msg)) => assert!(msg.contains("3 polls"), "{msg}"),
        other => panic!("Expected transport error, got {other:?}"),
    }
}

/// An answer after a lost one still ends in a trigger timeout.
#[rstest]
fn test_poll_trigger_status_recovers() {
    let mut scope = crt_scope(
        lines(&[":TRIGger:STATus?"; 3]),
        lines(&["", "WAIT", "WAIT"]),
    );
    assert!(matches!(
        scope.poll_trigger_status(Duration::from_nanos(3)),
        Err(ScopeError::TriggerTimeout(_))
    ));
}

#[rstest]
fn test_capture_waveform() {
    let mut inp = lines(&CAPTURE_CMDS);
    inp.push(line(":RUN"));
    let mut out = lines(&[PREAMBLE]);
    out.push(b"#13".to_vec());
    out.push(vec![128, 138, 118]);
    out.push(b"\n".to_vec());

    let mut scope = crt_scope(inp, out);
    let waveform = scope.capture_waveform(0).unwrap();
    assert_close(&waveform.time, &[0.0, 1e-6, 2e-6]);
    assert_close(&waveform.voltage, &[0.0, 0.10, -0.10]);
}

/// A payload split over several partial reads reassembles to the same waveform.
#[rstest]
fn test_capture_waveform_chunked() {
    let codes: Vec<u8> = (0..=255).collect();
    let preamble = "1,0,256,1,2.000000e-06,-1.000000e-04,0,4.000000e-02,0,127";

    let run_capture = |packets: Vec<Vec<u8>>| {
        let mut inp = lines(&CAPTURE_CMDS);
        inp.push(line(":RUN"));
        let mut out = lines(&[preamble]);
        out.extend(packets);
        crt_scope(inp, out).capture_waveform(0).unwrap()
    };

    let mut single = b"#9000000256".to_vec();
    single.extend(&codes);
    single.push(b'\n');
    let whole = run_capture(vec![single]);

    let mut first = b"#9000000256".to_vec();
    first.extend(&codes[..17]);
    let chunked = run_capture(vec![
        first,
        codes[17..200].to_vec(),
        codes[200..].to_vec(),
        b"\n".to_vec(),
    ]);

    assert_eq!(whole.len(), 256);
    assert_eq!(whole, chunked);
}

#[rstest]
fn test_capture_waveform_without_origin() {
    let mut inp = lines(&CAPTURE_CMDS);
    inp.push(line(":RUN"));
    let mut out = lines(&["1,0,2,1,1.000000e-06,0.000000e+00,0,1.000000e-02,0.5,128"]);
    out.push(b"#12".to_vec());
    out.push(vec![128, 228]);
    out.push(b"\n".to_vec());

    let mut scope = crt_scope(inp, out).with_scaling(VoltageScaling::WithoutOrigin);
    let waveform = scope.capture_waveform(0).unwrap();
    assert_close(&waveform.voltage, &[0.0, 1.0]);
}

/// The acquisition is restarted even if the block is cut short.
#[rstest]
fn test_capture_waveform_truncated() {
    let mut inp = lines(&CAPTURE_CMDS);
    inp.push(line(":RUN"));
    let mut out = lines(&[PREAMBLE]);
    out.push(b"#13".to_vec());
    out.push(vec![128, 138]);
    out.push(vec![]);

    let mut scope = crt_scope(inp, out);
    match scope.capture_waveform(0) {
        Err(ScopeError::Protocol(ProtocolError::Block(BlockError::Truncated {
            expected,
            received,
        }))) => {
            assert_eq!(expected, 3);
            assert_eq!(received, 2);
        }
        other => panic!("Expected truncated block, got {other:?}"),
    }
}

#[rstest]
#[case(b"X".to_vec())]
#[case(b"#0".to_vec())]
#[case(b"#2x1".to_vec())]
#[case(b"#9999999999".to_vec())]
#[case(b"#824000001".to_vec())]
fn test_capture_waveform_malformed_header(#[case] header: Vec<u8>) {
    let mut inp = lines(&CAPTURE_CMDS);
    inp.push(line(":RUN"));
    let mut out = lines(&[PREAMBLE]);
    out.push(header);

    let mut scope = crt_scope(inp, out);
    let err = scope.capture_waveform(0).unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(
        err,
        ScopeError::Protocol(ProtocolError::Block(BlockError::MalformedHeader(_)))
    ));
}

/// A preamble with the wrong number of fields stops the capture before the data query.
#[rstest]
fn test_capture_waveform_bad_preamble() {
    let mut inp = lines(&CAPTURE_CMDS[..4]);
    inp.push(line(":RUN"));
    let mut scope = crt_scope(inp, lines(&["1,0,3,1,1e-6"]));
    let err = scope.capture_waveform(0).unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(err, ScopeError::Protocol(ProtocolError::Preamble(_))));
}

/// No preamble at all is a transport failure, which may go away on retry.
#[rstest]
fn test_capture_waveform_no_preamble() {
    let mut inp = lines(&CAPTURE_CMDS[..4]);
    inp.push(line(":RUN"));
    let mut scope = crt_scope(inp, lines(&[""]));
    let err = scope.capture_waveform(0).unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, ScopeError::Transport(_)));
}

#[rstest]
fn test_measurement_setup() {
    let mut scope = crt_scope(
        lines(&[
            ":MEASure:CLEar ALL",
            ":MEASure:ITEM FREQuency,CHANnel1",
            ":MEASure:ITEM PWIDth,CHANnel1",
        ]),
        vec![],
    );
    scope.clear_measurements().unwrap();
    scope
        .enable_measurement(MeasurementItem::Frequency, 0)
        .unwrap();
    scope
        .enable_measurement(MeasurementItem::PositiveWidth, 0)
        .unwrap();
}

#[rstest]
#[case(MeasurementItem::Frequency, "FREQuency", "6.001000e+01", MeasurementSample::Valid(60.01))]
#[case(MeasurementItem::Vrms, "VRMS", "1.201000e+02", MeasurementSample::Valid(120.1))]
#[case(MeasurementItem::Vpp, "VPP", "9.9E37", MeasurementSample::Invalid(9.9e37))]
#[case(MeasurementItem::NegativeWidth, "NWIDth", "8.330000e-03", MeasurementSample::Valid(8.33e-3))]
fn test_measure(
    #[case] item: MeasurementItem,
    #[case] cmd_item: &str,
    #[case] response: &str,
    #[case] expected: MeasurementSample,
) {
    let query = format!(":MEASure:ITEM? {cmd_item},CHANnel1");
    let mut scope = crt_scope(lines(&[query.as_str()]), lines(&[response]));
    assert_eq!(scope.measure(item, 0).unwrap(), expected);
}

#[rstest]
fn test_measure_unparsable() {
    let mut scope = crt_scope(
        lines(&[":MEASure:ITEM? PERiod,CHANnel1"]),
        lines(&["****"]),
    );
    assert!(matches!(
        scope.measure(MeasurementItem::Period, 0),
        Err(ScopeError::Protocol(ProtocolError::Response { .. }))
    ));
}
