//! Validation of relay modules on a bench with a Rigol DS1000Z oscilloscope.
//!
//! A relay switches a mains line that is probed by the oscilloscope. The oscilloscope is armed
//! before the relay is commanded, captures the resulting edge, and the edge is analyzed for its
//! transition time and contact bounce. With the relay closed, the line behind it is checked for
//! frequency, voltage, duty cycle and voltage stability.
//!
//! - [`analyze`] is a pure function over a captured waveform.
//! - [`capture_edge`] coordinates oscilloscope and relay for a single triggered capture.
//! - [`LineQualityMeasurer`] reads the automatic measurements with retries and checks them
//!   against [`TestLimits`].
//! - [`run_relay_response`] runs the complete test on a [`Bench`] and hands all results to a
//!   [`Recorder`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use benchlink::SerialInterface;
//! use rigol_ds1000z::{InstrumentLink, ScopeController};
//! use relay_validation::{
//!     Bench, MemoryRecorder, NoFaults, RelayTestConfig, TasmotaActuator, TestLimits,
//!     run_relay_response,
//! };
//! use tasmota_relay::BAUD_RATE;
//!
//! let mut link = InstrumentLink::new();
//! assert!(link.connect("192.168.1.100", 5555));
//! let mut scope = ScopeController::new(link);
//! scope
//!     .configure_for_transition_capture(0, Duration::from_millis(5))
//!     .unwrap();
//!
//! let relay = TasmotaActuator::new(|| SerialInterface::simple("/dev/ttyUSB0", BAUD_RATE));
//! let mut bench = Bench::new(scope, relay);
//!
//! let mut recorder = MemoryRecorder::new();
//! let report = run_relay_response(
//!     &mut bench,
//!     &TestLimits::mains_60hz(),
//!     &mut recorder,
//!     &mut NoFaults,
//!     &RelayTestConfig::default(),
//! )
//! .unwrap();
//! println!("{} bounces", report.analysis.bounce_count);
//! ```

#![warn(missing_docs)]

mod actuator;
mod analysis;
mod bench;
mod capture;
mod error;
mod faults;
mod limits;
mod line_quality;
mod record;

pub use actuator::{RelayActuator, TasmotaActuator};
pub use analysis::{
    AnalysisError, BounceRegion, EDGE_SAMPLES, TransitionAnalysis, TransitionType, analyze,
};
pub use bench::Bench;
pub use capture::{CaptureConfig, CaptureError, CaptureResult, CaptureStage, capture_edge};
pub use error::{RelayAction, ValidationError};
pub use faults::{FaultInjector, FaultPoint, NoFaults, RandomFaults};
pub use limits::{BenchConfig, RangeSpec, RelayConfig, ScopeConfig, TestLimits};
pub use line_quality::{
    LINE_QUALITY_RECORD, LineQualityConfig, LineQualityMeasurer, LineQualityReport, LineTiming,
    VoltageStability,
};
pub use record::{MemoryRecorder, Record, RecordValue, Recorder, SampleTable};
pub use relay_test::{RelayResponseReport, RelayTestConfig, TURN_ON_RECORD, run_relay_response};

use std::time::Duration;

/// Sleep for a fixed delay, skipping zero delays.
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
