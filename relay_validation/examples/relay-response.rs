use std::{env, fs};

use benchlink::SerialInterface;
use rigol_ds1000z::{InstrumentLink, ScopeController};

use relay_validation::{
    Bench, BenchConfig, FaultInjector, MemoryRecorder, NoFaults, RandomFaults, RelayTestConfig,
    TasmotaActuator, run_relay_response,
};

fn main() {
    env_logger::init();

    // Load the bench setup, by default from the file next to this crate's manifest.
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/bench.toml").to_string());
    let config = BenchConfig::from_toml_str(&fs::read_to_string(&path).unwrap()).unwrap();

    let mut link = InstrumentLink::new();
    if !link.connect(&config.scope.host, config.scope.port) {
        eprintln!("No oscilloscope found at {}", config.scope.host);
        return;
    }
    let mut scope = ScopeController::new(link);
    println!("Connected to: {}", scope.identify().unwrap());
    scope
        .configure_for_transition_capture(config.scope.channel, config.scope.timebase().unwrap())
        .unwrap();

    let relay_cfg = config.relay.clone();
    let relay = TasmotaActuator::new(move || {
        SerialInterface::simple(&relay_cfg.serial_port, relay_cfg.baud_rate)
    })
    .with_num_relays(config.relay.num_relays);

    // Simulated faults only when asked for in the configuration.
    let mut faults: Box<dyn FaultInjector> = if config.fault_chance > 0.0 {
        Box::new(RandomFaults::new(config.fault_chance))
    } else {
        Box::new(NoFaults)
    };

    let mut test_config = RelayTestConfig {
        relay_number: config.relay.relay_number,
        ..RelayTestConfig::default()
    };
    test_config.capture.channel = config.scope.channel;
    test_config.line_quality.channel = config.scope.channel;

    let mut bench = Bench::new(scope, relay);
    let mut recorder = MemoryRecorder::new();
    match run_relay_response(
        &mut bench,
        &config.limits,
        &mut recorder,
        faults.as_mut(),
        &test_config,
    ) {
        Ok(report) => {
            println!(
                "Line: {:.2} Hz, duty cycle {:.1} %",
                report.line_quality.mean_frequency(),
                report.line_quality.duty_cycle
            );
            println!(
                "Turn-on: {:.3} ms, {} bounces over {:.3} ms",
                report.analysis.transition_time * 1e3,
                report.analysis.bounce_count,
                report.analysis.bounce_duration * 1e3
            );
        }
        Err(e) if e.is_retryable() => println!("Test failed, worth a retry: {e}"),
        Err(e) => println!("Test failed: {e}"),
    }

    for record in &recorder.records {
        println!("{}:", record.name());
        for (name, value) in record.fields() {
            println!("  {name} = {value}");
        }
    }
}
