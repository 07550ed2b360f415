use std::time::Duration;

use rigol_ds1000z::{InstrumentLink, MeasurementItem, ScopeController};

fn main() {
    env_logger::init();

    // Connect to the oscilloscope, trying all resource formats for the host.
    let mut link = InstrumentLink::new();
    if !link.connect("192.168.1.50", 5555) {
        eprintln!("No oscilloscope found");
        return;
    }

    let mut scope = ScopeController::new(link);
    println!("Connected to: {}", scope.identify().unwrap());

    // Set up channel 1 for mains signals and show the line frequency.
    scope
        .configure_for_transition_capture(0, Duration::from_millis(5))
        .unwrap();
    scope.enable_measurement(MeasurementItem::Frequency, 0).unwrap();
    scope.run().unwrap();
    scope.force_trigger().unwrap();
    std::thread::sleep(Duration::from_secs(3));

    match scope.measure(MeasurementItem::Frequency, 0).unwrap().valid() {
        Some(freq) => println!("Line frequency: {freq} Hz"),
        None => println!("No valid frequency reading"),
    }

    // Read the waveform currently on screen.
    let waveform = scope.capture_waveform(0).unwrap();
    println!("Captured {waveform}");
}
