use std::{thread, time::Duration};

use benchlink::SerialInterface;

use tasmota_relay::{BAUD_RATE, Tasmota};

fn main() {
    env_logger::init();

    let port = "/dev/ttyUSB0";

    // Define the serial instrument interface using the `simple` method.
    let serial_inst = SerialInterface::simple(port, BAUD_RATE).expect("Failed to open serial port");

    // Now we can open the Tasmota module with the serial interface.
    let mut tasmota = Tasmota::try_new(serial_inst).unwrap();
    println!("Firmware: {}", tasmota.get_firmware_version().unwrap());

    // Click relay 1 on and off again.
    let mut relay = tasmota.get_relay(0).unwrap();
    relay.set_power(true).unwrap();
    println!("Relay {} is {}", relay.number(), relay.get_power_state().unwrap());
    thread::sleep(Duration::from_secs(1));
    relay.set_power(false).unwrap();
    println!("Relay {} is {}", relay.number(), relay.get_power_state().unwrap());
}
