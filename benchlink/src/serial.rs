//! Blocking serial interface using the `serialport` crate.

use std::time::Duration;

use serialport::{SerialPort, SerialPortBuilder};

use crate::{Instrument, InstrumentError};

/// Build an [`Instrument`] interface around a serial port.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with the given baud rate and a timeout of one second.
    ///
    /// Data bits, parity, and stop bits are left at the `serialport` defaults (8N1), which is
    /// what USB-serial adapters on relay modules expect.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(port: &str, baud: u32) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(1));
        Self::full(spb)
    }

    /// Open a fully configured serial port.
    ///
    /// The timeout of the builder is used as the timeout of the returned [`Instrument`].
    ///
    /// # Arguments
    /// * `spb` - A [`serialport::SerialPortBuilder`] with all the settings applied.
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        port.clear(serialport::ClearBuffer::All)?;
        Ok(Instrument::new(port, timeout))
    }
}
