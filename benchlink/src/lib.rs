//! benchlink: blocking transport layer for the instruments on a relay validation bench.
//!
//! The bench talks to two very different devices: a network oscilloscope speaking SCPI over a raw
//! TCP socket and a relay module speaking a line based console protocol over a serial port. Both
//! are driven through the same [`InstrumentInterface`] trait, so a driver never needs to know how
//! its bytes travel. The generic [`Instrument`] works with anything that implements
//! [`std::io::Read`] and [`std::io::Write`].
//!
//! # Currently implemented interfaces are:
//! - TCP/IP (blocking) using [`std::net::TcpStream`], see [`TcpIpInterface`].
//! - Serial (blocking) using the [`serialport`] crate, see [`SerialInterface`] (feature `serial`).
//! - Loopback interfaces for testing drivers without hardware, see [`LoopbackInterfaceString`] and
//!   [`LoopbackInterfaceBytes`].
//!
//! # Binary transfers
//!
//! Besides line based commands and queries, oscilloscopes return sample memory as binary blocks.
//! For these, [`InstrumentInterface::read_chunk`] hands out whatever the interface currently has
//! available, so a driver can assemble a payload of known length over several partial reads.

#![warn(missing_docs)]

mod instrument;
mod loopback;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;

pub use instrument::{Instrument, InstrumentError};
pub use loopback::{LoopbackInterfaceBytes, LoopbackInterfaceString};
#[cfg(feature = "serial")]
pub use serial::SerialInterface;
pub use tcp_ip::TcpIpInterface;

use std::time::{Duration, Instant};

/// The `InstrumentInterface` trait defines the interface for controlling instruments.
///
/// Implementors only have to provide raw reading and writing. Sending commands, reading lines, and
/// querying are built on top of these with default implementations that honor the terminator
/// and timeout of the interface.
pub trait InstrumentInterface {
    /// Read exactly `buf.len()` bytes from the instrument.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Read whatever is currently available, up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes read. Zero means the interface has no more data to offer,
    /// e.g., the connection was closed. The default implementation reads a single byte.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, InstrumentError> {
        match buf.first_mut() {
            Some(first) => {
                let mut single = [0u8];
                self.read_exact(&mut single)?;
                *first = single[0];
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Write all the given bytes to the instrument and flush.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Get the terminator of the interface. Defaults to `"\n"`.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of the interface.
    ///
    /// # Arguments:
    /// - `_terminator` - A string slice that will be used as the terminator for commands.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the timeout that is used when waiting for a terminator. Defaults to three seconds.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Write a string to the instrument as is, without appending a terminator.
    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        self.write_raw(data.as_bytes())
    }

    /// Send a command to the instrument.
    ///
    /// The terminator is appended unless the command already ends with it.
    ///
    /// # Arguments:
    /// - `cmd` - A string slice that will be sent to the instrument.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let terminator = self.get_terminator().to_string();
        if cmd.ends_with(&terminator) {
            self.write(cmd)
        } else {
            self.write(&format!("{cmd}{terminator}"))
        }
    }

    /// Read from the instrument until the terminator is found and return the trimmed line.
    ///
    /// Non-UTF-8 bytes are dropped with a warning. If no terminator shows up before the timeout
    /// of the interface elapses, [`InstrumentError::Timeout`] is returned.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let terminator = self.get_terminator().to_string();
        let timeout = self.get_timeout();
        let mut response = String::new();
        let mut single_buf = [0u8];

        let tic = Instant::now();
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            if let Ok(val) = std::str::from_utf8(&single_buf) {
                response.push_str(val);
            } else {
                log::warn!("Dropping non UTF-8 byte from instrument: {single_buf:?}");
            }
            if response.ends_with(&terminator) {
                return Ok(response.trim().to_string());
            }
        }
        Err(InstrumentError::Timeout(timeout))
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// # Arguments
    /// * `cmd` - The command to send to the instrument for which we expect a response.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        match self.read_until_terminator() {
            Err(InstrumentError::Timeout(timeout)) => Err(InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            }),
            other => other,
        }
    }
}
