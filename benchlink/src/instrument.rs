//! The generic [`Instrument`] interface and the error type shared by all bench drivers.
//!
//! [`Instrument`] can be built from any port that implements [`std::io::Read`] and
//! [`std::io::Write`], such as [`std::net::TcpStream`] or a boxed [`serialport::SerialPort`].

use std::time::Duration;

use thiserror::Error;

use crate::InstrumentInterface;

/// A general instrument interface around any port implementing [`std::io::Read`] and
/// [`std::io::Write`].
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use benchlink::{Instrument, InstrumentInterface};
///
/// let stream = TcpStream::connect("192.168.1.50:5555").unwrap();
/// let mut scope = Instrument::new(stream, Duration::from_secs(5));
/// println!("{}", scope.query("*IDN?").unwrap());
/// ```
pub struct Instrument<P: std::io::Read + std::io::Write> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: std::io::Read + std::io::Write> Instrument<P> {
    /// Create a new [`Instrument`] with a given port and timeout.
    ///
    /// The terminator defaults to `"\n"`.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }

    /// Get a reference to the underlying port, e.g., to inspect what was written to it.
    pub fn port(&self) -> &P {
        &self.port
    }
}

impl<P: std::io::Read + std::io::Write> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, InstrumentError> {
        Ok(self.port.read(buf)?)
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }
}

/// The error enum for all bench instruments.
///
/// Drivers return this error for everything that goes wrong while sending commands or parsing
/// responses, so that failures propagate with the `?` operator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// The channel index requested is out of range.
    #[error(
        "Channel with index {idx} is out of range. Number of channels available: {nof_channels}"
    )]
    ChannelIndexOutOfRange {
        /// Index of the channel that is out of range.
        idx: usize,
        /// Total number of channels.
        nof_channels: usize,
    },
    /// A given float value is out of the specified range.
    #[error("Float value {value} is out of range. Allowed range is [{min}, {max}]")]
    FloatValueOutOfRange {
        /// The value that is out of range.
        value: f64,
        /// The minimum value that is allowed.
        min: f64,
        /// The maximum value that is allowed.
        max: f64,
    },
    /// A given integer value is out of the specified range.
    #[error("Integer value {value} is out of range. Allowed range is [{min}, {max}]")]
    IntValueOutOfRange {
        /// The value that is out of range.
        value: i64,
        /// The minimum value that is allowed.
        min: i64,
        /// The maximum value that is allowed.
        max: i64,
    },
    /// An invalid argument was passed to a function. Contains a message intended for the user.
    #[error("{0}")]
    InvalidArgument(String),
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The instrument reported a bad status. The message is displayed to the user as is.
    #[error("{0}")]
    InstrumentStatus(String),
    /// Instrument response could not be parsed because it was unexpected by the driver.
    #[error("Response from instrument could not be parsed. Response was: {0}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// Timeout occurred while waiting for a response from the instrument.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query.
    #[error(
        "Timeout occured while waiting for a response to query: {query}. Timeout was set to {timeout:?}."
    )]
    TimeoutQuery {
        /// The query that timed out.
        query: String,
        /// The timeout that was set.
        timeout: Duration,
    },
    /// The instrument closed the connection while more data was expected.
    #[error("Connection closed by the instrument while {expected} more bytes were expected.")]
    UnexpectedEof {
        /// Number of bytes that were still missing.
        expected: usize,
    },
}
