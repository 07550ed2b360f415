//! Blocking TCP/IP interface, used for LXI oscilloscopes that accept SCPI on a raw socket.

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{Instrument, InstrumentError};

/// Build an [`Instrument`] interface around a [`std::net::TcpStream`].
#[derive(Debug)]
pub struct TcpIpInterface {}

impl TcpIpInterface {
    /// Connect to the given socket address with a default timeout of three seconds.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address, e.g., `"192.168.1.50:5555"`.
    pub fn simple<A: ToSocketAddrs>(sock_addr: A) -> Result<Instrument<TcpStream>, InstrumentError> {
        Self::timeout(sock_addr, Duration::from_secs(3))
    }

    /// Connect to the given socket address with a user defined timeout.
    ///
    /// The timeout is used to connect, as read and write timeout of the stream, and as timeout
    /// when waiting for a terminator. A blocking read must never hang forever on a bench.
    ///
    /// # Arguments
    /// * `sock_addr` - Socket address.
    /// * `timeout` - Timeout for connecting, reading, and writing.
    pub fn timeout<A: ToSocketAddrs>(
        sock_addr: A,
        timeout: Duration,
    ) -> Result<Instrument<TcpStream>, InstrumentError> {
        let mut last_err = None;
        for addr in sock_addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    log::debug!("Opened TCP connection to {addr}");
                    return Ok(Instrument::new(stream, timeout));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .map(InstrumentError::Io)
            .unwrap_or_else(|| {
                InstrumentError::InvalidArgument("Socket address did not resolve".to_string())
            }))
    }
}
