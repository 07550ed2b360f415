//! Connection handling for the oscilloscope.
//!
//! [`InstrumentLink`] owns the interface to the oscilloscope and turns every transport failure
//! into a sentinel: `send` returns `false` and `query` returns an empty string. The layers above
//! decide whether to retry or to give up.

use std::{fmt::Display, net::TcpStream, time::Duration};

use benchlink::{Instrument, InstrumentError, InstrumentInterface, TcpIpInterface};

use crate::{ScopeError, block};

/// Raw SCPI port of LXI instruments.
pub const LXI_RAW_PORT: u16 = 5555;

/// Tokens of which at least one must appear in the identification of a supported oscilloscope.
pub const IDN_TOKENS: [&str; 8] = ["RIGOL", "DS1", "DS2", "DS4", "DS6", "DS7", "MSO5", "MSO7"];

/// Returns `true` if the identification string belongs to a supported oscilloscope.
pub fn is_recognized_idn(idn: &str) -> bool {
    let idn = idn.to_uppercase();
    IDN_TOKENS.iter().any(|token| idn.contains(token))
}

/// Resource identifiers under which an oscilloscope can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Instrument resource, e.g., `TCPIP0::192.168.1.50::INSTR`. Uses the LXI raw port.
    Instr {
        /// Host name or IP address.
        host: String,
    },
    /// Socket resource with explicit port, e.g., `TCPIP0::192.168.1.50::5555::SOCKET`.
    Socket {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
    /// Plain `host:port` address.
    Raw {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
}

impl Resource {
    /// All resource variants for a host, in the order they should be tried.
    pub fn candidates(host: &str, port: u16) -> Vec<Resource> {
        vec![
            Resource::Instr {
                host: host.to_string(),
            },
            Resource::Socket {
                host: host.to_string(),
                port,
            },
            Resource::Raw {
                host: host.to_string(),
                port,
            },
        ]
    }

    /// Host and port to open a socket to.
    pub fn socket_addr(&self) -> (&str, u16) {
        match self {
            Resource::Instr { host } => (host, LXI_RAW_PORT),
            Resource::Socket { host, port } | Resource::Raw { host, port } => (host, *port),
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Instr { host } => write!(f, "TCPIP0::{host}::INSTR"),
            Resource::Socket { host, port } => write!(f, "TCPIP0::{host}::{port}::SOCKET"),
            Resource::Raw { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Opens an interface for a [`Resource`].
///
/// Any `FnMut(&Resource) -> Result<T, InstrumentError>` is a connector, which lets tests hand
/// out loopback interfaces.
pub trait Connector<T: InstrumentInterface> {
    /// Open an interface to the given resource.
    fn open(&mut self, resource: &Resource) -> Result<T, InstrumentError>;
}

impl<T, F> Connector<T> for F
where
    T: InstrumentInterface,
    F: FnMut(&Resource) -> Result<T, InstrumentError>,
{
    fn open(&mut self, resource: &Resource) -> Result<T, InstrumentError> {
        self(resource)
    }
}

/// Connector that opens TCP sockets.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    /// Timeout for connecting, reading and writing.
    pub timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

impl Connector<Instrument<TcpStream>> for TcpConnector {
    fn open(&mut self, resource: &Resource) -> Result<Instrument<TcpStream>, InstrumentError> {
        TcpIpInterface::timeout(resource.socket_addr(), self.timeout)
    }
}

/// Link to an oscilloscope that degrades failures to sentinels.
pub struct InstrumentLink<T: InstrumentInterface> {
    interface: Option<T>,
    idn: Option<String>,
}

impl<T: InstrumentInterface> Default for InstrumentLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentLink<Instrument<TcpStream>> {
    /// Connect to the oscilloscope at the given host over TCP/IP.
    ///
    /// All [`Resource::candidates`] are tried in order with a [`TcpConnector`].
    pub fn connect(&mut self, host: &str, port: u16) -> bool {
        self.connect_with(&mut TcpConnector::default(), &Resource::candidates(host, port))
    }
}

impl<T: InstrumentInterface> InstrumentLink<T> {
    /// Create a link that is not connected.
    pub fn new() -> Self {
        Self {
            interface: None,
            idn: None,
        }
    }

    /// Try the given resources in order until one answers `*IDN?` with a recognized oscilloscope.
    ///
    /// Returns `true` if connected. An existing connection is closed first. On failure the link
    /// stays disconnected.
    pub fn connect_with<C: Connector<T>>(&mut self, connector: &mut C, resources: &[Resource]) -> bool {
        self.disconnect();

        for resource in resources {
            log::debug!("Trying oscilloscope resource {resource}");
            let mut interface = match connector.open(resource) {
                Ok(interface) => interface,
                Err(e) => {
                    log::warn!("Could not open {resource}: {e}");
                    continue;
                }
            };
            match interface.query("*IDN?") {
                Ok(idn) if is_recognized_idn(&idn) => {
                    log::info!("Connected to oscilloscope at {resource}: {idn}");
                    self.interface = Some(interface);
                    self.idn = Some(idn);
                    return true;
                }
                Ok(idn) => log::warn!("Device at {resource} is not a supported oscilloscope: {idn}"),
                Err(e) => log::warn!("No identification from {resource}: {e}"),
            }
        }

        log::error!("Could not connect to an oscilloscope");
        false
    }

    /// Returns `true` if the link holds a verified connection.
    pub fn is_connected(&self) -> bool {
        self.interface.is_some()
    }

    /// Identification string that was verified when connecting.
    pub fn idn(&self) -> Option<&str> {
        self.idn.as_deref()
    }

    /// Send a command, appending the terminator if missing.
    ///
    /// Returns `false` if not connected or if sending failed.
    pub fn send(&mut self, cmd: &str) -> bool {
        let Some(interface) = self.interface.as_mut() else {
            log::error!("Cannot send `{cmd}`: oscilloscope not connected");
            return false;
        };
        match interface.sendcmd(cmd) {
            Ok(()) => {
                log::debug!("Sent: {cmd}");
                true
            }
            Err(e) => {
                log::error!("Sending `{cmd}` failed: {e}");
                false
            }
        }
    }

    /// Send a query and return the response.
    ///
    /// Returns an empty string if not connected, if the instrument did not answer in time, or if
    /// the transport failed.
    pub fn query(&mut self, cmd: &str) -> String {
        let Some(interface) = self.interface.as_mut() else {
            log::error!("Cannot query `{cmd}`: oscilloscope not connected");
            return String::new();
        };
        match interface.query(cmd) {
            Ok(response) => {
                log::debug!("Query `{cmd}` returned: {response}");
                response
            }
            Err(e) => {
                log::warn!("Query `{cmd}` failed: {e}");
                String::new()
            }
        }
    }

    /// Read a definite length binary block, see [`crate::block`].
    pub fn read_block(&mut self) -> Result<Vec<u8>, ScopeError> {
        let interface = self.interface.as_mut().ok_or(ScopeError::NotConnected)?;
        block::read_block(interface).map_err(|e| {
            log::error!("Reading binary block failed: {e}");
            ScopeError::from(e)
        })
    }

    /// Close the connection. Does nothing if already disconnected.
    pub fn disconnect(&mut self) {
        if self.interface.take().is_some() {
            log::info!("Disconnected from oscilloscope");
        }
        self.idn = None;
    }
}

impl<T: InstrumentInterface> Drop for InstrumentLink<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
