//! The relay as seen by the capture: something that can be switched and asked for its state.

use benchlink::{InstrumentError, InstrumentInterface};
use tasmota_relay::{PowerState, Tasmota, TasmotaConfig};

/// A relay module that switches the stimulus of a capture.
///
/// Like the oscilloscope link, an actuator does not return errors. Failures are logged and
/// reported as `false` or [`PowerState::Unknown`], the caller decides what they mean.
pub trait RelayActuator {
    /// Connect to the relay module. Returns `true` on success.
    fn connect(&mut self) -> bool;

    /// Returns `true` if the relay module is connected.
    fn is_connected(&self) -> bool;

    /// Switch a one-indexed relay. Returns `true` if the relay is confirmed in the new state.
    fn set_power(&mut self, on: bool, relay_number: usize) -> bool;

    /// Get the state of a one-indexed relay.
    fn get_power_state(&mut self, relay_number: usize) -> PowerState;

    /// Disconnect from the relay module. Safe to call more than once.
    fn disconnect(&mut self);
}

/// [`RelayActuator`] for a Tasmota relay module.
///
/// The interface is opened by a connector closure on every [`RelayActuator::connect`], e.g.,
/// `|| SerialInterface::simple("/dev/ttyUSB0", BAUD_RATE)`.
pub struct TasmotaActuator<T, C>
where
    T: InstrumentInterface,
    C: FnMut() -> Result<T, InstrumentError>,
{
    connector: C,
    config: TasmotaConfig,
    num_relays: usize,
    tasmota: Option<Tasmota<T>>,
}

impl<T, C> TasmotaActuator<T, C>
where
    T: InstrumentInterface,
    C: FnMut() -> Result<T, InstrumentError>,
{
    /// Create a disconnected actuator for a module with a single relay.
    pub fn new(connector: C) -> Self {
        TasmotaActuator {
            connector,
            config: TasmotaConfig::default(),
            num_relays: 1,
            tasmota: None,
        }
    }

    /// Use a driver configuration other than the default.
    pub fn with_config(mut self, config: TasmotaConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of relays of the module.
    pub fn with_num_relays(mut self, num_relays: usize) -> Self {
        self.num_relays = num_relays;
        self
    }

    /// Access the driver while connected.
    pub fn tasmota_mut(&mut self) -> Option<&mut Tasmota<T>> {
        self.tasmota.as_mut()
    }

    fn open(&mut self) -> Result<Tasmota<T>, InstrumentError> {
        let interface = (self.connector)()?;
        let mut tasmota = Tasmota::with_config(interface, self.config)?;
        tasmota.set_num_relays(self.num_relays)?;
        Ok(tasmota)
    }

    fn relay_idx(relay_number: usize) -> Result<usize, InstrumentError> {
        relay_number
            .checked_sub(1)
            .ok_or_else(|| InstrumentError::InvalidArgument("relay numbers start at 1".into()))
    }

    fn try_set_power(&mut self, on: bool, relay_number: usize) -> Result<(), InstrumentError> {
        let idx = Self::relay_idx(relay_number)?;
        let tasmota = self
            .tasmota
            .as_mut()
            .ok_or_else(|| InstrumentError::InstrumentStatus("relay module not connected".into()))?;
        tasmota.get_relay(idx)?.set_power(on)
    }

    fn try_get_power_state(&mut self, relay_number: usize) -> Result<PowerState, InstrumentError> {
        let idx = Self::relay_idx(relay_number)?;
        let tasmota = self
            .tasmota
            .as_mut()
            .ok_or_else(|| InstrumentError::InstrumentStatus("relay module not connected".into()))?;
        tasmota.get_relay(idx)?.get_power_state()
    }
}

impl<T, C> RelayActuator for TasmotaActuator<T, C>
where
    T: InstrumentInterface,
    C: FnMut() -> Result<T, InstrumentError>,
{
    fn connect(&mut self) -> bool {
        self.disconnect();
        match self.open() {
            Ok(tasmota) => {
                log::info!("Connected to Tasmota relay module");
                self.tasmota = Some(tasmota);
                true
            }
            Err(e) => {
                log::error!("Could not connect to Tasmota relay module: {e}");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.tasmota.is_some()
    }

    fn set_power(&mut self, on: bool, relay_number: usize) -> bool {
        match self.try_set_power(on, relay_number) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Could not switch relay {relay_number}: {e}");
                false
            }
        }
    }

    fn get_power_state(&mut self, relay_number: usize) -> PowerState {
        self.try_get_power_state(relay_number)
            .unwrap_or_else(|e| {
                log::error!("Could not read state of relay {relay_number}: {e}");
                PowerState::Unknown
            })
    }

    fn disconnect(&mut self) {
        if self.tasmota.take().is_some() {
            log::info!("Disconnected from Tasmota relay module");
        }
    }
}
