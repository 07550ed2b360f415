//! A rust driver for relay modules running [Tasmota](https://tasmota.github.io/) firmware,
//! controlled through the serial console.
//!
//! Commands are sent as plain console lines, e.g., `Power1 ON`. The firmware answers with log
//! lines and JSON results whose shape differs between firmware revisions. The driver reads reply
//! lines until one of them is recognized by the [`PowerRules`] table or the reply ends.
//!
//! # Example
//!
//! ```no_run
//! use benchlink::SerialInterface;
//! use tasmota_relay::{BAUD_RATE, Tasmota};
//!
//! let interface = SerialInterface::simple("/dev/ttyUSB0", BAUD_RATE).unwrap();
//! let mut tasmota = Tasmota::try_new(interface).unwrap();
//!
//! let mut relay = tasmota.get_relay(0).unwrap();
//! relay.set_power(true).unwrap();
//! println!("Relay 1 is {}", relay.get_power_state().unwrap());
//! ```

#![warn(missing_docs)]

mod rules;
mod version;

pub use rules::{PowerRules, PowerState};
pub use version::FirmwareVersion;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use benchlink::{InstrumentError, InstrumentInterface};
use regex::Regex;

/// Baud rate of the Tasmota serial console.
pub const BAUD_RATE: u32 = 115_200;

/// Line ending Tasmota expects after a console command.
const COMMAND_END: &str = "\r\n";

/// Settings of the driver that are not stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TasmotaConfig {
    /// Maximum number of reply lines to read while looking for an answer.
    pub max_reply_lines: usize,
    /// Wait before reading back the state when a switch command got no recognized reply.
    pub verify_delay: Duration,
}

impl Default for TasmotaConfig {
    fn default() -> Self {
        Self {
            max_reply_lines: 8,
            verify_delay: Duration::from_millis(500),
        }
    }
}

/// A rust driver for a Tasmota relay module.
pub struct Tasmota<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    num_relays: usize,
    config: TasmotaConfig,
}

impl<T: InstrumentInterface> Tasmota<T> {
    /// Create a new Tasmota instance with the given instrument interface.
    ///
    /// The device is asked for its status (`Status 0`) to make sure a Tasmota console is
    /// listening. If no status is returned, an [`InstrumentError::InstrumentStatus`] error is
    /// returned.
    ///
    /// # Arguments
    /// - `interface`: An instrument interface that implements the `InstrumentInterface` trait.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        Self::with_config(interface, TasmotaConfig::default())
    }

    /// Create a new Tasmota instance with a user defined driver configuration.
    pub fn with_config(interface: T, config: TasmotaConfig) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        let mut tasmota = Tasmota {
            interface: Arc::new(Mutex::new(intf)),
            num_relays: 1,
            config,
        };
        tasmota.verify_console()?;
        Ok(tasmota)
    }

    /// Get a relay with a given index.
    ///
    /// Please note that relays are zero-indexed, i.e., index 0 is `Power1`.
    pub fn get_relay(&mut self, idx: usize) -> Result<Relay<T>, InstrumentError> {
        if idx >= self.num_relays {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx,
                nof_channels: self.num_relays,
            });
        }
        Ok(Relay::new(idx, Arc::clone(&self.interface), self.config))
    }

    /// Set the number of relays of the module. Tasmota supports up to 32.
    pub fn set_num_relays(&mut self, num: usize) -> Result<(), InstrumentError> {
        if !(1..=32).contains(&num) {
            let num: i64 = num.try_into().unwrap_or(i64::MAX);
            return Err(InstrumentError::IntValueOutOfRange {
                value: num,
                min: 1,
                max: 32,
            });
        }
        self.num_relays = num;
        Ok(())
    }

    /// Get the number of relays of the module.
    pub fn get_num_relays(&self) -> usize {
        self.num_relays
    }

    /// Query the firmware version (`Status 2`).
    pub fn get_firmware_version(&mut self) -> Result<FirmwareVersion, InstrumentError> {
        let version_re = Regex::new(r#""Version"\s*:\s*"([^"]+)""#)
            .expect("Version pattern should compile");
        let version = exchange(&self.interface, "Status 2", self.config.max_reply_lines, |line| {
            version_re
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })?
        .ok_or_else(|| InstrumentError::InstrumentStatus("No firmware version reported".into()))?;
        log::info!("Tasmota firmware version: {version}");
        version.parse()
    }

    /// Returns `true` if the firmware is the same as or newer than `minimum`, e.g., `"9.1.0"`.
    pub fn version_at_least(&mut self, minimum: &str) -> Result<bool, InstrumentError> {
        let minimum: FirmwareVersion = minimum.parse()?;
        Ok(self.get_firmware_version()?.at_least(&minimum))
    }

    fn verify_console(&mut self) -> Result<(), InstrumentError> {
        let answered = exchange(&self.interface, "Status 0", self.config.max_reply_lines, |line| {
            line.contains("\"Status\"").then_some(())
        })?;
        match answered {
            Some(()) => {
                log::info!("Tasmota console is answering");
                Ok(())
            }
            None => Err(InstrumentError::InstrumentStatus(
                "No status reply from Tasmota console".to_string(),
            )),
        }
    }
}

/// A single relay of a Tasmota module.
///
/// Relays can only be created through [`Tasmota::get_relay`].
pub struct Relay<T: InstrumentInterface> {
    idx: usize,
    interface: Arc<Mutex<T>>,
    config: TasmotaConfig,
    rules: PowerRules,
}

impl<T: InstrumentInterface> Relay<T> {
    fn new(idx: usize, interface: Arc<Mutex<T>>, config: TasmotaConfig) -> Self {
        Relay {
            idx,
            interface,
            config,
            rules: PowerRules::for_relay(idx + 1),
        }
    }

    /// One-indexed relay number as used in Tasmota commands.
    pub fn number(&self) -> usize {
        self.idx + 1
    }

    /// Get the power state of this relay.
    ///
    /// The state is looked up with `Status 11` first, then with a direct `Power<n>` query and
    /// finally with `Status 0`. If none of the replies is recognized, [`PowerState::Unknown`] is
    /// returned.
    pub fn get_power_state(&mut self) -> Result<PowerState, InstrumentError> {
        let n = self.number();
        for cmd in ["Status 11".to_string(), format!("Power{n}"), "Status 0".to_string()] {
            if let Some(state) = self.power_exchange(&cmd)? {
                log::info!("Relay {n} is {state} (from `{cmd}`)");
                return Ok(state);
            }
            log::debug!("No power state for relay {n} in reply to `{cmd}`");
        }
        log::warn!("Could not determine power state of relay {n}");
        Ok(PowerState::Unknown)
    }

    /// Switch this relay on or off.
    ///
    /// Nothing is sent if the relay is already in the requested state. If the reply to the switch
    /// command is not recognized, the state is read back after a short delay. An
    /// [`InstrumentError::InstrumentStatus`] error is returned if the relay cannot be confirmed in
    /// the requested state.
    pub fn set_power(&mut self, on: bool) -> Result<(), InstrumentError> {
        let n = self.number();
        let requested = PowerState::from(on);

        if self.get_power_state()? == requested {
            log::info!("Relay {n} is already {requested}");
            return Ok(());
        }

        let cmd = format!("Power{n} {}", requested.as_cmd_str());
        match self.power_exchange(&cmd)? {
            Some(state) if state == requested => {
                log::info!("Relay {n} switched {requested}");
                return Ok(());
            }
            Some(state) => log::warn!("Relay {n} reported {state} after `{cmd}`"),
            None => log::warn!("No recognized reply to `{cmd}`, reading back the state"),
        }

        if !self.config.verify_delay.is_zero() {
            std::thread::sleep(self.config.verify_delay);
        }
        let state = self.get_power_state()?;
        if state == requested {
            log::info!("Verified relay {n} is {requested}");
            Ok(())
        } else {
            Err(InstrumentError::InstrumentStatus(format!(
                "Relay {n} did not switch {requested}, state is {state}"
            )))
        }
    }

    fn power_exchange(&mut self, cmd: &str) -> Result<Option<PowerState>, InstrumentError> {
        let rules = &self.rules;
        exchange(&self.interface, cmd, self.config.max_reply_lines, |line| {
            rules.state_of(line)
        })
    }
}

/// Send a console command and read its reply lines until the console goes quiet.
///
/// The first line `parse` recognizes is the result. The lines after it are read and discarded as
/// well, so they cannot be mistaken for the reply to the next command. Reading stops when the
/// interface times out or after `max_lines` lines.
fn exchange<T, R, F>(
    interface: &Mutex<T>,
    cmd: &str,
    max_lines: usize,
    mut parse: F,
) -> Result<Option<R>, InstrumentError>
where
    T: InstrumentInterface,
    F: FnMut(&str) -> Option<R>,
{
    let mut intf = interface.lock().expect("Mutex should not be poisoned");
    log::debug!("Sending console command: {cmd}");
    intf.sendcmd(&format!("{cmd}{COMMAND_END}"))?;

    let mut result = None;
    for _ in 0..max_lines {
        let line = match intf.read_until_terminator() {
            Ok(line) => line,
            Err(InstrumentError::Timeout(_)) => break,
            Err(InstrumentError::Io(e)) if e.kind() == std::io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e),
        };
        if result.is_some() {
            log::trace!("Console (discarded): {line}");
        } else {
            log::trace!("Console: {line}");
            result = parse(&line);
        }
    }
    Ok(result)
}
