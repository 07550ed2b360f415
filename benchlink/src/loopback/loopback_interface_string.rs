//! Loopback interface for instruments that talk in terminated lines of text.

use std::{collections::VecDeque, time::Duration};

use crate::{InstrumentError, InstrumentInterface, loopback::IncrIndex};

/// Scripted loopback for line based drivers.
///
/// # Example
///
/// A tiny driver that asks an oscilloscope for its identification, tested without hardware:
///
/// ```
/// use benchlink::{InstrumentError, InstrumentInterface, LoopbackInterfaceString};
///
/// struct Scope<T: InstrumentInterface> {
///     interface: T,
/// }
///
/// impl<T: InstrumentInterface> Scope<T> {
///     fn idn(&mut self) -> Result<String, InstrumentError> {
///         self.interface.query("*IDN?")
///     }
/// }
///
/// let host2inst = vec!["*IDN?".to_string()];
/// let inst2host = vec!["RIGOL TECHNOLOGIES,DS1054Z,DS1ZA000000001,00.04.04".to_string()];
/// let loopback = LoopbackInterfaceString::new(host2inst, inst2host, "\n");
///
/// let mut scope = Scope { interface: loopback };
/// assert!(scope.idn().unwrap().starts_with("RIGOL"));
/// ```
///
/// Every scripted line gets the expected terminator appended. Sending a line that does not match
/// the next scripted one panics, and so does dropping the loopback with unused lines left.
///
/// A scripted [`LoopbackInterfaceString::SILENCE`] entry stands for an instrument that has nothing
/// more to say: the read that reaches it fails with [`InstrumentError::Timeout`].
pub struct LoopbackInterfaceString {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    terminator_exp: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
}

impl LoopbackInterfaceString {
    /// Scripted reply that makes the next read time out instead of returning a line.
    pub const SILENCE: &'static str = "\u{0}silence\u{0}";

    /// Create a new loopback interface.
    ///
    /// # Arguments:
    /// * `from_host` - Lines expected from the host, in order.
    /// * `from_inst` - Lines the instrument answers with, in order.
    /// * `terminator_exp` - Terminator appended to every scripted line.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackInterfaceString {
            from_host,
            from_inst,
            terminator_exp: terminator_exp.to_string(),
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
        }
    }

    /// Panic if not all scripted lines have been used.
    ///
    /// Called automatically on drop.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.next());
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.next());
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected commands found from host to instrument: {fil}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected commands found from instrument to host: {fil}");
        }
    }

    fn get_next_from_host_with_terminator(&mut self) -> String {
        let cmd = self
            .from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.");
        format!("{cmd}{}", self.terminator_exp)
    }

    fn get_next_from_inst_with_terminator(&mut self) -> Option<String> {
        let cmd = self
            .from_inst
            .get(self.from_inst_index.next())
            .expect("No more commands were expected from instrument to host.");
        (cmd != Self::SILENCE).then(|| format!("{cmd}{}", self.terminator_exp))
    }

    fn read_one_byte(&mut self) -> Result<u8, InstrumentError> {
        match self.curr_bytes.pop_front() {
            Some(byte) => Ok(byte),
            None => {
                let next_cmd = self
                    .get_next_from_inst_with_terminator()
                    .ok_or(InstrumentError::Timeout(Duration::ZERO))?;
                self.curr_bytes = next_cmd.as_bytes().iter().copied().collect();
                self.read_one_byte()
            }
        }
    }
}

impl InstrumentInterface for LoopbackInterfaceString {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte()?;
        }
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.get_next_from_host_with_terminator();
        assert_eq!(
            exp.as_bytes(),
            cmd,
            "Expected sendcmd '{0}', got '{1:?}'",
            exp,
            std::str::from_utf8(cmd)
        );
        Ok(())
    }
}

impl Drop for LoopbackInterfaceString {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
