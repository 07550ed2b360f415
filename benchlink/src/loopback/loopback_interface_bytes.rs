//! Loopback interface for binary traffic, e.g., definite length blocks of sample memory.

use std::collections::VecDeque;

use crate::{InstrumentError, InstrumentInterface, loopback::IncrIndex};

/// Scripted loopback for drivers that exchange raw bytes.
///
/// Bytes written by the host must match the next scripted packet exactly; there is no
/// terminator handling. Packets from the instrument are handed out in order. A call to
/// [`InstrumentInterface::read_chunk`] never crosses a packet boundary, so a driver reading a
/// payload that was scripted as three packets needs three partial reads.
///
/// When dropped, the interface panics if any scripted packet was not used.
pub struct LoopbackInterfaceBytes {
    from_host: Vec<Vec<u8>>,
    from_inst: Vec<Vec<u8>>,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
}

impl LoopbackInterfaceBytes {
    /// Create a new loopback interface.
    ///
    /// # Arguments:
    /// * `from_host` - Packets expected from the host, in order.
    /// * `from_inst` - Packets the instrument answers with, in order.
    pub fn new(from_host: Vec<Vec<u8>>, from_inst: Vec<Vec<u8>>) -> Self {
        LoopbackInterfaceBytes {
            from_host,
            from_inst,
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(),
        }
    }

    /// Panic if not all scripted packets have been used.
    ///
    /// Called automatically on drop.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.next());
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.next());
        let partial_leftover = !self.curr_bytes.is_empty();
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected bytes found from host to instrument: {fil:?}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected bytes found from instrument to host: {fil:?}");
        }
        if partial_leftover {
            panic!(
                "Leftover partially read packet from instrument to host: {:?}",
                self.curr_bytes
            );
        }
    }

    fn get_next_from_host(&mut self) -> &Vec<u8> {
        self.from_host
            .get(self.from_host_index.next())
            .expect("No more bytes were expected from host to instrument.")
    }

    fn load_next_from_inst(&mut self) {
        let next = self
            .from_inst
            .get(self.from_inst_index.next())
            .expect("No more bytes were expected from instrument to host.");
        self.curr_bytes = next.iter().copied().collect();
    }

    fn read_one_byte(&mut self) -> u8 {
        match self.curr_bytes.pop_front() {
            Some(byte) => byte,
            None => {
                self.load_next_from_inst();
                self.read_one_byte()
            }
        }
    }
}

impl InstrumentInterface for LoopbackInterfaceBytes {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
        }
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, InstrumentError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.curr_bytes.is_empty() {
            self.load_next_from_inst();
        }
        let n = buf.len().min(self.curr_bytes.len());
        for (dst, src) in buf.iter_mut().zip(self.curr_bytes.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.get_next_from_host().as_slice();
        assert_eq!(
            exp,
            cmd,
            "Expected bytes '{0:?}', got '{1:?}'",
            String::from_utf8_lossy(exp),
            String::from_utf8_lossy(cmd)
        );
        Ok(())
    }
}

impl Drop for LoopbackInterfaceBytes {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
