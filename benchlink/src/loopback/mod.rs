//! Loopback interfaces that stand in for real instruments in driver tests.
//!
//! Both loopbacks are scripted with the traffic expected from the host and the traffic the
//! instrument answers with. Anything sent that was not scripted, or scripted traffic left over
//! when the loopback is dropped, makes the test panic.
//!
//! - [`LoopbackInterfaceString`] is for line based protocols with a terminator.
//! - [`LoopbackInterfaceBytes`] is for binary transfers. Every scripted packet from the instrument
//!   is handed out by [`crate::InstrumentInterface::read_chunk`] on its own, which makes it easy
//!   to split a payload over several partial reads.

mod loopback_interface_bytes;
mod loopback_interface_string;

pub use loopback_interface_bytes::*;
pub use loopback_interface_string::*;

/// Cursor into a scripted list that advances whenever `next` is called.
#[derive(Debug, Default)]
struct IncrIndex {
    index: usize,
}

impl IncrIndex {
    fn next(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        current
    }
}
