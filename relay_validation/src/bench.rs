//! The instruments of a test bench, owned for the duration of a test.

use benchlink::InstrumentInterface;
use rigol_ds1000z::ScopeController;

use crate::actuator::RelayActuator;

/// Oscilloscope and relay module of a test bench.
///
/// Both devices are disconnected when the bench is dropped, whichever way the test ended.
pub struct Bench<S: InstrumentInterface, R: RelayActuator> {
    scope: ScopeController<S>,
    relay: R,
}

impl<S: InstrumentInterface, R: RelayActuator> Bench<S, R> {
    /// Take ownership of an oscilloscope and a relay module.
    pub fn new(scope: ScopeController<S>, relay: R) -> Self {
        Bench { scope, relay }
    }

    /// The oscilloscope.
    pub fn scope_mut(&mut self) -> &mut ScopeController<S> {
        &mut self.scope
    }

    /// The relay module.
    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }

    /// Both devices at once.
    pub fn parts_mut(&mut self) -> (&mut ScopeController<S>, &mut R) {
        (&mut self.scope, &mut self.relay)
    }
}

impl<S: InstrumentInterface, R: RelayActuator> Drop for Bench<S, R> {
    fn drop(&mut self) {
        log::debug!("Releasing bench instruments");
        self.relay.disconnect();
        self.scope.disconnect();
    }
}
