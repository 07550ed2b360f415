//! Simulated hardware faults.
//!
//! The relay response test asks a [`FaultInjector`] at a few well defined points whether it
//! should behave as if the hardware failed there. On a real bench, [`NoFaults`] is used.
//! [`RandomFaults`] makes a bench (or a loopback) misbehave at random to exercise the error
//! paths.

use std::fmt::Display;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Points at which a fault can be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// The oscilloscope seems to be missing.
    ScopeConnection,
    /// The relay module cannot be connected.
    RelayConnection,
    /// The relay module rejects a switch command.
    RelayActuation,
    /// The relay accepts the command but its contacts do not move.
    MechanicalFailure,
    /// The oscilloscope measurements are unusable.
    Measurement,
}

impl Display for FaultPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FaultPoint::ScopeConnection => "oscilloscope connection",
            FaultPoint::RelayConnection => "relay connection",
            FaultPoint::RelayActuation => "relay actuation",
            FaultPoint::MechanicalFailure => "mechanical relay failure",
            FaultPoint::Measurement => "measurement",
        };
        write!(f, "{name}")
    }
}

/// Decides whether a fault is simulated at a given point.
pub trait FaultInjector {
    /// Returns `true` if the caller should act as if the hardware failed at `point`.
    fn should_fail(&mut self, point: FaultPoint) -> bool;
}

/// Never simulates a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&mut self, _point: FaultPoint) -> bool {
        false
    }
}

/// Simulates a fault at every point with a fixed probability.
#[derive(Debug, Clone)]
pub struct RandomFaults<R: Rng = StdRng> {
    chance: f64,
    rng: R,
}

impl RandomFaults<StdRng> {
    /// Create an injector seeded from the operating system.
    ///
    /// `chance` is clamped to `[0, 1]`. A `NaN` chance never fails.
    pub fn new(chance: f64) -> Self {
        Self::with_rng(chance, StdRng::from_entropy())
    }

    /// Create an injector with a reproducible sequence of faults.
    pub fn seeded(chance: f64, seed: u64) -> Self {
        Self::with_rng(chance, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomFaults<R> {
    /// Create an injector drawing from the given random number generator.
    pub fn with_rng(chance: f64, rng: R) -> Self {
        let chance = if chance.is_nan() {
            0.0
        } else {
            chance.clamp(0.0, 1.0)
        };
        RandomFaults { chance, rng }
    }

    /// The probability of a fault at each point.
    pub fn chance(&self) -> f64 {
        self.chance
    }
}

impl<R: Rng> FaultInjector for RandomFaults<R> {
    fn should_fail(&mut self, point: FaultPoint) -> bool {
        let fail = self.rng.gen_bool(self.chance);
        if fail {
            log::warn!("Simulating {point} fault");
        }
        fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults() {
        assert!(!NoFaults.should_fail(FaultPoint::Measurement));
    }

    #[test]
    fn test_random_faults_extremes() {
        let mut always = RandomFaults::seeded(1.0, 7);
        let mut never = RandomFaults::seeded(0.0, 7);
        for _ in 0..100 {
            assert!(always.should_fail(FaultPoint::RelayActuation));
            assert!(!never.should_fail(FaultPoint::RelayActuation));
        }
    }

    #[test]
    fn test_random_faults_clamped() {
        assert_eq!(RandomFaults::seeded(2.5, 0).chance(), 1.0);
        assert_eq!(RandomFaults::seeded(-1.0, 0).chance(), 0.0);
        assert_eq!(RandomFaults::seeded(f64::NAN, 0).chance(), 0.0);
    }

    #[test]
    fn test_random_faults_reproducible() {
        let mut a = RandomFaults::seeded(0.5, 42);
        let mut b = RandomFaults::seeded(0.5, 42);
        for _ in 0..50 {
            assert_eq!(
                a.should_fail(FaultPoint::Measurement),
                b.should_fail(FaultPoint::Measurement)
            );
        }
    }
}
