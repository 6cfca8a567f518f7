//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the emulation engine from system
//! resources (clock and entropy). This enables:
//!
//! - Deterministic Simulation: the harness drives a manual clock and a seeded
//!   RNG, so an emulation run can be replayed exactly.
//!
//! - Production Runtime: the relay uses the real monotonic clock and OS
//!   entropy without any change to the engine.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use crate::time::Timestamp;

/// Abstract environment providing time and randomness.
///
/// The engine reads the clock once per public call and treats that instant as
/// the current time for the whole call. Randomness is only used to seed the
/// per-direction generators at construction, so the engine never draws from
/// the environment on the packet path.
pub trait Environment: Clone {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: This method MUST return values that never decrease
    ///   within one engine's lifetime.
    fn now(&self) -> Timestamp;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used to seed the per-direction generators.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
