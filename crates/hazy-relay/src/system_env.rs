//! Production Environment implementation using system time and RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that uses the monotonic system clock and OS entropy.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use hazy_core::{Environment, Timestamp};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Production environment using system time and OS randomness.
///
/// This implementation:
/// - Measures time with `std::time::Instant`, in milliseconds since the
///   environment was created
/// - Uses `getrandom` for randomness, unless a seed was given, in which case
///   the engine's generators are seeded reproducibly
#[derive(Debug, Clone)]
pub struct SystemEnv {
    epoch: Instant,
    seeded: Option<Arc<Mutex<ChaCha8Rng>>>,
}

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self { epoch: Instant::now(), seeded: None }
    }

    /// System clock with reproducible randomness.
    ///
    /// Two relays started with the same seed make the same impairment
    /// decisions for the same traffic timing.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            epoch: Instant::now(),
            seeded: Some(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed)))),
        }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp::from_millis(millis)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Some(rng) = &self.seeded {
            rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
            return;
        }

        getrandom::fill(buffer).unwrap_or_else(|e| {
            // NOTE: This should never fail on supported platforms. Zeroed
            // seeds still produce a working, if predictable, emulation.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
