//! Environment abstraction for time and randomness.
//!
//! The cache never calls `Instant::now()` or touches an RNG directly. All of
//! that goes through an [`Environment`], so tests can drive expiry with a
//! manual clock and get reproducible tokens.
//!
//! # Invariants
//!
//! - Monotonicity: `now()` must never go backwards
//! - `fill_random()` must be cryptographically adequate in production

use std::time::Instant;

use rand::RngCore;

/// Source of the current time and of random octets.
pub trait Environment: Send + Sync + 'static {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Fill `buf` with random octets.
    fn fill_random(&self, buf: &mut [u8]);
}

/// The production environment: system monotonic clock and the thread-local
/// CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn fill_random(&self, buf: &mut [u8]) {
        rand::rng().fill_bytes(buf);
    }
}
