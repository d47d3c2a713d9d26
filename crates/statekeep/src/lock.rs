//! Single-threaded lock for builds that never share the cache.
//!
//! [`LocalRawMutex`] plugs into the same `lock_api` interface as
//! `parking_lot::RawMutex`, so [`crate::LocalStateCache`] runs exactly the same
//! code path as the threaded cache. It holds a `Cell`, which makes it `!Sync`:
//! a cache built on it cannot be shared across threads, and locking reduces to
//! flipping a flag.

use std::cell::Cell;

use parking_lot::lock_api::{GuardSend, RawMutex};

/// A lock that only records whether it is held.
#[derive(Debug)]
pub struct LocalRawMutex {
    locked: Cell<bool>,
}

// SAFETY: `LocalRawMutex` is `!Sync`, so every lock and unlock happens on the
// thread that owns the mutex. Exclusion within that thread is the `locked`
// flag, and `lock()` never returns without setting it.
unsafe impl RawMutex for LocalRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: Cell::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        // No cache operation calls back out while holding the lock, so a
        // second acquisition here is a bug, not contention. Release builds
        // deadlock on it, the way a re-entered parking_lot mutex does.
        debug_assert!(!self.locked.get(), "LocalRawMutex acquired re-entrantly");
        while !self.try_lock() {
            std::hint::spin_loop();
        }
    }

    fn try_lock(&self) -> bool {
        if self.locked.get() {
            return false;
        }
        self.locked.set(true);
        true
    }

    unsafe fn unlock(&self) {
        self.locked.set(false);
    }

    fn is_locked(&self) -> bool {
        self.locked.get()
    }
}
