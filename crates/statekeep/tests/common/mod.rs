//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use statekeep::{Attribute, AttributeList, Environment};

/// Clock that only moves when told to, with reproducible token bytes.
#[derive(Clone)]
pub struct TestEnv {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
    counter: Arc<AtomicU64>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
            counter: Arc::new(AtomicU64::new(0x5eed)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn fill_random(&self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let mut z = self
                .counter
                .fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^= z >> 31;
            chunk.copy_from_slice(&z.to_le_bytes()[..chunk.len()]);
        }
    }
}

/// Build an attribute list from `(number, value)` pairs.
pub fn attrs(pairs: &[(u32, &[u8])]) -> AttributeList {
    pairs
        .iter()
        .map(|(n, v)| Attribute::new(*n, v.to_vec()))
        .collect()
}

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("statekeep=trace"))
            .with_test_writer()
            .try_init();
    });
}
