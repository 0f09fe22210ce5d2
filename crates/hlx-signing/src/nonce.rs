//! Monotonic nonce generation.
//!
//! Nonces are millisecond timestamps, but the remote system rejects any
//! nonce at or below the last one it accepted for a key. Issuing
//! `max(last + 1, now)` keeps nonces strictly increasing even when
//! several actions are stamped inside one millisecond or the wall clock
//! steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Current Unix time in milliseconds.
#[must_use]
pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Time source, swappable for tests.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        timestamp_ms()
    }
}

/// Issues strictly increasing timestamp nonces.
///
/// Thread-safe; concurrent callers never observe a duplicate.
pub struct NonceManager<C: Clock = SystemClock> {
    /// Last issued nonce.
    counter: AtomicU64,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    /// Create a manager seeded with the clock's current time.
    #[must_use]
    pub fn new(clock: C) -> Self {
        let now = clock.now_ms();
        Self {
            counter: AtomicU64::new(now),
            clock,
        }
    }

    /// Next nonce: `max(last + 1, now)`, via CAS loop.
    pub fn next(&self) -> u64 {
        let now = self.clock.now_ms();

        loop {
            let current = self.counter.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(now);

            match self.counter.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }
}

impl NonceManager<SystemClock> {
    /// Create a manager backed by the wall clock.
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}
