// Copyright (c) 2024 Mike Tsao

use core::sync::atomic::{AtomicU64, Ordering};
use std::{sync::Arc, time::Instant};

/// A nanosecond clock that only moves forward and isn't affected by changes
/// to the wall clock.
pub trait MonotonicClock: Send + Sync + core::fmt::Debug {
    /// Nanoseconds since an arbitrary, fixed origin.
    fn now_ns(&self) -> u64;
}

/// The real clock, measured from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}
impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}
impl MonotonicClock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// A clock that moves only when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);
impl MonotonicClock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
impl ManualClock {
    #[allow(missing_docs)]
    pub fn new_with(now_ns: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now_ns)))
    }

    /// Moves the clock forward.
    pub fn advance(&self, ns: u64) {
        self.0.fetch_add(ns, Ordering::AcqRel);
    }

    /// Moves the clock to the given time. Requests to go backward are
    /// ignored.
    pub fn set(&self, now_ns: u64) {
        self.0.fetch_max(now_ns, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_le;

    #[test]
    fn manual_clock_never_goes_backward() {
        let clock = ManualClock::new_with(100);
        let shared = clock.clone();
        clock.advance(50);
        assert_eq!(shared.now_ns(), 150);
        shared.set(120);
        assert_eq!(clock.now_ns(), 150);
        shared.set(1_000);
        assert_eq!(clock.now_ns(), 1_000);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::default();
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert_le!(a, b);
    }
}
