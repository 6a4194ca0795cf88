//! Local tick source.
//!
//! Ticks are 32-bit and wrap. Compare them with [`ticks_since`], never with
//! `<` or `-`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A read-only, monotonically advancing 32-bit tick counter.
pub trait Clock {
    /// Current tick count.
    fn now(&self) -> u32;
}

/// Milliseconds elapsed since the clock was created, truncated to 32 bits.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        // Truncation is the wraparound.
        self.origin.elapsed().as_millis() as u32
    }
}

/// A clock that only moves when told to. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ticks: Arc<AtomicU32>,
}

impl ManualClock {
    /// A clock reading `start`.
    pub fn new(start: u32) -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(start)),
        }
    }

    /// Move the clock forward by `ticks`, wrapping at `u32::MAX`.
    pub fn advance(&self, ticks: u32) {
        // fetch_add on atomics wraps on overflow.
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u32 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> u32 {
        (**self).now()
    }
}

/// Ticks elapsed from `earlier` to `now`, treating the counter as circular.
pub fn ticks_since(earlier: u32, now: u32) -> u32 {
    now.wrapping_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(10);
        let view = clock.clone();
        clock.advance(5);
        assert_eq!(view.now(), 15);
        view.set(1);
        assert_eq!(clock.now(), 1);
    }

    #[test]
    fn elapsed_across_wraparound() {
        let clock = ManualClock::new(u32::MAX - 2);
        let start = clock.now();
        clock.advance(10);
        assert_eq!(clock.now(), 7);
        assert_eq!(ticks_since(start, clock.now()), 10);
    }

    #[test]
    fn system_clock_does_not_go_backwards() {
        let clock = SystemClock::new();
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now();
        assert!(ticks_since(a, b) >= 1);
    }
}
