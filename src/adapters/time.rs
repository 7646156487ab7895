//! Host clock adapter.
//!
//! Seconds since construction from `std::time::Instant`; monotonic, so
//! a wall-clock step never shortens a ramp or a purge.

use std::thread;
use std::time::{Duration, Instant};

use crate::app::ports::Clock;

pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Microseconds since construction.
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, secs: f64) {
        if secs > 0.0 && secs.is_finite() {
            thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        clock.sleep(0.002);
        assert!(clock.now() - a >= 0.002);
        clock.sleep(-1.0);
        clock.sleep(f64::NAN);
    }
}
