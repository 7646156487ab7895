//! Debounced on/off switch with a duty-cycle timer.
//!
//! The switch remembers the level it last wrote and when. `write` only
//! touches hardware on a change; `timed` turns the output into a square
//! wave: off for `interval` seconds, then on for `duration` seconds.
//!
//! ```text
//!   timed(10, 2):   ____________|‾‾|__________|‾‾|____
//!                   0          10  12        22  24
//! ```

use log::{debug, warn};

use super::Actuator;
use crate::error::ActuatorError;

pub struct Switch {
    name: &'static str,
    actuator: Box<dyn Actuator + Send>,
    on: bool,
    last_change: f64,
}

impl Switch {
    /// The switch starts recorded as off with its timer referenced to `now`.
    /// Hardware is not touched until [`assert_state`](Self::assert_state) or a write.
    pub fn new(name: &'static str, actuator: Box<dyn Actuator + Send>, now: f64) -> Self {
        Self {
            name,
            actuator,
            on: false,
            last_change: now,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn last_change(&self) -> f64 {
        self.last_change
    }

    /// Drive the output to `on`. Writing the level already held is a no-op.
    ///
    /// On failure the recorded level and timestamp stay as they were.
    pub fn write(&mut self, on: bool, now: f64) -> Result<bool, ActuatorError> {
        if on == self.on {
            return Ok(self.on);
        }
        if let Err(e) = self.actuator.set(on) {
            warn!("{} switch write failed: {e}", self.name);
            return Err(e);
        }
        debug!("{} -> {}", self.name, if on { "on" } else { "off" });
        self.on = on;
        self.last_change = now;
        Ok(self.on)
    }

    /// One step of the duty cycle: off for `interval` s, on for `duration` s.
    pub fn timed(&mut self, interval: f64, duration: f64, now: f64) -> Result<bool, ActuatorError> {
        let elapsed = now - self.last_change;
        if self.on && elapsed >= duration {
            self.write(false, now)
        } else if !self.on && elapsed >= interval {
            self.write(true, now)
        } else {
            Ok(self.on)
        }
    }

    /// Re-arm the timer reference without touching the output.
    pub fn restart(&mut self, now: f64) {
        self.last_change = now;
    }

    /// Push the recorded level to hardware regardless of debounce.
    pub fn assert_state(&mut self, now: f64) -> Result<(), ActuatorError> {
        self.actuator.set(self.on)?;
        self.last_change = now;
        Ok(())
    }
}

impl core::fmt::Debug for Switch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Switch")
            .field("name", &self.name)
            .field("on", &self.on)
            .field("last_change", &self.last_change)
            .finish_non_exhaustive()
    }
}
