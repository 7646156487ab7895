//! Purge interval from distance to the healthy polarization curve.
//!
//! A clean stack sits on `V = slope * I + intercept`. Running above the
//! curve lengthens the interval; sagging below it (flooding, nitrogen
//! build-up) shortens it. The error feeds a PID whose bias is the base
//! interval; the integral is held within ±10 % of the current error.

use super::{PurgeInput, PurgeStrategy};
use crate::control::pid::PidController;

pub struct PolarizationPurge {
    pid: PidController,
    slope: f32,
    intercept: f32,
}

impl PolarizationPurge {
    pub fn new(base: f32, kp: f32, ki: f32, kd: f32, slope: f32, intercept: f32) -> Self {
        Self {
            pid: PidController::new(kp, ki, kd, base).with_integral_band(0.9, 1.1),
            slope,
            intercept,
        }
    }

    /// Expected healthy voltage at `current`.
    pub fn target(&self, current: f32) -> f32 {
        self.slope * current + self.intercept
    }
}

impl PurgeStrategy for PolarizationPurge {
    fn name(&self) -> &'static str {
        "polarization"
    }

    fn frequency(&mut self, input: &PurgeInput) -> f32 {
        let error = input.voltage - self.target(input.current);
        self.pid.update(error, input.dt)
    }
}
