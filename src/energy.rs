//! Cumulative energy delivered by the stack.
//!
//! `energy += power · Δt` once per tick. Negative power (e.g. current
//! sensor offset at zero load) is treated as zero so the total never
//! decreases.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyLedger {
    /// Instantaneous power (W)
    pub power: f32,
    /// Cumulative energy (J)
    pub energy: f64,
}

impl EnergyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, power: f32, dt: f64) {
        let power = if power.is_finite() { power.max(0.0) } else { 0.0 };
        self.power = power;
        if dt > 0.0 {
            self.energy += f64::from(power) * dt;
        }
    }

    /// Cumulative energy in watt-hours.
    pub fn watt_hours(&self) -> f64 {
        self.energy / 3600.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
