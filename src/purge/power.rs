//! Purge interval shortening linearly with stack power.
//!
//! More power means more product water and faster nitrogen crossover,
//! so the anode is vented more often: `interval = base - k * P`.

use super::{PurgeInput, PurgeStrategy};

pub struct PowerPurge {
    base: f32,
    secs_per_watt: f32,
}

impl PowerPurge {
    pub fn new(base: f32, secs_per_watt: f32) -> Self {
        Self {
            base,
            secs_per_watt,
        }
    }
}

impl PurgeStrategy for PowerPurge {
    fn name(&self) -> &'static str {
        "power"
    }

    fn frequency(&mut self, input: &PurgeInput) -> f32 {
        self.base - self.secs_per_watt * input.power.max(0.0)
    }
}
