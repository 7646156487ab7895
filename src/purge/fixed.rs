//! Constant purge interval.

use super::{PurgeInput, PurgeStrategy};

pub struct FixedPurge {
    interval: f32,
}

impl FixedPurge {
    pub fn new(interval: f32) -> Self {
        Self { interval }
    }
}

impl PurgeStrategy for FixedPurge {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn frequency(&mut self, _input: &PurgeInput) -> f32 {
        self.interval
    }
}
