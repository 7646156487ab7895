//! Converter volts → physical units.
//!
//! The stack's current shunt amplifier and voltage divider were fitted
//! on the bench; both fits are linear with an optional rectifier
//! because the shunt polarity depends on wiring.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTransfer {
    pub multiplier: f32,
    pub offset: f32,
    pub divisor: f32,
    /// Take the magnitude of `volts * multiplier` before the offset.
    pub rectify: bool,
}

impl LinearTransfer {
    pub const IDENTITY: Self = Self {
        multiplier: 1.0,
        offset: 0.0,
        divisor: 1.0,
        rectify: false,
    };

    /// Bench fit for the H-100 stack current sense (A).
    pub const fn stack_current() -> Self {
        Self {
            multiplier: 1000.0 / 4.288_279_948_5,
            offset: 0.6009,
            divisor: 1.6046,
            rectify: true,
        }
    }

    /// Bench fit for the H-100 stack voltage divider (V).
    pub const fn stack_voltage() -> Self {
        Self {
            multiplier: 1000.0 / 60.955_967_156_3,
            offset: 0.0,
            divisor: 1.0,
            rectify: true,
        }
    }

    pub fn apply(&self, volts: f32) -> f32 {
        let scaled = volts * self.multiplier;
        let scaled = if self.rectify { scaled.abs() } else { scaled };
        (scaled + self.offset) / self.divisor
    }

    /// Converter volts that produce `value`. A rectified fit yields the
    /// positive branch.
    pub fn invert(&self, value: f32) -> f32 {
        (value * self.divisor - self.offset) / self.multiplier
    }
}

impl Default for LinearTransfer {
    fn default() -> Self {
        Self::IDENTITY
    }
}
