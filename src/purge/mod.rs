//! Purge scheduling: how often, and for how long, to vent the anode.
//!
//! A strategy proposes a raw interval from the electrical state; [`Purge`]
//! clamps it into the configured bounds so every strategy honours
//! `min_frequency <= frequency <= max_frequency`.
//!
//! ```text
//!   SensorFrame ─► PurgeInput ─► Strategy::frequency ─► clamp ─► purge.timed(freq, dur)
//!                                         ▲                               │
//!                                         └────────── on_purge(now) ◄─────┘ (rising edge)
//! ```

pub mod fixed;
pub mod polarization;
pub mod power;
pub mod water;

use log::debug;
use serde::Serialize;

use crate::config::{PurgeConfig, PurgeStrategyConfig};

pub use fixed::FixedPurge;
pub use polarization::PolarizationPurge;
pub use power::PowerPurge;
pub use water::{WaterPurge, WaterTrigger};

/// Electrical state a strategy may base its interval on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeInput {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
    pub temperature: f32,
    /// Seconds since the previous evaluation.
    pub dt: f32,
    pub now: f64,
}

/// Current interval and duration, with their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PurgeParameters {
    pub frequency: f32,
    pub duration: f32,
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub min_duration: f32,
    pub max_duration: f32,
}

impl PurgeParameters {
    pub fn from_config(cfg: &PurgeConfig) -> Self {
        let mut params = Self {
            frequency: cfg.frequency_secs,
            duration: cfg.duration_secs,
            min_frequency: cfg.min_frequency_secs,
            max_frequency: cfg.max_frequency_secs,
            min_duration: cfg.min_duration_secs,
            max_duration: cfg.max_duration_secs,
        };
        params.frequency = params.clamp_frequency(params.frequency);
        params.duration = params.clamp_duration(params.duration);
        params
    }

    /// NaN collapses to the longest interval.
    pub fn clamp_frequency(&self, secs: f32) -> f32 {
        if secs.is_nan() {
            self.max_frequency
        } else {
            secs.clamp(self.min_frequency, self.max_frequency)
        }
    }

    pub fn clamp_duration(&self, secs: f32) -> f32 {
        if secs.is_nan() {
            self.min_duration
        } else {
            secs.clamp(self.min_duration, self.max_duration)
        }
    }
}

/// A purge-interval policy.
pub trait PurgeStrategy {
    fn name(&self) -> &'static str;

    /// Proposed interval between purges (s), before clamping.
    fn frequency(&mut self, input: &PurgeInput) -> f32;

    /// Called on every purge rising edge.
    fn on_purge(&mut self, _now: f64) {}
}

/// Closed set of strategies, selected by configuration.
pub enum Strategy {
    Fixed(FixedPurge),
    PowerBased(PowerPurge),
    PolarizationBased(PolarizationPurge),
    WaterAccumulation(WaterPurge),
}

impl Strategy {
    pub fn from_config(cfg: &PurgeConfig) -> Self {
        match cfg.strategy {
            PurgeStrategyConfig::Fixed => Self::Fixed(FixedPurge::new(cfg.frequency_secs)),
            PurgeStrategyConfig::PowerBased {
                base_secs,
                secs_per_watt,
            } => Self::PowerBased(PowerPurge::new(base_secs, secs_per_watt)),
            PurgeStrategyConfig::PolarizationBased {
                base_secs,
                kp,
                ki,
                kd,
                slope,
                intercept,
            } => Self::PolarizationBased(PolarizationPurge::new(
                base_secs, kp, ki, kd, slope, intercept,
            )),
            PurgeStrategyConfig::WaterAccumulation {
                cells,
                relative_humidity,
                loss_per_gram,
                threshold_volts,
                trigger,
            } => Self::WaterAccumulation(
                WaterPurge::new(cells, relative_humidity, loss_per_gram, threshold_volts)
                    .with_trigger(trigger),
            ),
        }
    }

    fn inner(&mut self) -> &mut dyn PurgeStrategy {
        match self {
            Self::Fixed(s) => s,
            Self::PowerBased(s) => s,
            Self::PolarizationBased(s) => s,
            Self::WaterAccumulation(s) => s,
        }
    }
}

impl PurgeStrategy for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Fixed(s) => s.name(),
            Self::PowerBased(s) => s.name(),
            Self::PolarizationBased(s) => s.name(),
            Self::WaterAccumulation(s) => s.name(),
        }
    }

    fn frequency(&mut self, input: &PurgeInput) -> f32 {
        self.inner().frequency(input)
    }

    fn on_purge(&mut self, now: f64) {
        self.inner().on_purge(now);
    }
}

/// The active strategy plus its bounded parameters.
pub struct Purge {
    strategy: Strategy,
    params: PurgeParameters,
}

impl Purge {
    pub fn from_config(cfg: &PurgeConfig) -> Self {
        Self {
            strategy: Strategy::from_config(cfg),
            params: PurgeParameters::from_config(cfg),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Re-evaluate the interval; the result is always within bounds.
    pub fn frequency(&mut self, input: &PurgeInput) -> f32 {
        let raw = self.strategy.frequency(input);
        let clamped = self.params.clamp_frequency(raw);
        if clamped != self.params.frequency {
            debug!("purge[{}] interval {:.2}s", self.strategy.name(), clamped);
        }
        self.params.frequency = clamped;
        clamped
    }

    pub fn duration(&self) -> f32 {
        self.params.duration
    }

    pub fn on_purge(&mut self, now: f64) {
        self.strategy.on_purge(now);
    }

    pub fn parameters(&self) -> PurgeParameters {
        self.params
    }
}
