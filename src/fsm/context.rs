//! Shared mutable context threaded through every FSM handler.
//!
//! `ControlContext` is the "blackboard" the state routines read from and
//! write to: the latest sensor frame, the three output switches, the
//! purge strategy, timing and the current fault mask.

use serde::Serialize;

use crate::bus::{BusTransaction, SharedBus};
use crate::config::{ControllerConfig, OutputConfig, SafetyLimits};
use crate::drivers::Actuator;
use crate::drivers::expander::IoExpander;
use crate::drivers::switch::Switch;
use crate::error::{ActuatorError, SafetyFault};
use crate::purge::{Purge, PurgeInput};
use crate::sensors::SensorFrame;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// The rig's three switched outputs.
#[derive(Debug)]
pub struct Outputs {
    pub h2: Switch,
    pub fan: Switch,
    pub purge: Switch,
}

/// Recorded output levels, for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputLevels {
    pub h2: bool,
    pub fan: bool,
    pub purge: bool,
}

impl Outputs {
    pub fn new(
        h2: Box<dyn Actuator + Send>,
        fan: Box<dyn Actuator + Send>,
        purge: Box<dyn Actuator + Send>,
        now: f64,
    ) -> Self {
        Self {
            h2: Switch::new("h2", h2, now),
            fan: Switch::new("fan", fan, now),
            purge: Switch::new("purge", purge, now),
        }
    }

    /// Initialise the rig's IO expander (all lines low) and bind the
    /// configured h2, fan and purge lines.
    pub fn on_expander<B>(bus: &SharedBus<B>, cfg: &OutputConfig, now: f64) -> crate::Result<Self>
    where
        B: BusTransaction + Send + 'static,
    {
        let mut expander = IoExpander::new(bus.clone(), cfg.expander_address);
        expander.init()?;
        let line = |(port, bit): (u8, u8)| -> crate::Result<Box<dyn Actuator + Send>> {
            Ok(Box::new(expander.line(port, bit)?))
        };
        Ok(Self::new(line(cfg.h2_line)?, line(cfg.fan_line)?, line(cfg.purge_line)?, now))
    }

    pub fn levels(&self) -> OutputLevels {
        OutputLevels {
            h2: self.h2.is_on(),
            fan: self.fan.is_on(),
            purge: self.purge.is_on(),
        }
    }

    pub fn any_on(&self) -> bool {
        self.h2.is_on() || self.fan.is_on() || self.purge.is_on()
    }

    /// Attempt every write; report the first failure.
    pub fn write_all(&mut self, h2: bool, fan: bool, purge: bool, now: f64) -> Result<(), ActuatorError> {
        first_failure([
            self.h2.write(h2, now).map(drop),
            self.fan.write(fan, now).map(drop),
            self.purge.write(purge, now).map(drop),
        ])
    }

    /// Push recorded levels to hardware (boot).
    pub fn assert_all(&mut self, now: f64) -> Result<(), ActuatorError> {
        first_failure([
            self.h2.assert_state(now),
            self.fan.assert_state(now),
            self.purge.assert_state(now),
        ])
    }
}

/// First error of a batch whose members have all been attempted.
pub(crate) fn first_failure<const N: usize>(
    results: [Result<(), ActuatorError>; N],
) -> Result<(), ActuatorError> {
    results.into_iter().collect()
}

// ---------------------------------------------------------------------------
// ControlContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct ControlContext {
    // -- Timing --
    /// Controller clock for this tick (s).
    pub now: f64,
    /// When the current state was entered (s).
    pub entered_at: f64,
    pub start_time: f64,
    pub stop_time: f64,

    // -- Sensor data --
    /// Latest frame. Replaced before each routine.
    pub frame: SensorFrame,

    // -- Actuators --
    pub outputs: Outputs,
    pub purge: Purge,
    /// Purge rising edges since construction.
    pub purge_count: u32,

    // -- Safety --
    pub limits: SafetyLimits,
    /// Fault bitmask from the safety supervisor (see `SafetyFault::mask()`).
    pub fault_flags: u8,

    last_purge_eval: Option<f64>,
}

impl ControlContext {
    pub fn new(config: &ControllerConfig, outputs: Outputs, now: f64) -> Self {
        Self {
            now,
            entered_at: now,
            start_time: f64::from(config.timing.start_time_secs),
            stop_time: f64::from(config.timing.stop_time_secs),
            frame: SensorFrame::default(),
            outputs,
            purge: Purge::from_config(&config.purge),
            purge_count: 0,
            limits: config.safety,
            fault_flags: 0,
            last_purge_eval: None,
        }
    }

    /// Context whose outputs drive nothing.
    #[cfg(test)]
    pub(crate) fn detached(config: &ControllerConfig, now: f64) -> Self {
        use crate::drivers::FnActuator;
        let idle = || -> Box<dyn Actuator + Send> { Box::new(FnActuator::new(|| Ok(()), || Ok(()))) };
        Self::new(config, Outputs::new(idle(), idle(), idle(), now), now)
    }

    /// Seconds elapsed since the current state was entered.
    pub fn secs_in_state(&self) -> f64 {
        self.now - self.entered_at
    }

    /// Returns `true` if **any** safety fault is active.
    pub fn has_faults(&self) -> bool {
        self.fault_flags != 0
    }

    /// Check whether a specific fault flag is set.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.fault_flags & fault.mask() != 0
    }

    /// Purge input for this tick; `dt` is measured from the previous call.
    pub fn purge_input(&mut self) -> PurgeInput {
        let dt = self.last_purge_eval.map_or(0.0, |last| (self.now - last).max(0.0));
        self.last_purge_eval = Some(self.now);
        PurgeInput {
            voltage: self.frame.primary_voltage().unwrap_or(0.0),
            current: self.frame.primary_current().unwrap_or(0.0),
            power: self.frame.total_power(),
            temperature: self.frame.max_temperature().unwrap_or(0.0),
            dt: dt as f32,
            now: self.now,
        }
    }

    /// Forget the purge evaluation clock (the next `dt` starts at zero).
    pub fn reset_purge_clock(&mut self) {
        self.last_purge_eval = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_runs_everything() {
        let r = first_failure([
            Ok(()),
            Err(ActuatorError::WriteFailed("a")),
            Err(ActuatorError::WriteFailed("b")),
        ]);
        assert_eq!(r, Err(ActuatorError::WriteFailed("a")));
        assert_eq!(first_failure([Ok(()), Ok(())]), Ok(()));
    }

    #[test]
    fn purge_input_measures_dt() {
        let mut ctx = ControlContext::detached(&ControllerConfig::default(), 0.0);
        ctx.now = 1.0;
        assert_eq!(ctx.purge_input().dt, 0.0);
        ctx.now = 1.25;
        assert_eq!(ctx.purge_input().dt, 0.25);
        ctx.reset_purge_clock();
        ctx.now = 5.0;
        assert_eq!(ctx.purge_input().dt, 0.0);
    }

    #[test]
    fn write_all_reports_levels() {
        let mut ctx = ControlContext::detached(&ControllerConfig::default(), 0.0);
        ctx.outputs.write_all(true, false, true, 1.0).unwrap();
        assert_eq!(
            ctx.outputs.levels(),
            OutputLevels {
                h2: true,
                fan: false,
                purge: true
            }
        );
    }
}
