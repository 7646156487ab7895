//! Safety supervisor.
//!
//! The supervisor runs **every tick before the FSM** and produces a fault
//! bitmask from the latest [`SensorFrame`]. Any bit set while the stack is
//! running sends the controller to `Error` in the same tick.
//!
//! ## Fault lifecycle
//!
//! 1. A reading crosses a limit (or a channel keeps failing to read).
//! 2. The supervisor sets the corresponding bit.
//! 3. The controller transitions to `Error`; the error routine shuts h2
//!    and purge, and runs the fan while the stack is hot.
//! 4. Each tick the supervisor re-evaluates; bits clear once the reading
//!    is back in bounds.
//! 5. An operator reset is honoured only when no sensor fault remains.
//!
//! Actuator faults are different: nothing re-measures them, so they stay
//! latched until the reset that leaves `Error`.
//!
//! Under-voltage only means something while hydrogen is flowing, so it is
//! checked in `Startup` (after the grace period) and `On`.

use heapless::LinearMap;
use log::{error, info, warn};

use crate::config::SafetyLimits;
use crate::error::SafetyFault;
use crate::fsm::StateId;
use crate::sensors::{ChannelId, ChannelKind, SensorFrame};

const MAX_TRACKED: usize = 16;

/// Safety supervisor.
pub struct SafetySupervisor {
    limits: SafetyLimits,
    escalation_count: u8,
    /// Current fault bitmask.
    faults: u8,
    /// Consecutive failed reads per channel.
    streaks: LinearMap<ChannelId, u8, MAX_TRACKED>,
    last_sequence: Option<u64>,
}

impl SafetySupervisor {
    pub fn new(limits: SafetyLimits, escalation_count: u8) -> Self {
        Self {
            limits,
            escalation_count: escalation_count.max(1),
            faults: 0,
            streaks: LinearMap::new(),
            last_sequence: None,
        }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// Evaluate all safety conditions against `frame`.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, frame: &SensorFrame, state: StateId, secs_in_state: f64) -> u8 {
        let limits = self.limits;

        // ── Temperature ───────────────────────────────────────────
        let hot = frame
            .max_temperature()
            .is_some_and(|t| t > limits.temperature_cutoff_c);
        self.eval_fault(SafetyFault::OverTemperature, hot);

        // ── Voltage window ────────────────────────────────────────
        let voltages = || frame.voltage.iter().filter_map(|r| r.value());
        let check_under = match state {
            StateId::On => true,
            StateId::Startup => secs_in_state >= f64::from(limits.voltage_grace_secs),
            _ => false,
        };
        self.eval_fault(
            SafetyFault::UnderVoltage,
            check_under && voltages().any(|v| v < limits.voltage_min),
        );
        self.eval_fault(
            SafetyFault::OverVoltage,
            voltages().any(|v| v > limits.voltage_max),
        );

        // ── Current ───────────────────────────────────────────────
        let over_current = limits.current_max.is_some_and(|max| {
            frame
                .current
                .iter()
                .filter_map(|r| r.value())
                .any(|i| i > max)
        });
        self.eval_fault(SafetyFault::OverCurrent, over_current);

        // ── Read failures ─────────────────────────────────────────
        if self.last_sequence != Some(frame.sequence) {
            self.last_sequence = Some(frame.sequence);
            self.count_read_failures(frame);
        }
        let escalated = self.streaks.values().any(|&n| n >= self.escalation_count);
        self.eval_fault(SafetyFault::BusFault, escalated);

        self.faults
    }

    /// Latch an actuator fault; only [`clear_latched`](Self::clear_latched) removes it.
    pub fn latch_actuator_fault(&mut self) {
        self.eval_fault(SafetyFault::ActuatorFault, true);
    }

    pub fn clear_latched(&mut self) {
        self.eval_fault(SafetyFault::ActuatorFault, false);
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// True if any fault derived from sensor readings is active.
    pub fn has_sensor_faults(&self) -> bool {
        self.faults & !SafetyFault::ActuatorFault.mask() != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    /// Consecutive failed reads on `id` so far.
    pub fn streak(&self, id: ChannelId) -> u8 {
        self.streaks.get(&id).copied().unwrap_or(0)
    }

    // ── Internal ──────────────────────────────────────────────────

    fn count_read_failures(&mut self, frame: &SensorFrame) {
        for (id, reading) in frame.channels() {
            let next = if reading.is_fresh() {
                0
            } else {
                self.streak(id).saturating_add(1)
            };
            if next == self.escalation_count {
                warn!("{id} failed {next} consecutive reads");
            }
            if self.streaks.insert(id, next).is_err() {
                // Table full: only possible with more channels than the hub supports.
                warn!("untracked channel {id}");
            }
        }
    }

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}

/// Any temperature channel above `cutoff`.
pub fn over_temperature(frame: &SensorFrame, cutoff: f32) -> bool {
    frame
        .channels()
        .filter(|(id, _)| id.kind == ChannelKind::Temperature)
        .filter_map(|(_, r)| r.value())
        .any(|t| t > cutoff)
}
