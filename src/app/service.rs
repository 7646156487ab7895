//! Application service: the controller core.
//!
//! [`Controller`] owns the FSM, safety supervisor, energy ledger and the
//! shared context. All I/O flows through port traits injected at call
//! sites, so the whole controller runs against simulated hardware in
//! tests.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          Controller          │
//! CommandFlags ──▶│  Safety · FSM · Purge · Wh   │──▶ Outputs (h2, fan, purge)
//!                 └──────────────────────────────┘
//! ```
//!
//! One tick:
//!
//! 1. acquire a frame;
//! 2. evaluate safety: a breach while running sets a pending `Error`
//!    (a total sensor loss during `Startup` aborts to `Off` instead);
//! 3. take the command flags and honour at most one, unless a safety
//!    transition is already pending; otherwise the state's timed edge;
//! 4. run the routine of the current (pre-transition) state;
//! 5. apply the pending transition, account energy, emit events.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::energy::EnergyLedger;
use crate::error::{ActuatorError, ConfigError};
use crate::fsm::context::{ControlContext, Outputs};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId, TransitionError};
use crate::purge::PurgeParameters;
use crate::safety::SafetySupervisor;
use crate::sensors::{ChannelId, ChannelReading, SensorFrame};

use super::commands::{Command, CommandFlags, PendingCommands};
use super::events::{AppEvent, Telemetry};
use super::ports::{EventSink, SensorPort};

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Why a transition is pending this tick, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    StartupAbort,
    Fault,
    Operator(Command),
    Timed,
}

pub struct Controller {
    fsm: Fsm,
    ctx: ControlContext,
    safety: SafetySupervisor,
    energy: EnergyLedger,
    commands: Arc<CommandFlags>,
    last_tick: Option<f64>,
    tick_count: u64,
    last_faults: u8,
}

impl Controller {
    /// Build the controller in `Off`. Rejects an invalid configuration.
    ///
    /// Does **not** touch the outputs: call [`start`](Self::start) next.
    pub fn new(config: &ControllerConfig, outputs: Outputs, now: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fsm: Fsm::new(build_state_table(), StateId::Off),
            ctx: ControlContext::new(config, outputs, now),
            safety: SafetySupervisor::new(config.safety, config.fault_escalation_count),
            energy: EnergyLedger::new(),
            commands: Arc::new(CommandFlags::new()),
            last_tick: None,
            tick_count: 0,
            last_faults: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Force every output to its recorded (off) level and enter `Off`.
    pub fn start(&mut self, now: f64, sink: &mut impl EventSink) -> Result<(), ActuatorError> {
        self.ctx.now = now;
        self.ctx.outputs.assert_all(now)?;
        self.fsm.start(&mut self.ctx)?;
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("Controller started in {}", self.fsm.current_state());
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle. Returns the state after the tick.
    pub fn tick(
        &mut self,
        now: f64,
        sensors: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) -> StateId {
        self.tick_count += 1;
        let dt = self.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick = Some(now);
        self.ctx.now = now;
        let state = self.fsm.current_state();

        // 1. Sensors
        let frame = sensors.acquire();

        // 2. Safety
        let faults = self
            .safety
            .evaluate(&frame, state, self.ctx.secs_in_state());
        self.ctx.fault_flags = faults;

        let mut pending = None;
        if state == StateId::Startup && frame.all_required_failed() {
            error!("STARTUP: every required sensor failed to read, aborting");
            pending = Some((StateId::Off, Cause::StartupAbort));
        } else if state.is_running() && faults != 0 {
            pending = Some((StateId::Error, Cause::Fault));
        }
        self.ctx.frame = frame;

        // 3. Commands, then timed edges
        let requested = self.commands.take();
        if pending.is_none() {
            pending = self.select_command(requested, state);
        } else if requested.any() {
            info!("commands {:?} ignored: safety transition pending", requested);
        }

        // 4. Routine of the current state
        match self.fsm.update(&mut self.ctx) {
            Ok(edge) => {
                if pending.is_none() {
                    pending = edge.map(|next| (next, Cause::Timed));
                }
            }
            Err(e) => {
                self.actuator_failed(e);
                if state.is_running() && !matches!(pending, Some((_, Cause::StartupAbort))) {
                    pending = Some((StateId::Error, Cause::Fault));
                }
            }
        }

        // 5. Transition, energy, events
        if let Some((next, cause)) = pending {
            self.apply(next, cause, sink);
        }

        self.energy.accumulate(self.ctx.frame.total_power(), dt);
        self.report_faults(sink);
        sink.emit(&AppEvent::Telemetry(self.telemetry()));

        self.fsm.current_state()
    }

    // ── Commands ──────────────────────────────────────────────

    /// Handle for raising command flags from other threads.
    pub fn commands(&self) -> Arc<CommandFlags> {
        Arc::clone(&self.commands)
    }

    /// Parse a text command and raise its flag.
    pub fn request(&self, text: &str) -> Result<Command, ConfigError> {
        let command = text.parse::<Command>()?;
        self.commands.request(command);
        Ok(command)
    }

    /// Zero the energy ledger. Only allowed while `Off`.
    pub fn reset_energy(&mut self) -> Result<(), ConfigError> {
        if self.fsm.current_state() != StateId::Off {
            return Err(ConfigError::InvalidRequest("energy reset only allowed in off"));
        }
        info!("energy ledger reset at {:.1} J", self.energy.energy);
        self.energy.reset();
        Ok(())
    }

    /// Move a running stack into `Shutdown` (used by the runner on exit).
    pub fn begin_shutdown(&mut self, now: f64, sink: &mut impl EventSink) {
        self.ctx.now = now;
        let state = self.fsm.current_state();
        if matches!(state, StateId::Startup | StateId::On) {
            self.apply(StateId::Shutdown, Cause::Operator(Command::Off), sink);
        }
    }

    /// Final power-down: a stack still in `Shutdown` is forced to `Off`,
    /// and every output is driven low unless the controller is in `Error`.
    pub fn power_down(&mut self, now: f64, sink: &mut impl EventSink) -> Result<(), ActuatorError> {
        self.ctx.now = now;
        if self.fsm.current_state() == StateId::Shutdown {
            warn!("shutdown ramp cut short at {:.1}s", self.ctx.secs_in_state());
            self.apply(StateId::Off, Cause::Timed, sink);
        }
        match self.fsm.current_state() {
            StateId::Error => Ok(()),
            _ => self.ctx.outputs.write_all(false, false, false, now),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Configured shutdown ramp (s).
    pub fn stop_time(&self) -> f64 {
        self.ctx.stop_time
    }

    /// Seconds in the current state as of the last tick.
    pub fn secs_in_state(&self) -> f64 {
        self.ctx.secs_in_state()
    }

    /// Total control ticks executed since construction.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    pub fn frame(&self) -> &SensorFrame {
        &self.ctx.frame
    }

    /// Latest reading on `id`; unknown channels are a [`ConfigError`].
    pub fn reading(&self, id: ChannelId) -> Result<&ChannelReading, ConfigError> {
        self.ctx
            .frame
            .get(id)
            .ok_or(ConfigError::InvalidChannel(id.index))
    }

    pub fn energy(&self) -> EnergyLedger {
        self.energy
    }

    pub fn purge_parameters(&self) -> PurgeParameters {
        self.ctx.purge.parameters()
    }

    pub fn outputs(&self) -> &Outputs {
        &self.ctx.outputs
    }

    /// Build a telemetry snapshot from the current context.
    pub fn telemetry(&self) -> Telemetry {
        let frame = &self.ctx.frame;
        let values = |list: &[ChannelReading]| list.iter().map(ChannelReading::value).collect();
        Telemetry {
            timestamp: self.ctx.now,
            sequence: frame.sequence,
            state: self.fsm.current_state(),
            voltage: values(&frame.voltage),
            current: values(&frame.current),
            power: frame.power(),
            temperature: values(&frame.temperature),
            flow: frame.flow.as_ref().and_then(ChannelReading::value),
            purge: self.ctx.purge.parameters(),
            purge_count: self.ctx.purge_count,
            outputs: self.ctx.outputs.levels(),
            power_total: self.energy.power,
            energy: self.energy.energy,
            fault_flags: self.safety.faults(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// First raised command (off → on → reset) that is valid in `state`.
    fn select_command(
        &self,
        requested: PendingCommands,
        state: StateId,
    ) -> Option<(StateId, Cause)> {
        let mut chosen = None;
        for command in requested.by_priority() {
            let next = match (command, state) {
                (Command::Off, StateId::Startup | StateId::On) => Some(StateId::Shutdown),
                (Command::On, StateId::Off) => Some(StateId::Startup),
                (Command::Reset, StateId::Error) if self.reset_allowed() => Some(StateId::Off),
                (Command::Reset, StateId::Error) => {
                    warn!("reset refused: faults=0b{:08b}", self.safety.faults());
                    None
                }
                _ => None,
            };
            match next {
                Some(next) if chosen.is_none() => chosen = Some((next, Cause::Operator(command))),
                Some(_) => debug!("command '{command}' superseded"),
                None => debug!("command '{command}' ignored in {state}"),
            }
        }
        chosen
    }

    /// Every required channel has a value and no sensor fault remains.
    fn reset_allowed(&self) -> bool {
        !self.safety.has_sensor_faults() && self.ctx.frame.all_required_present()
    }

    fn apply(&mut self, next: StateId, cause: Cause, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        if from == next {
            return;
        }
        if cause == Cause::Operator(Command::Reset) {
            self.safety.clear_latched();
            self.ctx.fault_flags = self.safety.faults();
        }

        let result = self.fsm.transition(next, &mut self.ctx);
        if let Err(TransitionError::Rejected { .. }) = result {
            return;
        }
        sink.emit(&AppEvent::StateChanged { from, to: next });
        if cause == Cause::StartupAbort {
            sink.emit(&AppEvent::StartupAborted);
        }

        if let Err(TransitionError::Actuator(e)) = result {
            self.actuator_failed(e);
            if next.is_running() {
                // Entry action of a running state failed: fault immediately.
                self.apply(StateId::Error, Cause::Fault, sink);
            }
        }
    }

    fn actuator_failed(&mut self, e: ActuatorError) {
        error!("actuator failure in {}: {e}", self.fsm.current_state());
        self.safety.latch_actuator_fault();
        self.ctx.fault_flags = self.safety.faults();
    }

    fn report_faults(&mut self, sink: &mut impl EventSink) {
        let faults = self.safety.faults();
        if faults & !self.last_faults != 0 {
            warn!("Safety fault! flags=0b{:08b}", faults);
            sink.emit(&AppEvent::FaultDetected(faults));
        } else if faults == 0 && self.last_faults != 0 {
            sink.emit(&AppEvent::FaultCleared);
        }
        self.last_faults = faults;
    }
}
