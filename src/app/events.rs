//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log lines, a display, a network client.

use heapless::Vec;
use serde::Serialize;

use crate::fsm::StateId;
use crate::fsm::context::OutputLevels;
use crate::purge::PurgeParameters;
use crate::sensors::MAX_CHANNELS;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Per-tick telemetry snapshot.
    Telemetry(Telemetry),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// One or more safety faults were raised (full mask).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// Startup lost every required sensor and fell back to Off.
    StartupAborted,

    /// The controller has started (carries initial state).
    Started(StateId),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    /// Controller clock (s).
    pub timestamp: f64,
    /// Sensor frame sequence this snapshot was built from.
    pub sequence: u64,
    pub state: StateId,
    /// `None` for channels that have never been read.
    pub voltage: Vec<Option<f32>, MAX_CHANNELS>,
    pub current: Vec<Option<f32>, MAX_CHANNELS>,
    pub power: Vec<Option<f32>, MAX_CHANNELS>,
    pub temperature: Vec<Option<f32>, MAX_CHANNELS>,
    pub flow: Option<f32>,
    pub purge: PurgeParameters,
    pub purge_count: u32,
    pub outputs: OutputLevels,
    /// Total stack power this tick (W).
    pub power_total: f32,
    /// Cumulative energy (J).
    pub energy: f64,
    pub fault_flags: u8,
}

impl Telemetry {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
