//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌──────────┬───────────┬──────────┬─────────────────────┐ │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update (routine) │ │
//! │  ├──────────┼───────────┼──────────┼─────────────────────┤ │
//! │  │ Off      │ fn(ctx)   │    -     │ fn(ctx)->Option<>   │ │
//! │  │ Startup  │ fn(ctx)   │    -     │ fn(ctx)->Option<>   │ │
//! │  │ On       │ fn(ctx)   │    -     │ fn(ctx)->Option<>   │ │
//! │  │ Shutdown │ fn(ctx)   │    -     │ fn(ctx)->Option<>   │ │
//! │  │ Error    │ fn(ctx)   │    -     │ fn(ctx)->Option<>   │ │
//! │  └──────────┴───────────┴──────────┴─────────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a free-running FSM the engine does not apply the timed edge
//! returned by `on_update` itself: the controller owns the arbitration
//! between safety, operator commands and timed edges, then calls
//! [`Fsm::transition`]. Every handler may fail with an [`ActuatorError`].

pub mod context;
pub mod states;

use core::fmt;
use core::str::FromStr;

use context::ControlContext;
use log::{info, warn};
use serde::Serialize;

use crate::error::{ActuatorError, ConfigError};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StateId {
    Off = 0,
    Startup = 1,
    On = 2,
    Shutdown = 3,
    Error = 4,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Off,
        Self::Startup,
        Self::On,
        Self::Shutdown,
        Self::Error,
    ];

    /// Convert a table index back to `StateId`. Out of range maps to `Error`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::Startup,
            2 => Self::On,
            3 => Self::Shutdown,
            4 => Self::Error,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Startup => "startup",
            Self::On => "on",
            Self::Shutdown => "shutdown",
            Self::Error => "error",
        }
    }

    /// Stack is fed hydrogen or winding down: safety breaches send it to `Error`.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Startup | Self::On | Self::Shutdown)
    }

    /// The permitted edges of the controller graph.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Off, Self::Startup)
                | (Self::Startup, Self::On | Self::Shutdown | Self::Off | Self::Error)
                | (Self::On, Self::Shutdown | Self::Error)
                | (Self::Shutdown, Self::Off | Self::Error)
                | (Self::Error, Self::Off)
        )
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or(ConfigError::UnknownState)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut ControlContext) -> Result<(), ActuatorError>;

/// Signature for the per-tick routine.
/// Returns `Some(next)` when the state's own timed edge is due.
pub type StateUpdateFn = fn(&mut ControlContext) -> Result<Option<StateId>, ActuatorError>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Why [`Fsm::transition`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The edge is not in the controller graph; nothing changed.
    Rejected { from: StateId, to: StateId },
    /// The state changed but an exit/entry action failed to drive an output.
    Actuator(ActuatorError),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { from, to } => write!(f, "no edge {from} -> {to}"),
            Self::Actuator(e) => write!(f, "entry action failed: {e}"),
        }
    }
}

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first tick.
    pub fn start(&mut self, ctx: &mut ControlContext) -> Result<(), ActuatorError> {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.entered_at = ctx.now;
        match self.table[self.current].on_enter {
            Some(enter) => enter(ctx),
            None => Ok(()),
        }
    }

    /// Run the current state's routine once.
    pub fn update(&mut self, ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
        self.tick_count += 1;
        (self.table[self.current].on_update)(ctx)
    }

    /// Move to `next` along a permitted edge: `on_exit(current)` → pointer → `on_enter(next)`.
    ///
    /// The state change is committed even if an action fails; the error is
    /// returned so the caller can escalate.
    pub fn transition(
        &mut self,
        next: StateId,
        ctx: &mut ControlContext,
    ) -> Result<(), TransitionError> {
        let from = self.current_state();
        if !from.can_transition_to(next) {
            warn!("FSM rejected transition: {} -> {}", from, next);
            return Err(TransitionError::Rejected { from, to: next });
        }

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next as usize].name
        );

        let exit = match self.table[self.current].on_exit {
            Some(exit) => exit(ctx),
            None => Ok(()),
        };

        self.current = next as usize;
        self.state_entry_tick = self.tick_count;
        ctx.entered_at = ctx.now;

        let enter = match self.table[self.current].on_enter {
            Some(enter) => enter(ctx),
            None => Ok(()),
        };
        exit.and(enter).map_err(TransitionError::Actuator)
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    /// How many routine runs the FSM has made in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_state() -> impl Strategy<Value = StateId> {
        (0usize..StateId::COUNT).prop_map(StateId::from_index)
    }

    proptest! {
        #[test]
        fn startup_is_only_reachable_from_off(from in arb_state()) {
            prop_assert_eq!(from.can_transition_to(StateId::Startup), from == StateId::Off);
        }

        #[test]
        fn no_self_loops(s in arb_state()) {
            prop_assert!(!s.can_transition_to(s));
        }
    }
}
