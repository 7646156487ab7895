//! Concrete state routines and table builder.
//!
//! ```text
//!  OFF ──[on]──▶ STARTUP ──[start_time]──▶ ON
//!   ▲              │  │                     │
//!   │      [bus lost]  [off]               [off]
//!   │              │  ▼                     ▼
//!   ├──────────────┘ SHUTDOWN ◀─────────────┘
//!   ├──────[stop_time]───┘
//!   │
//!   └──[reset, in bounds]── ERROR ◀──[breach]── STARTUP | ON | SHUTDOWN
//! ```
//!
//! Routines only return their own timed edge. Commands, aborts and
//! safety transitions are decided by the controller.

use log::info;

use super::context::{ControlContext, first_failure};
use super::{StateDescriptor, StateId};
use crate::error::ActuatorError;
use crate::safety;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Off,
            name: "Off",
            on_enter: Some(off_enter),
            on_exit: None,
            on_update: off_update,
        },
        StateDescriptor {
            id: StateId::Startup,
            name: "Startup",
            on_enter: Some(startup_enter),
            on_exit: None,
            on_update: startup_update,
        },
        StateDescriptor {
            id: StateId::On,
            name: "On",
            on_enter: Some(running_enter),
            on_exit: None,
            on_update: running_update,
        },
        StateDescriptor {
            id: StateId::Shutdown,
            name: "Shutdown",
            on_enter: Some(shutdown_enter),
            on_exit: None,
            on_update: shutdown_update,
        },
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("OFF: all outputs low");
    off_update(ctx).map(drop)
}

fn off_update(ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
    ctx.outputs.write_all(false, false, false, ctx.now)?;
    Ok(None)
}

// ═══════════════════════════════════════════════════════════════════════════
//  STARTUP: everything open for the ramp
// ═══════════════════════════════════════════════════════════════════════════

fn startup_enter(ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("STARTUP: ramp for {:.1}s", ctx.start_time);
    let now = ctx.now;
    ctx.outputs.h2.restart(now);
    ctx.outputs.fan.restart(now);
    ctx.outputs.purge.restart(now);
    startup_update(ctx).map(drop)
}

fn startup_update(ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
    let (now, ramp) = (ctx.now, ctx.start_time);
    let o = &mut ctx.outputs;
    o.h2.timed(0.0, ramp, now)?;
    o.fan.timed(0.0, ramp, now)?;
    o.purge.timed(0.0, ramp, now)?;

    Ok((ctx.secs_in_state() >= ramp).then_some(StateId::On))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ON: running, purge on the strategy's schedule
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("ON: purge strategy '{}'", ctx.purge.strategy_name());
    ctx.reset_purge_clock();
    let now = ctx.now;
    ctx.outputs.h2.write(true, now)?;
    ctx.outputs.fan.write(true, now)?;
    Ok(())
}

fn running_update(ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
    let now = ctx.now;
    ctx.outputs.h2.write(true, now)?;
    ctx.outputs.fan.write(true, now)?;

    let input = ctx.purge_input();
    let frequency = f64::from(ctx.purge.frequency(&input));
    let duration = f64::from(ctx.purge.duration());

    let was_open = ctx.outputs.purge.is_on();
    let open = ctx.outputs.purge.timed(frequency, duration, now)?;
    if open && !was_open {
        ctx.purge.on_purge(now);
        ctx.purge_count = ctx.purge_count.wrapping_add(1);
    }
    Ok(None)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SHUTDOWN: h2 closed, fan and purge run out the ramp
// ═══════════════════════════════════════════════════════════════════════════

fn shutdown_enter(ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("SHUTDOWN: h2 closed, ramp for {:.1}s", ctx.stop_time);
    let now = ctx.now;
    ctx.outputs.fan.restart(now);
    ctx.outputs.purge.restart(now);
    shutdown_update(ctx).map(drop)
}

fn shutdown_update(ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
    let (now, ramp) = (ctx.now, ctx.stop_time);
    let o = &mut ctx.outputs;
    first_failure([
        o.h2.write(false, now).map(drop),
        o.fan.timed(0.0, ramp, now).map(drop),
        o.purge.timed(0.0, ramp, now).map(drop),
    ])?;

    Ok((ctx.secs_in_state() >= ramp).then_some(StateId::Off))
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR: latched until an operator reset
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("ERROR: faults=0b{:08b}, h2 and purge closed", ctx.fault_flags);
    error_update(ctx).map(drop)
}

fn error_exit(_ctx: &mut ControlContext) -> Result<(), ActuatorError> {
    info!("ERROR: cleared by operator reset");
    Ok(())
}

fn error_update(ctx: &mut ControlContext) -> Result<Option<StateId>, ActuatorError> {
    // Fan keeps cooling a hot stack even while faulted.
    let hot = safety::over_temperature(&ctx.frame, ctx.limits.temperature_cutoff_c);
    let now = ctx.now;
    ctx.outputs.write_all(false, hot, false, now)?;
    Ok(None)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════
