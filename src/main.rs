//! PEM stack controller on a simulated rig.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SimBus (ADCs · TMP102 × 4 · IO expander)                    │
//! │     │ SharedBus                                              │
//! │     ├──▶ sensor-poll thread ──▶ SnapshotCell ──┐             │
//! │     └──▶ IO expander lines (h2, fan, purge)    │             │
//! │                                                ▼             │
//! │  stdin commands ──▶ CommandFlags ──▶ ControlLoop (Controller) │
//! │                                          │                   │
//! │                                          └──▶ LogEventSink    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `pemstack-sim [config.json] [run-seconds]`. Type `on`, `off`,
//! `reset` or `quit` on stdin while it runs; without input the stack is
//! started immediately and ramped down when the run time is up.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{env, fs, io};

use anyhow::{Context, Result};
use log::{info, warn};

use pemstack::acquisition::spawn_poller;
use pemstack::adapters::{LogEventSink, MonotonicClock, SimBus};
use pemstack::app::commands::CommandFlags;
use pemstack::app::ports::Clock;
use pemstack::app::service::Controller;
use pemstack::bus::SharedBus;
use pemstack::config::ControllerConfig;
use pemstack::drivers::task;
use pemstack::fsm::context::Outputs;
use pemstack::runner::ControlLoop;
use pemstack::sensors::SensorHub;

const DEFAULT_RUN_SECS: f64 = 20.0;

/// Nominal operating point of the simulated stack.
const SIM_STACK_VOLTS: f32 = 20.0;
const SIM_STACK_AMPS: f32 = 3.0;
const SIM_STACK_CELSIUS: f32 = 25.0;

fn load_config(path: Option<&str>) -> Result<ControllerConfig> {
    let Some(path) = path else {
        info!("no config file given, using defaults");
        return Ok(ControllerConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let config = ControllerConfig::from_json(&text).with_context(|| format!("parsing {path}"))?;
    info!("config loaded from {path}");
    Ok(config)
}

/// Rig with every configured input at the nominal operating point.
fn simulated_rig(config: &ControllerConfig) -> SimBus {
    let mut bus = SimBus::new();
    let sensors = &config.sensors;
    for ch in &sensors.voltage {
        bus.set_adc_input(ch.channel, ch.transfer.invert(SIM_STACK_VOLTS) / ch.calibration);
    }
    for ch in &sensors.current {
        bus.set_adc_input(ch.channel, ch.transfer.invert(SIM_STACK_AMPS) / ch.calibration);
    }
    for &addr in &sensors.temperature_addresses {
        bus.set_temperature(addr, SIM_STACK_CELSIUS);
    }
    bus
}

/// Forward stdin lines to the controller's command flags.
fn spawn_console(commands: Arc<CommandFlags>, stop: Arc<AtomicBool>) -> io::Result<()> {
    task::spawn_named("console", 64, move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text == "quit" {
                stop.store(true, Ordering::Release);
                break;
            }
            match text.parse() {
                Ok(command) => commands.request(command),
                Err(e) => warn!("console: {e}"),
            }
        }
    })?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("pemstack-sim v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = env::args().collect();
    let config = load_config(args.get(1).map(String::as_str))?;
    let run_secs = match args.get(2) {
        Some(s) => s.parse::<f64>().with_context(|| format!("run time '{s}'"))?,
        None => DEFAULT_RUN_SECS,
    };

    // ── Rig ───────────────────────────────────────────────────
    let bus = SharedBus::new(simulated_rig(&config));
    let clock = MonotonicClock::new();

    let outputs =
        Outputs::on_expander(&bus, &config.outputs, clock.now()).context("IO expander")?;

    let hub = SensorHub::from_config(&config.sensors)?;
    let poll = Duration::from_millis(u64::from(config.timing.poll_interval_ms));
    let (poller, sensors) = spawn_poller(hub, bus.clone(), poll).context("sensor poller")?;

    // ── Controller ────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut controller = Controller::new(&config, outputs, clock.now())?;
    controller.start(clock.now(), &mut sink)?;

    let mut control = ControlLoop::new(controller, sensors, sink, clock, config.tick_secs());
    spawn_console(control.controller().commands(), control.stop_handle())
        .context("console thread")?;

    control.controller().request("on")?;
    let ticks = (run_secs / config.tick_secs()).ceil() as u64;
    control.run_for(ticks);

    // ── Teardown ──────────────────────────────────────────────
    let (controller, _, _) = control.shutdown()?;
    let energy = controller.energy();
    info!(
        "final state {} after {} ticks, {:.4} Wh delivered",
        controller.state(),
        controller.tick_count(),
        energy.watt_hours()
    );
    if poller.stop().is_none() {
        warn!("sensor poller did not stop cleanly");
    }
    let relays = bus.exclusive(|b| b.expander_outputs())?;
    info!("expander latch at exit: {:02x?}", relays);
    Ok(())
}
