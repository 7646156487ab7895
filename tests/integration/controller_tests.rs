//! Controller → drivers → SimBus, one tick at a time.

use pemstack::app::events::AppEvent;
use pemstack::error::SafetyFault;
use pemstack::fsm::StateId;
use pemstack::sensors::{ChannelId, ChannelKind, ReadingStatus};

use crate::rig::Rig;

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn startup_opens_everything_then_runs() {
    let mut rig = Rig::new();
    assert!(!rig.h2_open() && !rig.fan_running() && !rig.purge_open());

    rig.controller.request("on").unwrap();
    assert_eq!(rig.tick(), StateId::Startup);
    assert!(rig.h2_open() && rig.fan_running() && rig.purge_open());

    assert!(rig.tick_until(StateId::On, 40));
    rig.tick();
    assert!(rig.h2_open() && rig.fan_running());
    assert!(!rig.purge_open());
}

#[test]
fn repeated_on_does_not_restart_the_ramp() {
    let mut rig = Rig::new();
    rig.controller.request("on").unwrap();
    rig.tick();
    for _ in 0..15 {
        rig.tick();
    }
    rig.controller.request("on").unwrap();
    assert!(rig.tick_until(StateId::On, 40));
    assert!(rig.now < 3.3, "On reached at {:.1}s", rig.now);
    assert_eq!(
        rig.sink.transitions(),
        vec![(StateId::Off, StateId::Startup), (StateId::Startup, StateId::On)]
    );
}

/// Purge rising-edge times over `ticks` ticks of a running stack.
fn purge_edges(rig: &mut Rig, ticks: usize, repeat_on: bool) -> Vec<f64> {
    let mut edges = Vec::new();
    let mut was_open = rig.purge_open();
    for _ in 0..ticks {
        if repeat_on {
            rig.controller.request("on").unwrap();
        }
        assert_eq!(rig.tick(), StateId::On);
        let open = rig.purge_open();
        if open && !was_open {
            edges.push(rig.now);
        }
        was_open = open;
    }
    edges
}

#[test]
fn repeated_on_while_running_leaves_purge_schedule_alone() {
    let mut plain = Rig::new();
    plain.start_stack();
    let expected = purge_edges(&mut plain, 650, false);
    assert_eq!(expected.len(), 2);

    let mut pressed = Rig::new();
    pressed.start_stack();
    assert_eq!(purge_edges(&mut pressed, 650, true), expected);
    assert_eq!(
        pressed.controller.telemetry().purge_count,
        plain.controller.telemetry().purge_count
    );
    assert_eq!(
        pressed.sink.transitions(),
        vec![(StateId::Off, StateId::Startup), (StateId::Startup, StateId::On)]
    );
}

#[test]
fn off_ramps_down_with_h2_closed() {
    let mut rig = Rig::new();
    rig.start_stack();
    rig.controller.request("off").unwrap();
    assert_eq!(rig.tick(), StateId::Shutdown);
    assert!(!rig.h2_open());
    assert!(rig.fan_running());

    assert!(rig.tick_until(StateId::Off, 120));
    assert!(!rig.fan_running() && !rig.purge_open());
}

#[test]
fn purge_valve_pulses_while_on() {
    let mut rig = Rig::new();
    rig.start_stack();
    let mut opened = 0;
    let mut was_open = rig.purge_open();
    // 65 s at the default 30 s interval.
    for _ in 0..650 {
        rig.tick();
        let open = rig.purge_open();
        if open && !was_open {
            opened += 1;
        }
        was_open = open;
    }
    assert_eq!(opened, 2);
    assert_eq!(rig.controller.telemetry().purge_count, 2);
}

// ── Safety ────────────────────────────────────────────────────

#[test]
fn over_temperature_trips_to_error_and_keeps_fan_running() {
    let mut rig = Rig::new();
    rig.start_stack();

    rig.set_temperature(32.0);
    rig.controller.request("off").unwrap();
    assert_eq!(rig.tick(), StateId::Error);
    assert!(rig.controller.fault_flags() & SafetyFault::OverTemperature.mask() != 0);
    assert!(!rig.h2_open());
    assert!(!rig.purge_open());
    assert!(rig.fan_running());
    assert!(rig.sink.count(|e| matches!(e, AppEvent::FaultDetected(_))) >= 1);
}

#[test]
fn under_voltage_trips_only_when_running() {
    let mut rig = Rig::new();
    rig.set_stack(5.0, 0.0);
    for _ in 0..5 {
        assert_eq!(rig.tick(), StateId::Off);
    }

    rig.set_stack(20.0, 3.0);
    rig.start_stack();
    rig.set_stack(9.0, 3.0);
    assert_eq!(rig.tick(), StateId::Error);
    assert!(rig.controller.fault_flags() & SafetyFault::UnderVoltage.mask() != 0);
}

#[test]
fn reset_needs_readings_back_in_bounds() {
    let mut rig = Rig::new();
    rig.start_stack();
    rig.set_temperature(35.0);
    assert_eq!(rig.tick(), StateId::Error);

    rig.controller.request("reset").unwrap();
    assert_eq!(rig.tick(), StateId::Error);

    rig.set_temperature(24.0);
    rig.tick();
    assert!(!rig.fan_running());
    rig.controller.request("reset").unwrap();
    assert_eq!(rig.tick(), StateId::Off);
    assert_eq!(rig.controller.fault_flags(), 0);
    assert!(!rig.h2_open() && !rig.fan_running() && !rig.purge_open());

    // A fresh start works after the reset.
    rig.start_stack();
}

#[test]
fn lost_sensor_escalates_to_bus_fault() {
    let mut rig = Rig::new();
    rig.start_stack();
    rig.with_sim(|b| b.fail_address(0x49));
    let id = ChannelId::new(ChannelKind::Temperature, 1);

    assert_eq!(rig.tick(), StateId::On);
    assert_eq!(rig.controller.reading(id).unwrap().status, ReadingStatus::Retained);
    assert_eq!(rig.tick(), StateId::On);
    assert_eq!(rig.tick(), StateId::Error);
    assert!(rig.controller.fault_flags() & SafetyFault::BusFault.mask() != 0);

    // Reset stays refused until the sensor answers again.
    rig.controller.request("reset").unwrap();
    assert_eq!(rig.tick(), StateId::Error);
    rig.with_sim(|b| b.clear_failure(0x49));
    rig.tick();
    rig.controller.request("reset").unwrap();
    assert_eq!(rig.tick(), StateId::Off);
}

#[test]
fn startup_aborts_when_every_sensor_is_lost() {
    let mut rig = Rig::new();
    rig.controller.request("on").unwrap();
    rig.tick();
    rig.with_sim(|b| {
        for addr in [0x68, 0x69, 0x48, 0x49, 0x4A, 0x4B] {
            b.fail_address(addr);
        }
    });
    assert_eq!(rig.tick(), StateId::Off);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::StartupAborted)), 1);
    assert!(!rig.h2_open() && !rig.fan_running() && !rig.purge_open());
}

// ── Accounting ────────────────────────────────────────────────

#[test]
fn energy_integrates_stack_power() {
    let mut rig = Rig::new();
    rig.start_stack();
    let before = rig.controller.energy().energy;
    let power = rig.controller.telemetry().power_total;
    assert!((power - 60.0).abs() < 3.0, "power {power}");

    for _ in 0..100 {
        rig.tick();
    }
    let gained = rig.controller.energy().energy - before;
    let expected = f64::from(power) * 10.0;
    assert!((gained - expected).abs() < expected * 0.02, "{gained} J vs {expected} J");

    assert!(rig.controller.reset_energy().is_err());
    rig.controller.request("off").unwrap();
    assert!(rig.tick_until(StateId::Off, 120));
    rig.controller.reset_energy().unwrap();
    assert_eq!(rig.controller.energy().energy, 0.0);
}

#[test]
fn telemetry_serialises_with_missing_channels_as_null() {
    let mut rig = Rig::new();
    rig.with_sim(|b| b.fail_address(0x4B));
    rig.tick();
    let json = rig.controller.telemetry().to_json().unwrap();
    assert!(json.contains("\"state\":\"off\""), "{json}");
    assert!(json.contains("null"), "{json}");
}
