//! ControlLoop over the simulated rig: fixed-rate stepping and the
//! blocking shutdown path.

use std::cell::Cell;
use std::time::Duration;

use pemstack::acquisition::spawn_poller;
use pemstack::adapters::MonotonicClock;
use pemstack::app::ports::Clock;
use pemstack::config::ControllerConfig;
use pemstack::fsm::StateId;
use pemstack::runner::ControlLoop;
use pemstack::sensors::SensorHub;

use crate::rig::Rig;

/// Advances only when slept on.
#[derive(Default)]
struct StepClock(Cell<f64>);

impl Clock for StepClock {
    fn now(&self) -> f64 {
        self.0.get()
    }
    fn sleep(&self, secs: f64) {
        self.0.set(self.0.get() + secs);
    }
}

#[test]
fn shutdown_leaves_every_relay_open() {
    let rig = Rig::new();
    let bus = rig.bus.clone();
    let tick = rig.config.tick_secs();
    let mut control = ControlLoop::new(rig.controller, rig.sensors, rig.sink, StepClock::default(), tick);

    control.controller().request("on").unwrap();
    control.run_for(50);
    assert_eq!(control.controller().state(), StateId::On);
    assert_ne!(bus.exclusive(|b| b.expander_outputs()).unwrap(), [0, 0]);

    let (controller, _, sink) = control.shutdown().unwrap();
    assert_eq!(controller.state(), StateId::Off);
    assert_eq!(bus.exclusive(|b| b.expander_outputs()).unwrap(), [0, 0]);
    assert_eq!(
        sink.transitions(),
        vec![
            (StateId::Off, StateId::Startup),
            (StateId::Startup, StateId::On),
            (StateId::On, StateId::Shutdown),
            (StateId::Shutdown, StateId::Off),
        ]
    );
}

#[test]
fn shutdown_in_error_keeps_the_error_latched() {
    let mut rig = Rig::new();
    rig.start_stack();
    rig.set_temperature(40.0);
    assert_eq!(rig.tick(), StateId::Error);

    let tick = rig.config.tick_secs();
    let control = ControlLoop::new(rig.controller, rig.sensors, rig.sink, StepClock::default(), tick);
    let (controller, _, _) = control.shutdown().unwrap();
    assert_eq!(controller.state(), StateId::Error);
}

#[test]
fn polled_acquisition_feeds_the_loop() {
    let mut config = ControllerConfig::default();
    config.timing.tick_interval_ms = 10;
    config.timing.poll_interval_ms = 2;
    let rig = Rig::with_config(config.clone());

    let hub = SensorHub::from_config(&config.sensors).unwrap();
    let (poller, sensors) =
        spawn_poller(hub, rig.bus.clone(), Duration::from_millis(2)).unwrap();

    let mut control = ControlLoop::new(
        rig.controller,
        sensors,
        rig.sink,
        MonotonicClock::new(),
        config.tick_secs(),
    );
    control.run_for(20);
    let v = control.controller().frame().primary_voltage().unwrap();
    assert!((v - 20.0).abs() < 0.1, "voltage {v}");
    assert!(control.controller().frame().sequence > 0);

    let (controller, _, _) = control.shutdown().unwrap();
    assert_eq!(controller.state(), StateId::Off);
    assert!(poller.stop().is_some());
}
