//! Simulated rig for integration tests.
//!
//! The real driver stack (SensorHub, IoExpander lines, SharedBus) runs
//! on top of [`SimBus`]; tests move the stack's operating point and
//! inject bus faults, then step the controller with an explicit clock.

use pemstack::acquisition::DirectSensors;
use pemstack::adapters::SimBus;
use pemstack::app::events::AppEvent;
use pemstack::app::ports::EventSink;
use pemstack::app::service::Controller;
use pemstack::bus::SharedBus;
use pemstack::config::ControllerConfig;
use pemstack::fsm::StateId;
use pemstack::fsm::context::Outputs;
use pemstack::sensors::SensorHub;

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn transitions(&self) -> Vec<(StateId, StateId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type RigBus = SharedBus<SimBus>;

pub struct Rig {
    pub config: ControllerConfig,
    pub bus: RigBus,
    pub controller: Controller,
    pub sensors: DirectSensors<RigBus>,
    pub sink: Recorder,
    pub now: f64,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let bus = SharedBus::new(SimBus::new());
        let outputs = Outputs::on_expander(&bus, &config.outputs, 0.0).unwrap();
        let hub = SensorHub::from_config(&config.sensors).unwrap();
        let sensors = DirectSensors::new(hub, bus.clone());

        let mut controller = Controller::new(&config, outputs, 0.0).unwrap();
        let mut sink = Recorder::default();
        controller.start(0.0, &mut sink).unwrap();

        let mut rig = Self {
            config,
            bus,
            controller,
            sensors,
            sink,
            now: 0.0,
        };
        rig.set_stack(20.0, 3.0);
        rig.set_temperature(25.0);
        rig
    }

    /// Put the stack at `volts` / `amps` on every configured channel.
    pub fn set_stack(&mut self, volts: f32, amps: f32) {
        let sensors = self.config.sensors.clone();
        self.bus
            .exclusive(|b| {
                for ch in &sensors.voltage {
                    b.set_adc_input(ch.channel, ch.transfer.invert(volts));
                }
                for ch in &sensors.current {
                    b.set_adc_input(ch.channel, ch.transfer.invert(amps));
                }
            })
            .unwrap();
    }

    /// Every temperature sensor reads `celsius`.
    pub fn set_temperature(&mut self, celsius: f32) {
        let addrs = self.config.sensors.temperature_addresses.clone();
        self.bus
            .exclusive(|b| {
                for &a in &addrs {
                    b.set_temperature(a, celsius);
                }
            })
            .unwrap();
    }

    pub fn with_sim<T>(&self, f: impl FnOnce(&mut SimBus) -> T) -> T {
        self.bus.exclusive(f).unwrap()
    }

    /// Advance one tick period and run the controller.
    pub fn tick(&mut self) -> StateId {
        self.now += self.config.tick_secs();
        self.controller
            .tick(self.now, &mut self.sensors, &mut self.sink)
    }

    /// Tick until `state` is reached; false if `max_ticks` ran out first.
    pub fn tick_until(&mut self, state: StateId, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            if self.tick() == state {
                return true;
            }
        }
        false
    }

    /// Request `on` and run until the stack is in `On`.
    pub fn start_stack(&mut self) {
        self.controller.request("on").unwrap();
        assert!(self.tick_until(StateId::On, 100), "never reached On");
    }

    fn line(&self, (port, bit): (u8, u8)) -> bool {
        self.with_sim(|b| b.line(port, bit))
    }

    pub fn h2_open(&self) -> bool {
        self.line(self.config.outputs.h2_line)
    }

    pub fn fan_running(&self) -> bool {
        self.line(self.config.outputs.fan_line)
    }

    pub fn purge_open(&self) -> bool {
        self.line(self.config.outputs.purge_line)
    }
}
