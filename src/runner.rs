//! Fixed-rate control loop and orderly power-down.
//!
//! ```text
//!   loop { now = clock.now(); controller.tick(now); sleep(remaining) }   until stop flag
//!   shutdown: Startup/On → Shutdown → tick until Off (≤ stop_time) → outputs low
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::app::ports::{Clock, EventSink, SensorPort};
use crate::app::service::Controller;
use crate::error::ActuatorError;
use crate::fsm::StateId;

pub struct ControlLoop<S, E, C> {
    controller: Controller,
    sensors: S,
    sink: E,
    clock: C,
    tick_secs: f64,
    stop: Arc<AtomicBool>,
}

impl<S: SensorPort, E: EventSink, C: Clock> ControlLoop<S, E, C> {
    pub fn new(controller: Controller, sensors: S, sink: E, clock: C, tick_secs: f64) -> Self {
        Self {
            controller,
            sensors,
            sink,
            clock,
            tick_secs,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends [`run`](Self::run) after the current tick.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// One tick, then sleep out the rest of the period.
    pub fn step(&mut self) -> StateId {
        let started = self.clock.now();
        let state = self
            .controller
            .tick(started, &mut self.sensors, &mut self.sink);
        let spent = self.clock.now() - started;
        self.clock.sleep((self.tick_secs - spent).max(0.0));
        state
    }

    /// Tick until the stop flag is raised. Returns the number of ticks run.
    pub fn run(&mut self) -> u64 {
        let mut ticks = 0;
        while !self.stop.load(Ordering::Acquire) {
            self.step();
            ticks += 1;
        }
        ticks
    }

    /// Tick at most `ticks` times, or until the stop flag is raised.
    pub fn run_for(&mut self, ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < ticks && !self.stop.load(Ordering::Acquire) {
            self.step();
            ran += 1;
        }
        ran
    }

    /// Blocking shutdown: ramp down a running stack, bounded by the stop
    /// time, drive the outputs low and hand back the parts.
    pub fn shutdown(mut self) -> Result<(Controller, S, E), ActuatorError> {
        let now = self.clock.now();
        self.controller.begin_shutdown(now, &mut self.sink);

        let deadline = now + self.controller.stop_time() + self.tick_secs;
        while self.controller.state() == StateId::Shutdown && self.clock.now() < deadline {
            self.step();
        }

        self.controller.power_down(self.clock.now(), &mut self.sink)?;
        info!(
            "control loop stopped in {} after {} ticks",
            self.controller.state(),
            self.controller.tick_count()
        );
        Ok((self.controller, self.sensors, self.sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::app::events::AppEvent;
    use crate::bus::Frame;
    use crate::config::ControllerConfig;
    use crate::drivers::{Actuator, FnActuator};
    use crate::fsm::context::Outputs;
    use crate::sensors::{ChannelReading, SensorFrame};

    /// Clock that only moves when slept on.
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

    struct Nominal(SensorFrame);

    impl Nominal {
        fn new() -> Self {
            let r = |v| ChannelReading::fresh(Frame::new(), v);
            let mut frame = SensorFrame::default();
            frame.voltage.push(r(20.0)).unwrap();
            frame.current.push(r(3.0)).unwrap();
            frame.temperature.push(r(25.0)).unwrap();
            Self(frame)
        }
    }

    impl SensorPort for Nominal {
        fn acquire(&mut self) -> SensorFrame {
            self.0.sequence += 1;
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Count(usize);

    impl EventSink for Count {
        fn emit(&mut self, _event: &AppEvent) {
            self.0 += 1;
        }
    }

    fn quiet() -> Box<dyn Actuator + Send> {
        Box::new(FnActuator::new(|| Ok(()), || Ok(())))
    }

    fn control_loop() -> ControlLoop<Nominal, Count, StepClock> {
        let config = ControllerConfig::default();
        let outputs = Outputs::new(quiet(), quiet(), quiet(), 0.0);
        let mut controller = Controller::new(&config, outputs, 0.0).unwrap();
        let mut sink = Count::default();
        controller.start(0.0, &mut sink).unwrap();
        ControlLoop::new(controller, Nominal::new(), sink, StepClock::default(), config.tick_secs())
    }

    #[test]
    fn ticks_at_fixed_rate() {
        let mut lp = control_loop();
        assert_eq!(lp.run_for(5), 5);
        assert!((lp.clock.now() - 0.5).abs() < 1e-9);
        assert_eq!(lp.controller().tick_count(), 5);
    }

    #[test]
    fn raised_stop_flag_ends_run() {
        let mut lp = control_loop();
        lp.stop_handle().store(true, Ordering::Release);
        assert_eq!(lp.run(), 0);
    }

    #[test]
    fn shutdown_ramps_down_a_running_stack() {
        let mut lp = control_loop();
        lp.controller().request("on").unwrap();
        lp.run_for(40);
        assert_eq!(lp.controller().state(), StateId::On);

        let (controller, _, sink) = lp.shutdown().unwrap();
        assert_eq!(controller.state(), StateId::Off);
        assert!(!controller.outputs().any_on());
        assert!(sink.0 > 40);
    }

    #[test]
    fn shutdown_from_off_is_immediate() {
        let lp = control_loop();
        let (controller, _, _) = lp.shutdown().unwrap();
        assert_eq!(controller.state(), StateId::Off);
        assert_eq!(controller.tick_count(), 0);
    }
}
