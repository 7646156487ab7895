//! Actuator drivers: the on/off capability, the debounced [`Switch`](switch::Switch)
//! built on it, and the IO-expander relay lines of the rig.

pub mod expander;
pub mod switch;
pub mod task;

use crate::error::ActuatorError;

/// A two-state output (relay, valve, fan).
pub trait Actuator {
    fn on(&mut self) -> Result<(), ActuatorError>;
    fn off(&mut self) -> Result<(), ActuatorError>;

    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        if on { self.on() } else { self.off() }
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn on(&mut self) -> Result<(), ActuatorError> {
        (**self).on()
    }

    fn off(&mut self) -> Result<(), ActuatorError> {
        (**self).off()
    }
}

/// Binds a pair of closures as an [`Actuator`].
pub struct FnActuator<On, Off> {
    on: On,
    off: Off,
}

impl<On, Off> FnActuator<On, Off>
where
    On: FnMut() -> Result<(), ActuatorError>,
    Off: FnMut() -> Result<(), ActuatorError>,
{
    pub fn new(on: On, off: Off) -> Self {
        Self { on, off }
    }
}

impl<On, Off> Actuator for FnActuator<On, Off>
where
    On: FnMut() -> Result<(), ActuatorError>,
    Off: FnMut() -> Result<(), ActuatorError>,
{
    fn on(&mut self) -> Result<(), ActuatorError> {
        (self.on)()
    }

    fn off(&mut self) -> Result<(), ActuatorError> {
        (self.off)()
    }
}
