//! Port traits: the boundary between the controller and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Sensor sources, event sinks and clocks implement these traits. The
//! [`Controller`](super::service::Controller) and the
//! [`ControlLoop`](crate::runner::ControlLoop) consume them via generics,
//! so the domain core never touches the bus or the wall clock directly.
//! Actuators enter through [`Actuator`](crate::drivers::Actuator).

use crate::sensors::SensorFrame;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the controller calls this once per tick.
pub trait SensorPort {
    /// The freshest complete frame. Never partially updated.
    fn acquire(&mut self) -> SensorFrame;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<E: EventSink + ?Sized> EventSink for &mut E {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic seconds plus a way to wait.
pub trait Clock {
    fn now(&self) -> f64;
    fn sleep(&self, secs: f64);
}
