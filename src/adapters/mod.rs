//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements       | Connects to                     |
//! |------------|------------------|---------------------------------|
//! | `log_sink` | EventSink        | `log` output (text or JSON)     |
//! | `sim_bus`  | BusTransaction   | Simulated ADCs, sensors, relays |
//! | `time`     | Clock            | `std::time::Instant`            |
//!
//! Real hardware enters through [`I2cBus`](crate::bus::I2cBus) over any
//! `embedded-hal` I2C peripheral.

pub mod log_sink;
pub mod sim_bus;
pub mod time;

pub use log_sink::LogEventSink;
pub use sim_bus::SimBus;
pub use time::MonotonicClock;
