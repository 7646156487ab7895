//! PEM fuel-cell stack test-rig controller.
//!
//! Reads stack voltage, current and temperature over a shared I2C bus,
//! runs the `Off → Startup → On → Shutdown` lifecycle with a safety
//! interlock into `Error`, schedules anode purges from a pluggable
//! strategy and integrates delivered energy.
//!
//! ```text
//!  bus ─▶ sensors ─▶ acquisition ─▶ app::service::Controller ─▶ drivers (h2, fan, purge)
//!                                    │  fsm · safety · purge · energy
//!                                    └─▶ EventSink (log / JSON telemetry)
//! ```
//!
//! Everything hardware-specific sits behind [`bus::BusTransaction`] and
//! [`drivers::Actuator`]; the [`adapters::SimBus`] stands in for the rig
//! on a host.

#![deny(unused_must_use)]

pub mod acquisition;
pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod control;
pub mod drivers;
pub mod energy;
pub mod error;
pub mod fsm;
pub mod purge;
pub mod runner;
pub mod safety;
pub mod sensors;

pub use error::{Error, Result};
