//! Application core: controller orchestration, zero direct I/O.
//!
//! This module holds the per-tick rules of the stack controller: command
//! handling, safety-driven transitions, energy accounting and telemetry.
//! Sensors, event output and time come in through the **port traits**
//! in [`ports`], so the core runs the same against the simulated bus and
//! real hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
