//! Feedback control primitives.

pub mod pid;

pub use pid::PidController;
