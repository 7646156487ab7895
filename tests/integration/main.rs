//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below exercises the controller end to end against the
//! simulated rig bus. All tests run on the host with no hardware.

mod controller_tests;
mod rig;
mod runner_tests;
