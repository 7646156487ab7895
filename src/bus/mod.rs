//! Bus transaction abstraction.
//!
//! Every device on the rig (ADCs, temperature sensors, the IO expander)
//! sits on one addressed bus. The controller only ever talks to it
//! through [`BusTransaction`]:
//!
//! ```text
//!  SensorHub ──┐
//!              ├──▶ SharedBus (mutex) ──▶ I2cBus<embedded-hal> / SimBus
//!  Expander ───┘
//! ```
//!
//! Transactions are not composable across callers, so anything shared
//! between the control tick and a background poller must go through
//! [`SharedBus`].

pub mod i2c;
pub mod shared;

pub use i2c::I2cBus;
pub use shared::SharedBus;

use crate::error::BusError;

/// Largest transfer any rig device needs (18-bit ADC frame + status).
pub const MAX_FRAME: usize = 8;

/// Bytes returned by a read transaction.
pub type Frame = heapless::Vec<u8, MAX_FRAME>;

/// Known device addresses on the rig.
pub mod address {
    /// First ADC (channels 0-3).
    pub const ADC_PRIMARY: u8 = 0x68;
    /// Second ADC (channels 4-7).
    pub const ADC_SECONDARY: u8 = 0x69;
    /// First of the four temperature sensors (0x48-0x4B).
    pub const TEMPERATURE_FIRST: u8 = 0x48;
    pub const TEMPERATURE_LAST: u8 = 0x4B;
    /// Relay / valve IO expander.
    pub const IO_EXPANDER: u8 = 0x20;
}

/// Exclusive read/write of addressed device registers.
pub trait BusTransaction {
    /// Select `register` on `address` and read `length` bytes back.
    fn read(&mut self, address: u8, register: u8, length: usize) -> Result<Frame, BusError>;

    /// Write `register` followed by `bytes` to `address`.
    fn write(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError>;
}

impl<T: BusTransaction + ?Sized> BusTransaction for &mut T {
    fn read(&mut self, address: u8, register: u8, length: usize) -> Result<Frame, BusError> {
        (**self).read(address, register, length)
    }

    fn write(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        (**self).write(address, register, bytes)
    }
}

/// Run `op`, retrying exactly once if the first attempt fails.
pub(crate) fn with_one_retry<T>(
    mut op: impl FnMut() -> Result<T, BusError>,
) -> Result<T, BusError> {
    match op() {
        Ok(v) => Ok(v),
        Err(first) => {
            log::debug!("bus retry after: {first}");
            op()
        }
    }
}
