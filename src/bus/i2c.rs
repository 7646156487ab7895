//! [`BusTransaction`] over any `embedded-hal` 1.0 I2C peripheral.
//!
//! The register byte doubles as the MCP3424 configuration byte and the
//! TMP102 pointer register, so a read is a plain `write_read`.

use embedded_hal::i2c::{Error as _, I2c};

use super::{BusTransaction, Frame, MAX_FRAME};
use crate::error::BusError;

pub struct I2cBus<I> {
    i2c: I,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Give the peripheral back (e.g. to re-initialise it).
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> BusTransaction for I2cBus<I> {
    fn read(&mut self, address: u8, register: u8, length: usize) -> Result<Frame, BusError> {
        if length > MAX_FRAME {
            return Err(BusError::FrameTooLong(length));
        }
        let mut buf = [0u8; MAX_FRAME];
        self.i2c
            .write_read(address, &[register], &mut buf[..length])
            .map_err(|e| BusError::I2c {
                address,
                kind: e.kind(),
            })?;
        Frame::from_slice(&buf[..length]).map_err(|_| BusError::FrameTooLong(length))
    }

    fn write(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        let mut buf = [0u8; MAX_FRAME + 1];
        if bytes.len() > MAX_FRAME {
            return Err(BusError::FrameTooLong(bytes.len()));
        }
        buf[0] = register;
        buf[1..=bytes.len()].copy_from_slice(bytes);
        self.i2c
            .write(address, &buf[..=bytes.len()])
            .map_err(|e| BusError::I2c {
                address,
                kind: e.kind(),
            })
    }
}
