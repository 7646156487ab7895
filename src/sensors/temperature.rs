//! TMP102-style I2C temperature sensor (12-bit, 0.0625 °C/LSB).
//!
//! Four sensors sit on the stack at 0x48-0x4B. The temperature register
//! (pointer 0) returns two bytes, MSB first; the reading is the top 12
//! bits in two's complement.

use crate::bus::{self, BusTransaction, Frame, address};
use crate::error::{BusError, ConfigError};

const TEMPERATURE_REGISTER: u8 = 0x00;
const DEGREES_PER_LSB: f32 = 0.0625;

#[derive(Debug, Clone)]
pub struct TemperatureReading {
    pub raw: Frame,
    pub celsius: f32,
}

/// Decode the two register bytes into degrees Celsius.
pub fn decode_celsius(msb: u8, lsb: u8) -> f32 {
    // Arithmetic shift on the signed word sign-extends the 12-bit value.
    let word = i16::from_be_bytes([msb, lsb]) >> 4;
    f32::from(word) * DEGREES_PER_LSB
}

pub struct TemperatureSensor {
    address: u8,
}

impl TemperatureSensor {
    pub fn new(address: u8) -> Result<Self, ConfigError> {
        if !(address::TEMPERATURE_FIRST..=address::TEMPERATURE_LAST).contains(&address) {
            return Err(ConfigError::InvalidAddress(address));
        }
        Ok(Self { address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read(&self, bus: &mut impl BusTransaction) -> Result<TemperatureReading, BusError> {
        let raw = bus::with_one_retry(|| bus.read(self.address, TEMPERATURE_REGISTER, 2))?;
        let (msb, lsb) = match raw.as_slice() {
            [msb, lsb, ..] => (*msb, *lsb),
            _ => return Err(BusError::Io { address: self.address }),
        };
        Ok(TemperatureReading {
            celsius: decode_celsius(msb, lsb),
            raw,
        })
    }
}
