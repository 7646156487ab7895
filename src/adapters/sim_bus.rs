//! Simulated rig bus.
//!
//! Answers the same register protocol as the real devices so the whole
//! controller (drivers included) runs on a host without hardware:
//!
//! | Address     | Device            | Model                                  |
//! |-------------|-------------------|----------------------------------------|
//! | 0x68 / 0x69 | MCP3424 ADC       | per-input volts, config byte decoded   |
//! | 0x48..0x4B  | TMP102            | per-sensor °C, 12-bit register         |
//! | 0x20        | TCA9535 expander  | eight registers, writes stored         |
//!
//! Faults are injected per address; an injected address fails every
//! transaction until cleared.

use std::collections::{HashMap, HashSet};

use crate::bus::{BusTransaction, Frame, address};
use crate::error::BusError;
use crate::sensors::adc::{self, Resolution};

const EXPANDER_REGISTERS: usize = 8;

pub struct SimBus {
    /// Converter input volts keyed by (address, local channel).
    inputs: HashMap<(u8, u8), f32>,
    temperatures: HashMap<u8, f32>,
    expander: [u8; EXPANDER_REGISTERS],
    reference_voltage: f32,
    failing: HashSet<u8>,
    not_ready_polls: u8,
    pending_polls: u8,
    transactions: u64,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            temperatures: HashMap::new(),
            expander: [0; EXPANDER_REGISTERS],
            reference_voltage: adc::DEFAULT_REFERENCE_VOLTAGE,
            failing: HashSet::new(),
            not_ready_polls: 0,
            pending_polls: 0,
            transactions: 0,
        }
    }

    /// Volts at global converter input `0..=7` (4-7 on the second ADC).
    pub fn set_adc_input(&mut self, channel: u8, volts: f32) {
        let addr = if channel < 4 {
            address::ADC_PRIMARY
        } else {
            address::ADC_SECONDARY
        };
        self.inputs.insert((addr, channel % 4), volts);
    }

    pub fn set_temperature(&mut self, addr: u8, celsius: f32) {
        self.temperatures.insert(addr, celsius);
    }

    /// Every transaction at `addr` fails until [`clear_failure`](Self::clear_failure).
    pub fn fail_address(&mut self, addr: u8) {
        self.failing.insert(addr);
    }

    pub fn clear_failure(&mut self, addr: u8) {
        self.failing.remove(&addr);
    }

    /// Report not-ready this many times after each conversion start.
    pub fn set_not_ready_polls(&mut self, polls: u8) {
        self.not_ready_polls = polls;
    }

    /// Expander output latch for ports 0 and 1.
    pub fn expander_outputs(&self) -> [u8; 2] {
        [self.expander[2], self.expander[3]]
    }

    /// Level of one expander output line.
    pub fn line(&self, port: u8, bit: u8) -> bool {
        let reg = self.expander[2 + usize::from(port & 1)];
        reg & (1 << (bit & 7)) != 0
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    fn check(&mut self, addr: u8) -> Result<(), BusError> {
        self.transactions += 1;
        if self.failing.contains(&addr) {
            return Err(BusError::Io { address: addr });
        }
        Ok(())
    }

    fn conversion(&mut self, addr: u8, config: u8) -> Frame {
        let channel = (config >> 5) & 0x03;
        let resolution = Resolution::ALL[usize::from((config >> 2) & 0x03)];
        let gain = f32::from(1u8 << (config & 0x03));

        let volts = self.inputs.get(&(addr, channel)).copied().unwrap_or(0.0);
        let code = volts * gain * resolution.divisor() / self.reference_voltage;
        let mut frame = adc::encode_frame(code.round() as i32, resolution);

        // Status echoes channel, mode, rate and gain like the real part.
        let mut status = config & 0x7F;
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            status |= 0x80;
        }
        if let Some(last) = frame.last_mut() {
            *last = status;
        }
        frame
    }
}

/// 12-bit TMP102 register for `celsius`, saturated to the sensor range.
pub fn encode_celsius(celsius: f32) -> [u8; 2] {
    let counts = (celsius / 0.0625).round().clamp(-2048.0, 2047.0) as i16;
    (counts << 4).to_be_bytes()
}

impl BusTransaction for SimBus {
    fn read(&mut self, addr: u8, register: u8, length: usize) -> Result<Frame, BusError> {
        self.check(addr)?;
        let mut frame = match addr {
            0x68..=0x6F => self.conversion(addr, register),
            address::TEMPERATURE_FIRST..=address::TEMPERATURE_LAST => {
                let c = self.temperatures.get(&addr).copied().unwrap_or(25.0);
                Frame::from_slice(&encode_celsius(c)).map_err(|_| BusError::FrameTooLong(2))?
            }
            address::IO_EXPANDER => {
                let start = usize::from(register).min(EXPANDER_REGISTERS);
                let end = (start + length).min(EXPANDER_REGISTERS);
                Frame::from_slice(&self.expander[start..end])
                    .map_err(|_| BusError::FrameTooLong(length))?
            }
            _ => return Err(BusError::Io { address: addr }),
        };
        frame
            .resize(length, 0)
            .map_err(|_| BusError::FrameTooLong(length))?;
        Ok(frame)
    }

    fn write(&mut self, addr: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.check(addr)?;
        match addr {
            0x68..=0x6F => {
                self.pending_polls = self.not_ready_polls;
                Ok(())
            }
            address::IO_EXPANDER => {
                let start = usize::from(register);
                if start + bytes.len() > EXPANDER_REGISTERS {
                    return Err(BusError::FrameTooLong(bytes.len()));
                }
                self.expander[start..start + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(BusError::Io { address: addr }),
        }
    }
}
