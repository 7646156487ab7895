//! 16-bit I2C IO expander (TCA9535-style) driving the rig's relays.
//!
//! Register map: output port 0/1 at 2/3, direction port 0/1 at 6/7
//! (0 = output). The output latch is cached so a single line can be
//! flipped without a read-modify-write on the wire; every [`ExpanderLine`]
//! shares the cache of the expander it came from.

use std::sync::{Arc, Mutex};

use log::info;

use super::Actuator;
use crate::bus::{BusTransaction, SharedBus};
use crate::error::{ActuatorError, BusError, ConfigError};

const OUTPUT_REGISTER: u8 = 0x02;
const DIRECTION_REGISTER: u8 = 0x06;

pub struct IoExpander<B> {
    bus: SharedBus<B>,
    address: u8,
    latch: Arc<Mutex<[u8; 2]>>,
}

impl<B: BusTransaction> IoExpander<B> {
    pub fn new(bus: SharedBus<B>, address: u8) -> Self {
        Self {
            bus,
            address,
            latch: Arc::new(Mutex::new([0; 2])),
        }
    }

    /// Drive every line low, then make both ports outputs.
    pub fn init(&mut self) -> Result<(), BusError> {
        let mut latch = self.latch.lock().map_err(|_| BusError::Unavailable)?;
        *latch = [0; 2];
        self.bus.write(self.address, OUTPUT_REGISTER, &latch[..])?;
        self.bus.write(self.address, DIRECTION_REGISTER, &[0x00, 0x00])?;
        info!("IO expander 0x{:02X} ready, all lines low", self.address);
        Ok(())
    }

    /// Handle to one output bit. `port` is 0 or 1, `bit` 0-7.
    pub fn line(&self, port: u8, bit: u8) -> Result<ExpanderLine<B>, ConfigError> {
        if port > 1 || bit > 7 {
            return Err(ConfigError::ValidationFailed("expander line out of range"));
        }
        Ok(ExpanderLine {
            bus: self.bus.clone(),
            address: self.address,
            latch: Arc::clone(&self.latch),
            port,
            mask: 1 << bit,
        })
    }

    /// Cached output latch for ports 0 and 1.
    pub fn outputs(&self) -> [u8; 2] {
        self.latch.lock().map(|l| *l).unwrap_or([0; 2])
    }
}

/// One relay line of an [`IoExpander`].
pub struct ExpanderLine<B> {
    bus: SharedBus<B>,
    address: u8,
    latch: Arc<Mutex<[u8; 2]>>,
    port: u8,
    mask: u8,
}

impl<B: BusTransaction> ExpanderLine<B> {
    fn drive(&mut self, high: bool) -> Result<(), ActuatorError> {
        let mut latch = self.latch.lock().map_err(|_| BusError::Unavailable)?;
        let port = usize::from(self.port);
        let next = if high {
            latch[port] | self.mask
        } else {
            latch[port] & !self.mask
        };
        // Latch is only updated once the device has acknowledged.
        self.bus
            .write(self.address, OUTPUT_REGISTER + self.port, &[next])?;
        latch[port] = next;
        Ok(())
    }
}

impl<B: BusTransaction> Actuator for ExpanderLine<B> {
    fn on(&mut self) -> Result<(), ActuatorError> {
        self.drive(true)
    }

    fn off(&mut self) -> Result<(), ActuatorError> {
        self.drive(false)
    }
}
