//! Mutex-guarded bus handle.
//!
//! Clones share one underlying bus; each transaction holds the lock for
//! its whole duration so a background poller and the control tick can
//! never interleave bytes on the wire.

use std::sync::{Arc, Mutex};

use super::{BusTransaction, Frame};
use crate::error::BusError;

pub struct SharedBus<B> {
    inner: Arc<Mutex<B>>,
}

impl<B> Clone for SharedBus<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: BusTransaction> SharedBus<B> {
    pub fn new(bus: B) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    /// Run several transactions back to back under one lock.
    pub fn exclusive<T>(&self, f: impl FnOnce(&mut B) -> T) -> Result<T, BusError> {
        let mut guard = self.inner.lock().map_err(|_| BusError::Unavailable)?;
        Ok(f(&mut guard))
    }
}

impl<B: BusTransaction> BusTransaction for SharedBus<B> {
    fn read(&mut self, address: u8, register: u8, length: usize) -> Result<Frame, BusError> {
        self.exclusive(|bus| bus.read(address, register, length))?
    }

    fn write(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.exclusive(|bus| bus.write(address, register, bytes))?
    }
}
