//! Background sensor acquisition.
//!
//! A poller thread owns the [`SensorHub`] and its bus handle and publishes
//! each complete [`SensorFrame`] into a single-slot cell. The control tick
//! takes the newest frame; if none arrived since the last tick it reuses
//! the previous one (same sequence number, so the safety supervisor does
//! not double-count read failures).
//!
//! ```text
//!   poller thread:  acquire ─► SnapshotCell::publish ─┐   (overwrites)
//!   control tick:   PolledSensors::acquire ◄──────────┘   take or reuse
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::app::ports::SensorPort;
use crate::bus::BusTransaction;
use crate::drivers::task;
use crate::sensors::{SensorFrame, SensorHub};

const POLLER_STACK_KB: usize = 64;

/// Single-slot, latest-wins frame mailbox.
pub struct SnapshotCell {
    slot: Signal<CriticalSectionRawMutex, SensorFrame>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCell {
    pub const fn new() -> Self {
        Self {
            slot: Signal::new(),
        }
    }

    /// Replace whatever frame is waiting.
    pub fn publish(&self, frame: SensorFrame) {
        self.slot.signal(frame);
    }

    /// Take the waiting frame, if any.
    pub fn take(&self) -> Option<SensorFrame> {
        self.slot.try_take()
    }
}

// ---------------------------------------------------------------------------
// Sensor ports
// ---------------------------------------------------------------------------

/// Acquire on the control thread itself.
pub struct DirectSensors<B> {
    hub: SensorHub,
    bus: B,
}

impl<B: BusTransaction> DirectSensors<B> {
    pub fn new(hub: SensorHub, bus: B) -> Self {
        Self { hub, bus }
    }
}

impl<B: BusTransaction> SensorPort for DirectSensors<B> {
    fn acquire(&mut self) -> SensorFrame {
        self.hub.acquire(&mut self.bus)
    }
}

/// Read frames published by a [`Poller`].
pub struct PolledSensors {
    cell: Arc<SnapshotCell>,
    last: SensorFrame,
}

impl PolledSensors {
    pub fn new(cell: Arc<SnapshotCell>, initial: SensorFrame) -> Self {
        Self {
            cell,
            last: initial,
        }
    }
}

impl SensorPort for PolledSensors {
    fn acquire(&mut self) -> SensorFrame {
        if let Some(frame) = self.cell.take() {
            self.last = frame;
        }
        self.last.clone()
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Handle to a running acquisition thread.
pub struct Poller<B> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(SensorHub, B)>,
}

impl<B> Poller<B> {
    /// Stop after the current acquisition and hand the hub and bus back.
    pub fn stop(self) -> Option<(SensorHub, B)> {
        self.stop.store(true, Ordering::Release);
        match self.handle.join() {
            Ok(parts) => Some(parts),
            Err(_) => {
                warn!("sensor poller panicked; bus handle lost");
                None
            }
        }
    }
}

/// Start polling `hub` on `bus` every `interval`.
pub fn spawn_poller<B>(
    mut hub: SensorHub,
    mut bus: B,
    interval: Duration,
) -> io::Result<(Poller<B>, PolledSensors)>
where
    B: BusTransaction + Send + 'static,
{
    let cell = Arc::new(SnapshotCell::new());
    let stop = Arc::new(AtomicBool::new(false));
    let sensors = PolledSensors::new(Arc::clone(&cell), hub.last_frame().clone());

    let thread_stop = Arc::clone(&stop);
    let handle = task::spawn_named("sensor-poll", POLLER_STACK_KB, move || {
        info!("sensor poller running every {:?}", interval);
        while !thread_stop.load(Ordering::Acquire) {
            cell.publish(hub.acquire(&mut bus));
            thread::sleep(interval);
        }
        info!("sensor poller stopped");
        (hub, bus)
    })?;

    Ok((Poller { stop, handle }, sensors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Frame;
    use crate::sensors::ChannelReading;

    fn frame(sequence: u64) -> SensorFrame {
        let mut f = SensorFrame {
            sequence,
            ..SensorFrame::default()
        };
        f.temperature
            .push(ChannelReading::fresh(Frame::new(), 20.0 + sequence as f32))
            .unwrap();
        f
    }

    #[test]
    fn cell_keeps_only_latest() {
        let cell = SnapshotCell::new();
        assert!(cell.take().is_none());
        cell.publish(frame(1));
        cell.publish(frame(2));
        assert_eq!(cell.take().map(|f| f.sequence), Some(2));
        assert!(cell.take().is_none());
    }

    #[test]
    fn polled_sensors_reuse_last_frame() {
        let cell = Arc::new(SnapshotCell::new());
        let mut sensors = PolledSensors::new(Arc::clone(&cell), SensorFrame::default());
        assert_eq!(sensors.acquire().sequence, 0);
        cell.publish(frame(7));
        assert_eq!(sensors.acquire().sequence, 7);
        assert_eq!(sensors.acquire().sequence, 7);
    }
}
