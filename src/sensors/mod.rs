//! Sensor subsystem: converter/thermometer drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every channel and produces a [`SensorFrame`] each
//! acquisition. Frames are replaced wholesale; nothing downstream mutates
//! a frame in place.
//!
//! ```text
//!   ADC 0x68 ch0..3 ─┐
//!   ADC 0x69 ch4..7 ─┼─► SensorHub::acquire ─► SensorFrame { seq, V[], I[], T[], flow }
//!   TMP 0x48..0x4B  ─┘        (last-known-good on BusError)
//! ```

pub mod adc;
pub mod calibration;
pub mod temperature;

use core::fmt;

use heapless::Vec;
use log::warn;

use crate::bus::{BusTransaction, Frame};
use crate::config::{AnalogChannelConfig, SensorConfig};
use crate::error::{BusError, ConfigError};
use adc::{AdcChannel, Gain, Resolution};
use calibration::LinearTransfer;
use temperature::TemperatureSensor;

/// Channels per quantity (four cells on the H-100 rig).
pub const MAX_CHANNELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Voltage,
    Current,
    Temperature,
    Flow,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Temperature => "temperature",
            Self::Flow => "flow",
        })
    }
}

/// Addresses one reading inside a [`SensorFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelId {
    pub kind: ChannelKind,
    pub index: u8,
}

impl ChannelId {
    pub const fn new(kind: ChannelKind, index: u8) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingStatus {
    /// Read successfully this acquisition.
    Fresh,
    /// Bus error this acquisition; value is the last known good.
    Retained,
    /// Never read successfully.
    Missing,
}

#[derive(Debug, Clone)]
pub struct ChannelReading {
    pub raw: Frame,
    pub value: f32,
    pub status: ReadingStatus,
}

impl ChannelReading {
    pub fn fresh(raw: Frame, value: f32) -> Self {
        Self {
            raw,
            value,
            status: ReadingStatus::Fresh,
        }
    }

    pub fn missing() -> Self {
        Self {
            raw: Frame::new(),
            value: 0.0,
            status: ReadingStatus::Missing,
        }
    }

    /// Scaled value, unless the channel has never produced one.
    pub fn value(&self) -> Option<f32> {
        match self.status {
            ReadingStatus::Missing => None,
            _ => Some(self.value),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.status == ReadingStatus::Fresh
    }

    /// Demote to last-known-good after a failed read.
    fn retained(&self) -> Self {
        let status = match self.status {
            ReadingStatus::Missing => ReadingStatus::Missing,
            _ => ReadingStatus::Retained,
        };
        Self {
            raw: self.raw.clone(),
            value: self.value,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Everything measured in one acquisition.
#[derive(Debug, Clone, Default)]
pub struct SensorFrame {
    /// Increments on every acquisition.
    pub sequence: u64,
    pub voltage: Vec<ChannelReading, MAX_CHANNELS>,
    pub current: Vec<ChannelReading, MAX_CHANNELS>,
    pub temperature: Vec<ChannelReading, MAX_CHANNELS>,
    pub flow: Option<ChannelReading>,
}

impl SensorFrame {
    pub fn get(&self, id: ChannelId) -> Option<&ChannelReading> {
        let index = usize::from(id.index);
        match id.kind {
            ChannelKind::Voltage => self.voltage.get(index),
            ChannelKind::Current => self.current.get(index),
            ChannelKind::Temperature => self.temperature.get(index),
            ChannelKind::Flow if index == 0 => self.flow.as_ref(),
            ChannelKind::Flow => None,
        }
    }

    /// Every reading in the frame, tagged with its id.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &ChannelReading)> {
        tagged(ChannelKind::Voltage, &self.voltage)
            .chain(tagged(ChannelKind::Current, &self.current))
            .chain(tagged(ChannelKind::Temperature, &self.temperature))
            .chain(tagged(ChannelKind::Flow, self.flow.as_slice()))
    }

    /// Stack voltage (first voltage channel).
    pub fn primary_voltage(&self) -> Option<f32> {
        self.voltage.first().and_then(ChannelReading::value)
    }

    /// Stack current (first current channel).
    pub fn primary_current(&self) -> Option<f32> {
        self.current.first().and_then(ChannelReading::value)
    }

    /// Per-pair electrical power `V[i] * I[i]` (W); `None` where either side is missing.
    pub fn power(&self) -> Vec<Option<f32>, MAX_CHANNELS> {
        self.voltage
            .iter()
            .zip(&self.current)
            .map(|(v, i)| Some(v.value()? * i.value()?))
            .collect()
    }

    /// Sum of the known pair powers (W).
    pub fn total_power(&self) -> f32 {
        self.power().iter().flatten().sum()
    }

    /// Hottest known stack temperature.
    pub fn max_temperature(&self) -> Option<f32> {
        self.temperature
            .iter()
            .filter_map(ChannelReading::value)
            .reduce(f32::max)
    }

    /// True when no required channel (voltage, current, temperature)
    /// produced a fresh read this acquisition.
    pub fn all_required_failed(&self) -> bool {
        let mut required = self
            .voltage
            .iter()
            .chain(&self.current)
            .chain(&self.temperature)
            .peekable();
        required.peek().is_some() && required.all(|r| !r.is_fresh())
    }

    /// True when every required channel has a value (fresh or retained).
    pub fn all_required_present(&self) -> bool {
        self.voltage
            .iter()
            .chain(&self.current)
            .chain(&self.temperature)
            .all(|r| r.value().is_some())
    }
}

fn tagged(
    kind: ChannelKind,
    list: &[ChannelReading],
) -> impl Iterator<Item = (ChannelId, &ChannelReading)> {
    list.iter()
        .enumerate()
        .map(move |(i, r)| (ChannelId::new(kind, i as u8), r))
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// One converter input with its transfer into physical units.
pub struct AnalogInput {
    pub adc: AdcChannel,
    pub transfer: LinearTransfer,
}

impl AnalogInput {
    fn from_config(
        sensors: &SensorConfig,
        resolution: Resolution,
        cfg: &AnalogChannelConfig,
    ) -> Result<Self, ConfigError> {
        let adc = AdcChannel::new(
            sensors.adc_primary_address,
            sensors.adc_secondary_address,
            cfg.channel,
            resolution,
            Gain::from_factor(cfg.gain)?,
        )?
        .with_reference(sensors.reference_voltage)
        .with_calibration(cfg.calibration)
        .with_max_ready_polls(sensors.max_ready_polls);
        Ok(Self {
            adc,
            transfer: cfg.transfer,
        })
    }

    fn read(&self, bus: &mut impl BusTransaction) -> Result<ChannelReading, BusError> {
        let sample = self.adc.read(bus)?;
        Ok(ChannelReading::fresh(sample.raw, self.transfer.apply(sample.volts)))
    }
}

/// Owns every sensor channel and keeps the last known good reading of each.
pub struct SensorHub {
    voltage: Vec<AnalogInput, MAX_CHANNELS>,
    current: Vec<AnalogInput, MAX_CHANNELS>,
    flow: Option<AnalogInput>,
    temperature: Vec<TemperatureSensor, MAX_CHANNELS>,
    last: SensorFrame,
}

impl SensorHub {
    pub fn from_config(cfg: &SensorConfig) -> Result<Self, ConfigError> {
        let resolution = Resolution::from_bits(cfg.resolution_bits)?;
        let analog = |list: &Vec<AnalogChannelConfig, MAX_CHANNELS>| {
            list.iter()
                .map(|c| AnalogInput::from_config(cfg, resolution, c))
                .collect::<Result<Vec<_, MAX_CHANNELS>, _>>()
        };
        let voltage = analog(&cfg.voltage)?;
        let current = analog(&cfg.current)?;
        let flow = cfg
            .flow
            .as_ref()
            .map(|c| AnalogInput::from_config(cfg, resolution, c))
            .transpose()?;
        let temperature = cfg
            .temperature_addresses
            .iter()
            .map(|&a| TemperatureSensor::new(a))
            .collect::<Result<Vec<_, MAX_CHANNELS>, _>>()?;

        let missing = |n: usize| (0..n).map(|_| ChannelReading::missing()).collect();
        let last = SensorFrame {
            sequence: 0,
            voltage: missing(voltage.len()),
            current: missing(current.len()),
            temperature: missing(temperature.len()),
            flow: flow.as_ref().map(|_| ChannelReading::missing()),
        };

        Ok(Self {
            voltage,
            current,
            flow,
            temperature,
            last,
        })
    }

    /// The most recent frame (sequence 0 before the first acquisition).
    pub fn last_frame(&self) -> &SensorFrame {
        &self.last
    }

    /// Read every channel once.
    ///
    /// A failing channel is logged and keeps its previous value marked
    /// [`ReadingStatus::Retained`]; one flaky sensor never stalls the loop.
    pub fn acquire(&mut self, bus: &mut impl BusTransaction) -> SensorFrame {
        let prev = &self.last;
        let mut next = SensorFrame {
            sequence: prev.sequence.wrapping_add(1),
            ..SensorFrame::default()
        };

        for (i, input) in self.voltage.iter().enumerate() {
            let r = settle(input.read(bus), &prev.voltage[i], ChannelKind::Voltage, i);
            let _ = next.voltage.push(r);
        }
        for (i, input) in self.current.iter().enumerate() {
            let r = settle(input.read(bus), &prev.current[i], ChannelKind::Current, i);
            let _ = next.current.push(r);
        }
        for (i, sensor) in self.temperature.iter().enumerate() {
            let read = sensor
                .read(bus)
                .map(|t| ChannelReading::fresh(t.raw, t.celsius));
            let r = settle(read, &prev.temperature[i], ChannelKind::Temperature, i);
            let _ = next.temperature.push(r);
        }
        if let (Some(input), Some(prev_flow)) = (&self.flow, &prev.flow) {
            next.flow = Some(settle(input.read(bus), prev_flow, ChannelKind::Flow, 0));
        }

        self.last = next.clone();
        next
    }
}

fn settle(
    read: Result<ChannelReading, BusError>,
    previous: &ChannelReading,
    kind: ChannelKind,
    index: usize,
) -> ChannelReading {
    match read {
        Ok(r) => r,
        Err(e) => {
            warn!("{kind}[{index}] read failed: {e}");
            previous.retained()
        }
    }
}
