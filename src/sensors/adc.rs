//! MCP3424-style delta-sigma ADC channel decoder.
//!
//! Each converter exposes four differential channels. A conversion is
//! started by writing the configuration byte; the result comes back as
//! two or three data bytes followed by a status byte whose high bit is
//! the *not ready* flag:
//!
//! ```text
//!  12/14/16-bit:  [ D_hi | D_lo | status ]
//!  18-bit:        [ D_hi | D_mid | D_lo | status ]
//! ```
//!
//! The top data byte carries the sign-extended MSB, so only its low
//! `bits - 8 * (data_bytes - 1)` bits belong to the magnitude.

use crate::bus::{self, BusTransaction, Frame};
use crate::error::{BusError, ConfigError};

/// Converter internal reference (V). One LSB is `REF / 2^(bits-1)`.
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 2.048;

/// Default bound on not-ready status polls per conversion.
pub const DEFAULT_MAX_READY_POLLS: u8 = 8;

const CONFIG_NOT_READY: u8 = 0x80;
const CONFIG_CONTINUOUS: u8 = 0x10;
const STATUS_NOT_READY: u8 = 0x80;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Bits12,
    Bits14,
    Bits16,
    Bits18,
}

impl Resolution {
    pub const ALL: [Self; 4] = [Self::Bits12, Self::Bits14, Self::Bits16, Self::Bits18];

    pub fn from_bits(bits: u8) -> Result<Self, ConfigError> {
        match bits {
            12 => Ok(Self::Bits12),
            14 => Ok(Self::Bits14),
            16 => Ok(Self::Bits16),
            18 => Ok(Self::Bits18),
            other => Err(ConfigError::InvalidResolution(other)),
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits12 => 12,
            Self::Bits14 => 14,
            Self::Bits16 => 16,
            Self::Bits18 => 18,
        }
    }

    /// Bytes returned per conversion, status byte included.
    pub const fn frame_len(self) -> usize {
        match self {
            Self::Bits18 => 4,
            _ => 3,
        }
    }

    const fn data_len(self) -> usize {
        self.frame_len() - 1
    }

    /// Mask applied to the top data byte.
    pub const fn top_mask(self) -> u8 {
        let top_bits = self.bits() - 8 * (self.data_len() as u32 - 1);
        ((1u16 << top_bits) - 1) as u8
    }

    /// Sample-rate selection bits (S1:S0) in the config byte.
    const fn rate_code(self) -> u8 {
        match self {
            Self::Bits12 => 0,
            Self::Bits14 => 1,
            Self::Bits16 => 2,
            Self::Bits18 => 3,
        }
    }

    /// Scaling divisor: number of codes on one side of zero.
    pub fn divisor(self) -> f32 {
        (1u32 << (self.bits() - 1)) as f32
    }

    /// Representable code range `[min, max]`.
    pub const fn code_range(self) -> (i32, i32) {
        let half = 1i32 << (self.bits() - 1);
        (-half, half - 1)
    }
}

// ---------------------------------------------------------------------------
// Gain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    X1,
    X2,
    X4,
    X8,
}

impl Gain {
    pub fn from_factor(factor: u8) -> Result<Self, ConfigError> {
        match factor {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            other => Err(ConfigError::InvalidGain(other)),
        }
    }

    pub const fn factor(self) -> u8 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::X1 => 0,
            Self::X2 => 1,
            Self::X4 => 2,
            Self::X8 => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Pure frame codec
// ---------------------------------------------------------------------------

/// True if the status byte of `frame` says the conversion is still running.
pub fn is_not_ready(frame: &[u8], resolution: Resolution) -> bool {
    frame
        .get(resolution.data_len())
        .is_none_or(|status| status & STATUS_NOT_READY != 0)
}

/// Decode a ready frame into a signed converter code.
///
/// Returns `None` if the frame is shorter than the resolution requires.
pub fn decode_frame(frame: &[u8], resolution: Resolution) -> Option<i32> {
    let data = frame.get(..resolution.data_len())?;
    let top = data[0];
    let magnitude = data[1..]
        .iter()
        .fold(i32::from(top & resolution.top_mask()), |acc, &b| {
            (acc << 8) | i32::from(b)
        });
    if top & 0x80 != 0 {
        Some(-((1i32 << resolution.bits()) - magnitude))
    } else {
        Some(magnitude)
    }
}

/// Encode a converter code into a ready frame (sign-extended top byte,
/// status byte clear). Codes outside the range are saturated.
pub fn encode_frame(code: i32, resolution: Resolution) -> Frame {
    let (min, max) = resolution.code_range();
    let code = code.clamp(min, max);
    let width_mask = (1u32 << resolution.bits()) - 1;
    let raw = (code as u32) & width_mask;

    let data_len = resolution.data_len();
    let mut frame = Frame::new();
    for i in (0..data_len).rev() {
        let mut byte = (raw >> (8 * i)) as u8;
        if i == data_len - 1 && code < 0 {
            byte |= !resolution.top_mask();
        }
        // Frame capacity is larger than any resolution's frame length.
        let _ = frame.push(byte);
    }
    let _ = frame.push(0x00);
    frame
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// One converter input, bound to an address, resolution and calibration.
#[derive(Debug, Clone, Copy)]
pub struct AdcChannel {
    address: u8,
    channel: u8,
    resolution: Resolution,
    gain: Gain,
    reference_voltage: f32,
    calibration: f32,
    max_ready_polls: u8,
}

/// Result of a single conversion.
#[derive(Debug, Clone)]
pub struct AdcSample {
    pub raw: Frame,
    pub code: i32,
    /// Calibrated input voltage (V).
    pub volts: f32,
}

impl AdcChannel {
    /// Bind global channel `0..=7` (0-3 on `primary`, 4-7 on `secondary`).
    pub fn new(
        primary: u8,
        secondary: u8,
        channel: u8,
        resolution: Resolution,
        gain: Gain,
    ) -> Result<Self, ConfigError> {
        let address = match channel {
            0..=3 => primary,
            4..=7 => secondary,
            other => return Err(ConfigError::InvalidChannel(other)),
        };
        if !(0x68..=0x6F).contains(&address) {
            return Err(ConfigError::InvalidAddress(address));
        }
        Ok(Self {
            address,
            channel: channel % 4,
            resolution,
            gain,
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            calibration: 1.0,
            max_ready_polls: DEFAULT_MAX_READY_POLLS,
        })
    }

    pub fn with_calibration(mut self, multiplier: f32) -> Self {
        self.calibration = multiplier;
        self
    }

    pub fn with_reference(mut self, volts: f32) -> Self {
        self.reference_voltage = volts;
        self
    }

    pub fn with_max_ready_polls(mut self, polls: u8) -> Self {
        self.max_ready_polls = polls.max(1);
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Configuration byte: start, channel, continuous mode, rate, gain.
    pub fn config_byte(&self) -> u8 {
        CONFIG_NOT_READY
            | (self.channel << 5)
            | CONFIG_CONTINUOUS
            | (self.resolution.rate_code() << 2)
            | self.gain.code()
    }

    /// Volts per converter code after calibration and gain.
    pub fn scale(&self) -> f32 {
        self.reference_voltage / self.resolution.divisor() * self.calibration
            / f32::from(self.gain.factor())
    }

    /// Convert a decoded code into calibrated volts.
    pub fn code_to_volts(&self, code: i32) -> f32 {
        code as f32 * self.scale()
    }

    /// Select the channel and read one conversion.
    ///
    /// Each bus transaction gets one retry; the ready poll is bounded by
    /// `max_ready_polls` and surfaces [`BusError::NotReady`] when spent.
    pub fn read(&self, bus: &mut impl BusTransaction) -> Result<AdcSample, BusError> {
        let config = self.config_byte();
        bus::with_one_retry(|| bus.write(self.address, config, &[]))?;

        let len = self.resolution.frame_len();
        for _ in 0..self.max_ready_polls {
            let frame = bus::with_one_retry(|| bus.read(self.address, config, len))?;
            // A short read has no status byte and counts as a busy poll.
            let code = match decode_frame(&frame, self.resolution) {
                Some(code) if !is_not_ready(&frame, self.resolution) => code,
                _ => continue,
            };
            return Ok(AdcSample {
                volts: self.code_to_volts(code),
                code,
                raw: frame,
            });
        }
        Err(BusError::NotReady {
            address: self.address,
            polls: self.max_ready_polls,
        })
    }
}
