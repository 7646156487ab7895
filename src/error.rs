//! Unified error types for the stack controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform. All variants are `Copy` so they
//! can be passed through the safety supervisor and FSM without allocation.

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bus transaction failed.
    Bus(BusError),
    /// A relay or valve line could not be driven.
    Actuator(ActuatorError),
    /// A safety interlock was violated.
    Safety(SafetyFault),
    /// A request or configuration value was rejected.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The underlying I2C peripheral reported an error.
    I2c { address: u8, kind: ErrorKind },
    /// Generic transaction failure (simulated or unclassified hardware).
    Io { address: u8 },
    /// The converter never cleared its not-ready flag within the poll budget.
    NotReady { address: u8, polls: u8 },
    /// The bus lock was poisoned by a panicking holder.
    Unavailable,
    /// Requested transfer exceeds the frame buffer.
    FrameTooLong(usize),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c { address, kind } => write!(f, "I2C error at 0x{address:02x}: {kind}"),
            Self::Io { address } => write!(f, "transaction failed at 0x{address:02x}"),
            Self::NotReady { address, polls } => {
                write!(f, "conversion not ready at 0x{address:02x} after {polls} polls")
            }
            Self::Unavailable => write!(f, "bus unavailable"),
            Self::FrameTooLong(len) => write!(f, "frame of {len} bytes exceeds buffer"),
        }
    }
}

impl core::error::Error for BusError {}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Writing the output line failed on the bus.
    Bus(BusError),
    /// The line driver rejected the write.
    WriteFailed(&'static str),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "output write failed: {e}"),
            Self::WriteFailed(line) => write!(f, "{line} write failed"),
        }
    }
}

impl core::error::Error for ActuatorError {}

impl From<BusError> for ActuatorError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults trigger a transition to Error from any running state.
/// They are accumulated in a bitfield by the safety supervisor so that
/// multiple simultaneous faults can be tracked and individually cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// A stack temperature exceeds the cutoff.
    OverTemperature = 0b0000_0001,
    /// A stack voltage is below the minimum.
    UnderVoltage = 0b0000_0010,
    /// A stack voltage is above the maximum.
    OverVoltage = 0b0000_0100,
    /// A stack current is above the configured maximum.
    OverCurrent = 0b0000_1000,
    /// A required channel failed too many consecutive reads.
    BusFault = 0b0001_0000,
    /// A relay or valve write failed.
    ActuatorFault = 0b0010_0000,
}

impl SafetyFault {
    pub const ALL: [Self; 6] = [
        Self::OverTemperature,
        Self::UnderVoltage,
        Self::OverVoltage,
        Self::OverCurrent,
        Self::BusFault,
        Self::ActuatorFault,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemperature => write!(f, "over temperature"),
            Self::UnderVoltage => write!(f, "under voltage"),
            Self::OverVoltage => write!(f, "over voltage"),
            Self::OverCurrent => write!(f, "over current"),
            Self::BusFault => write!(f, "repeated bus fault"),
            Self::ActuatorFault => write!(f, "actuator fault"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration / request errors
// ---------------------------------------------------------------------------

/// Rejected at the API boundary. The caller's request has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// ADC resolution must be 12, 14, 16 or 18 bits.
    InvalidResolution(u8),
    /// PGA gain must be 1, 2, 4 or 8.
    InvalidGain(u8),
    /// Channel index outside the configured range.
    InvalidChannel(u8),
    /// Device address outside the range for that device type.
    InvalidAddress(u8),
    /// State name did not match any controller state.
    UnknownState,
    /// Command text did not match on/off/reset.
    UnknownCommand,
    /// The request is not allowed in the current state.
    InvalidRequest(&'static str),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidResolution(bits) => write!(f, "unsupported ADC resolution: {bits} bits"),
            Self::InvalidGain(gain) => write!(f, "unsupported PGA gain: x{gain}"),
            Self::InvalidChannel(ch) => write!(f, "invalid channel: {ch}"),
            Self::InvalidAddress(addr) => write!(f, "invalid device address: 0x{addr:02x}"),
            Self::UnknownState => write!(f, "unknown state name"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::InvalidRequest(msg) => write!(f, "request rejected: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
