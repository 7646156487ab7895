//! Controller configuration parameters
//!
//! All tunable parameters for the stack controller. Defaults reproduce the
//! Horizon H-100 bench rig. Values can be overridden from a JSON file;
//! every loaded config goes through [`ControllerConfig::validate`].

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::bus::address;
use crate::error::ConfigError;
use crate::purge::WaterTrigger;
use crate::sensors::MAX_CHANNELS;
use crate::sensors::adc::{self, Gain, Resolution};
use crate::sensors::calibration::LinearTransfer;

/// Core controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub timing: TimingConfig,
    pub safety: SafetyLimits,
    pub purge: PurgeConfig,
    pub sensors: SensorConfig,
    pub outputs: OutputConfig,
    /// Consecutive read faults on one channel before forcing Error.
    pub fault_escalation_count: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Control loop interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Duration of the startup ramp (seconds)
    pub start_time_secs: f32,
    /// Duration of the shutdown ramp (seconds)
    pub stop_time_secs: f32,
    /// Background acquisition interval (milliseconds), when polling is offloaded
    pub poll_interval_ms: u32,
}

/// Immutable safety envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Any stack temperature above this trips Error (°C)
    pub temperature_cutoff_c: f32,
    pub voltage_min: f32,
    pub voltage_max: f32,
    /// Optional over-current trip (A)
    pub current_max: Option<f32>,
    /// Under-voltage is ignored for this long after entering Startup (s)
    pub voltage_grace_secs: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeConfig {
    pub strategy: PurgeStrategyConfig,
    /// Nominal purge interval (seconds)
    pub frequency_secs: f32,
    /// Valve open time per purge (seconds)
    pub duration_secs: f32,
    pub min_frequency_secs: f32,
    pub max_frequency_secs: f32,
    pub min_duration_secs: f32,
    pub max_duration_secs: f32,
}

/// Which purge strategy to run, with its tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurgeStrategyConfig {
    Fixed,
    PowerBased {
        /// Interval at zero load (s)
        base_secs: f32,
        /// Interval reduction per watt (s/W)
        secs_per_watt: f32,
    },
    PolarizationBased {
        base_secs: f32,
        kp: f32,
        ki: f32,
        kd: f32,
        /// Polarization fit: target = slope * current + intercept
        slope: f32,
        intercept: f32,
    },
    WaterAccumulation {
        /// Cells in series
        cells: u16,
        /// Anode relative humidity (0-1)
        relative_humidity: f32,
        /// Fractional voltage loss per gram of retained water
        loss_per_gram: f32,
        /// Purge threshold (V), compared as selected by `trigger`
        threshold_volts: f32,
        #[serde(default)]
        trigger: WaterTrigger,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogChannelConfig {
    /// Global ADC channel 0-7
    pub channel: u8,
    /// PGA gain 1/2/4/8
    pub gain: u8,
    /// Multiplier applied to converter volts
    pub calibration: f32,
    pub transfer: LinearTransfer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub adc_primary_address: u8,
    pub adc_secondary_address: u8,
    pub resolution_bits: u8,
    pub reference_voltage: f32,
    /// Bound on not-ready polls per conversion
    pub max_ready_polls: u8,
    pub voltage: Vec<AnalogChannelConfig, MAX_CHANNELS>,
    pub current: Vec<AnalogChannelConfig, MAX_CHANNELS>,
    pub flow: Option<AnalogChannelConfig>,
    pub temperature_addresses: Vec<u8, MAX_CHANNELS>,
}

/// Where the h2 / fan / purge relays sit on the IO expander.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputConfig {
    pub expander_address: u8,
    /// (port, bit)
    pub h2_line: (u8, u8),
    pub fan_line: (u8, u8),
    pub purge_line: (u8, u8),
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            safety: SafetyLimits::default(),
            purge: PurgeConfig::default(),
            sensors: SensorConfig::default(),
            outputs: OutputConfig::default(),
            fault_escalation_count: 3,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100, // 10 Hz
            start_time_secs: 3.0,
            stop_time_secs: 10.0,
            poll_interval_ms: 50,
        }
    }
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            temperature_cutoff_c: 30.0,
            voltage_min: 12.0,
            voltage_max: 27.0,
            current_max: Some(10.0),
            voltage_grace_secs: 0.0,
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            strategy: PurgeStrategyConfig::Fixed,
            frequency_secs: 30.0,
            duration_secs: 0.5,
            min_frequency_secs: 5.0,
            max_frequency_secs: 60.0,
            min_duration_secs: 0.1,
            max_duration_secs: 5.0,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        let mut voltage = Vec::new();
        let mut current = Vec::new();
        // Capacity is MAX_CHANNELS; one entry each cannot overflow.
        let _ = current.push(AnalogChannelConfig {
            channel: 0,
            gain: 1,
            calibration: 1.0,
            transfer: LinearTransfer::stack_current(),
        });
        let _ = voltage.push(AnalogChannelConfig {
            channel: 1,
            gain: 1,
            calibration: 1.0,
            transfer: LinearTransfer::stack_voltage(),
        });
        let temperature_addresses =
            Vec::from_slice(&[0x48, 0x49, 0x4A, 0x4B]).unwrap_or_default();

        Self {
            adc_primary_address: address::ADC_PRIMARY,
            adc_secondary_address: address::ADC_SECONDARY,
            resolution_bits: 12,
            reference_voltage: adc::DEFAULT_REFERENCE_VOLTAGE,
            max_ready_polls: adc::DEFAULT_MAX_READY_POLLS,
            voltage,
            current,
            flow: None,
            temperature_addresses,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            expander_address: address::IO_EXPANDER,
            h2_line: (1, 0),
            fan_line: (1, 1),
            purge_line: (1, 2),
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|_| ConfigError::ValidationFailed("malformed config JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        if t.tick_interval_ms == 0 || t.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("intervals must be non-zero"));
        }
        if !(t.start_time_secs >= 0.0 && t.stop_time_secs >= 0.0) {
            return Err(ConfigError::ValidationFailed("ramp times must be non-negative"));
        }

        let s = &self.safety;
        if !(s.voltage_min < s.voltage_max) {
            return Err(ConfigError::ValidationFailed("voltage_min must be below voltage_max"));
        }
        if !s.temperature_cutoff_c.is_finite() {
            return Err(ConfigError::ValidationFailed("temperature cutoff must be finite"));
        }
        if s.current_max.is_some_and(|max| !(max > 0.0)) {
            return Err(ConfigError::ValidationFailed("current_max must be positive"));
        }
        if !(s.voltage_grace_secs >= 0.0) {
            return Err(ConfigError::ValidationFailed("voltage grace must be non-negative"));
        }

        let p = &self.purge;
        if !(p.min_frequency_secs > 0.0 && p.min_frequency_secs <= p.max_frequency_secs) {
            return Err(ConfigError::ValidationFailed("purge frequency bounds"));
        }
        if !(p.min_duration_secs > 0.0 && p.min_duration_secs <= p.max_duration_secs) {
            return Err(ConfigError::ValidationFailed("purge duration bounds"));
        }
        if !(p.duration_secs > 0.0 && p.frequency_secs > 0.0) {
            return Err(ConfigError::ValidationFailed("purge frequency and duration must be positive"));
        }
        if let PurgeStrategyConfig::WaterAccumulation {
            cells,
            relative_humidity,
            threshold_volts,
            ..
        } = p.strategy
        {
            if cells == 0 || !(0.0..=1.0).contains(&relative_humidity) || !(threshold_volts > 0.0) {
                return Err(ConfigError::ValidationFailed("water accumulation parameters"));
            }
        }

        let sn = &self.sensors;
        Resolution::from_bits(sn.resolution_bits)?;
        for addr in [sn.adc_primary_address, sn.adc_secondary_address] {
            if !(0x68..=0x6F).contains(&addr) {
                return Err(ConfigError::InvalidAddress(addr));
            }
        }
        if sn.max_ready_polls == 0 {
            return Err(ConfigError::ValidationFailed("max_ready_polls must be non-zero"));
        }
        if sn.voltage.is_empty() || sn.current.is_empty() {
            return Err(ConfigError::ValidationFailed("at least one voltage and current channel"));
        }
        for ch in sn.voltage.iter().chain(&sn.current).chain(&sn.flow) {
            if ch.channel > 7 {
                return Err(ConfigError::InvalidChannel(ch.channel));
            }
            Gain::from_factor(ch.gain)?;
            if ch.transfer.divisor == 0.0 {
                return Err(ConfigError::ValidationFailed("transfer divisor must be non-zero"));
            }
        }
        for &addr in &sn.temperature_addresses {
            if !(address::TEMPERATURE_FIRST..=address::TEMPERATURE_LAST).contains(&addr) {
                return Err(ConfigError::InvalidAddress(addr));
            }
        }

        let o = &self.outputs;
        for (port, bit) in [o.h2_line, o.fan_line, o.purge_line] {
            if port > 1 || bit > 7 {
                return Err(ConfigError::ValidationFailed("expander line out of range"));
            }
        }
        if o.h2_line == o.fan_line || o.h2_line == o.purge_line || o.fan_line == o.purge_line {
            return Err(ConfigError::ValidationFailed("expander lines must be distinct"));
        }

        if self.fault_escalation_count == 0 {
            return Err(ConfigError::ValidationFailed("fault_escalation_count must be non-zero"));
        }
        Ok(())
    }

    /// Seconds per control tick.
    pub fn tick_secs(&self) -> f64 {
        f64::from(self.timing.tick_interval_ms) / 1000.0
    }
}
