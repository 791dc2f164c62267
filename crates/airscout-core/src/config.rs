//! Node configuration
//!
//! Everything the sensing core needs to know about the installed hardware is
//! carried in plain `Copy` structs and handed to the decoder and calibration
//! evaluator at construction. Nothing here is global or mutable.
//!
//! [`NodeConfig`] can be persisted with postcard so a field-measured baseline
//! resistance survives a reboot.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::pms5003::{FRAME_LEN, MAX_FIELD_OFFSET};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config encode failed: {0}")]
    Encode(postcard::Error),
    #[error("Config decode failed: {0}")]
    Decode(postcard::Error),
    #[error("Invalid config value: {field}")]
    Invalid { field: &'static str },
}

/// Frame decoder settings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Maximum bytes slipped per decode call while hunting for the start marker
    pub max_resync_scan: usize,
    /// Body offset of the first concentration field
    pub field_offset: usize,
}

impl DecoderConfig {
    /// Concentration fields start at the first body byte.
    pub const PMS5003: Self = Self {
        max_resync_scan: 4 * FRAME_LEN,
        field_offset: 0,
    };

    /// Body starts with the two-byte frame length word, fields follow it.
    pub const PMS5003_LENGTH_PREFIXED: Self = Self {
        max_resync_scan: 4 * FRAME_LEN,
        field_offset: 2,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resync_scan == 0 {
            return Err(ConfigError::Invalid {
                field: "decoder.max_resync_scan",
            });
        }
        if self.field_offset > MAX_FIELD_OFFSET {
            return Err(ConfigError::Invalid {
                field: "decoder.field_offset",
            });
        }
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::PMS5003
    }
}

/// Analog front-end of the resistive gas sensors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CircuitConfig {
    /// ADC reference / sensor supply voltage [V]
    pub supply_voltage: f32,
    /// Load resistor in the divider [kΩ]
    pub load_resistance: f32,
    /// Full-scale ADC code (1023 for a 10-bit converter)
    pub adc_max: u16,
}

impl CircuitConfig {
    pub const REFERENCE: Self = Self {
        supply_voltage: 3.3,
        load_resistance: 10.0,
        adc_max: 1023,
    };
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Power-law response curve: `ppm = coefficient * (Rs / R0) ^ exponent`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    /// Baseline sensor resistance in clean air, R0 [kΩ]
    pub reference_resistance: f32,
    pub coefficient: f32,
    pub exponent: f32,
}

impl CurveParams {
    pub const CARBON_MONOXIDE: Self = Self {
        reference_resistance: 10.0,
        coefficient: 116.6,
        exponent: -2.769,
    };

    pub const NITROGEN_DIOXIDE: Self = Self {
        reference_resistance: 10.0,
        coefficient: 0.4,
        exponent: 1.4,
    };

    /// Same curve with a field-measured baseline resistance.
    pub const fn with_reference_resistance(self, reference_resistance: f32) -> Self {
        Self {
            reference_resistance,
            ..self
        }
    }
}

/// Calibration constants for every gas channel on the node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    pub circuit: CircuitConfig,
    pub carbon_monoxide: CurveParams,
    pub nitrogen_dioxide: CurveParams,
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f32, field: &'static str| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid { field })
            }
        };

        positive(self.circuit.supply_voltage, "circuit.supply_voltage")?;
        positive(self.circuit.load_resistance, "circuit.load_resistance")?;
        if self.circuit.adc_max == 0 {
            return Err(ConfigError::Invalid {
                field: "circuit.adc_max",
            });
        }
        positive(
            self.carbon_monoxide.reference_resistance,
            "carbon_monoxide.reference_resistance",
        )?;
        positive(
            self.nitrogen_dioxide.reference_resistance,
            "nitrogen_dioxide.reference_resistance",
        )?;
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitConfig::REFERENCE,
            carbon_monoxide: CurveParams::CARBON_MONOXIDE,
            nitrogen_dioxide: CurveParams::NITROGEN_DIOXIDE,
        }
    }
}

/// Polling cadence used by the aggregator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    pub sample_interval_ms: u32,
    pub sync_interval_ms: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 30_000,
            sync_interval_ms: 900_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeConfig {
    pub sampling: SamplingConfig,
    pub decoder: DecoderConfig,
    pub calibration: CalibrationConfig,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sampling.sample_interval_ms",
            });
        }
        self.decoder.validate()?;
        self.calibration.validate()
    }

    /// Serialize into `buf`, returning the used prefix.
    pub fn to_postcard<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(ConfigError::Encode)
    }

    /// Deserialize and validate a stored config.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }
}
