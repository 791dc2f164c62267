//! Resistive gas sensor calibration
//!
//! Converts raw ADC codes from the MQ-style analog gas sensors into
//! concentrations. The sensor sits in a divider with a load resistor; the ADC
//! measures the voltage across the load:
//!
//! ```text
//! V   = raw / adc_max * Vcc
//! Rs  = Vcc * RL / V - RL
//! ppm = coefficient * (Rs / R0) ^ exponent
//! ```
//!
//! `R0` is the sensor's resistance in clean air, taken from [`CurveParams`].
//! A zero reading divides by zero and is reported as
//! [`CalibrationError::UndefinedReading`] so the aggregator can record missing
//! data instead of a measured zero. At full scale `Rs` is zero: curves with a
//! positive exponent read 0 ppm there, negative exponents are undefined.

use log::debug;
use serde::Serialize;
use thiserror_no_std::Error;

use crate::config::{CalibrationConfig, CircuitConfig, CurveParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalibrationError {
    /// The reading does not map to a finite concentration
    #[error("Undefined reading (raw: {raw})")]
    UndefinedReading { raw: u16 },

    /// The reading exceeds the converter's full scale
    #[error("ADC reading out of range (raw: {raw}, max: {max})")]
    OutOfRange { raw: u16, max: u16 },
}

/// Gas channels fitted to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasKind {
    CarbonMonoxide,
    NitrogenDioxide,
}

impl GasKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CarbonMonoxide => "CO",
            Self::NitrogenDioxide => "NO2",
        }
    }
}

/// Sensor resistance `Rs` [kΩ] behind a raw ADC code.
pub fn sensor_resistance(circuit: &CircuitConfig, raw: u16) -> Result<f32, CalibrationError> {
    if raw > circuit.adc_max {
        return Err(CalibrationError::OutOfRange {
            raw,
            max: circuit.adc_max,
        });
    }
    if raw == 0 {
        return Err(CalibrationError::UndefinedReading { raw });
    }
    // Whole supply across the load resistor.
    if raw == circuit.adc_max {
        return Ok(0.0);
    }

    let voltage = (raw as f32 / circuit.adc_max as f32) * circuit.supply_voltage;
    let resistance =
        (circuit.supply_voltage * circuit.load_resistance) / voltage - circuit.load_resistance;

    // V never exceeds Vcc, so anything below zero is rounding.
    if resistance.is_finite() {
        Ok(resistance.max(0.0))
    } else {
        Err(CalibrationError::UndefinedReading { raw })
    }
}

/// Evaluate one power-law calibration curve for a raw ADC code.
pub fn calibration_curve(
    curve: &CurveParams,
    circuit: &CircuitConfig,
    raw: u16,
) -> Result<f32, CalibrationError> {
    let ratio = sensor_resistance(circuit, raw)? / curve.reference_resistance;
    let ppm = curve.coefficient * libm::powf(ratio, curve.exponent);

    if ppm.is_finite() {
        Ok(ppm)
    } else {
        Err(CalibrationError::UndefinedReading { raw })
    }
}

/// Gas concentrations for one sampling cycle [ppm].
///
/// `None` marks a channel whose reading was undefined or out of range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GasReadings {
    pub co_ppm: Option<f32>,
    pub no2_ppm: Option<f32>,
}

/// Calibration evaluator bound to one node's constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationEvaluator {
    config: CalibrationConfig,
}

impl CalibrationEvaluator {
    pub const fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub const fn curve(&self, kind: GasKind) -> &CurveParams {
        match kind {
            GasKind::CarbonMonoxide => &self.config.carbon_monoxide,
            GasKind::NitrogenDioxide => &self.config.nitrogen_dioxide,
        }
    }

    pub fn sensor_resistance(&self, raw: u16) -> Result<f32, CalibrationError> {
        sensor_resistance(&self.config.circuit, raw)
    }

    pub fn evaluate(&self, kind: GasKind, raw: u16) -> Result<f32, CalibrationError> {
        calibration_curve(self.curve(kind), &self.config.circuit, raw).inspect_err(|e| {
            debug!("{}: {}", kind.name(), e);
        })
    }

    pub fn carbon_monoxide_ppm(&self, raw: u16) -> Result<f32, CalibrationError> {
        self.evaluate(GasKind::CarbonMonoxide, raw)
    }

    pub fn nitrogen_dioxide_ppm(&self, raw: u16) -> Result<f32, CalibrationError> {
        self.evaluate(GasKind::NitrogenDioxide, raw)
    }

    /// Evaluate both channels, mapping undefined readings to missing data.
    pub fn read_all(&self, co_raw: u16, no2_raw: u16) -> GasReadings {
        GasReadings {
            co_ppm: self.carbon_monoxide_ppm(co_raw).ok(),
            no2_ppm: self.nitrogen_dioxide_ppm(no2_raw).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_midscale_reading() {
        let evaluator = CalibrationEvaluator::default();

        // V = 1.6516 V, Rs = 9.9805 kΩ, Rs/R0 = 0.99805
        assert_close(evaluator.sensor_resistance(512).unwrap(), 9.9805, 1e-3);
        assert_close(evaluator.carbon_monoxide_ppm(512).unwrap(), 117.233, 1e-2);
        assert_close(evaluator.nitrogen_dioxide_ppm(512).unwrap(), 0.39891, 1e-4);
    }

    #[test]
    fn test_curve_points_across_range() {
        let evaluator = CalibrationEvaluator::default();

        assert_close(evaluator.carbon_monoxide_ppm(100).unwrap(), 0.24777, 1e-4);
        assert_close(evaluator.nitrogen_dioxide_ppm(100).unwrap(), 8.9814, 1e-2);
        assert_close(evaluator.carbon_monoxide_ppm(300).unwrap(), 10.2069, 1e-2);
        assert_close(evaluator.nitrogen_dioxide_ppm(300).unwrap(), 1.37052, 1e-3);
    }

    #[test]
    fn test_zero_reading_is_undefined() {
        let evaluator = CalibrationEvaluator::default();

        assert_eq!(
            evaluator.carbon_monoxide_ppm(0),
            Err(CalibrationError::UndefinedReading { raw: 0 })
        );
        assert_eq!(
            evaluator.nitrogen_dioxide_ppm(0),
            Err(CalibrationError::UndefinedReading { raw: 0 })
        );
    }

    #[test]
    fn test_full_scale_reading() {
        let evaluator = CalibrationEvaluator::default();

        assert_eq!(evaluator.sensor_resistance(1023), Ok(0.0));
        // 0 ^ -2.769 is infinite, 0 ^ 1.4 is zero.
        assert_eq!(
            evaluator.carbon_monoxide_ppm(1023),
            Err(CalibrationError::UndefinedReading { raw: 1023 })
        );
        assert_eq!(evaluator.nitrogen_dioxide_ppm(1023), Ok(0.0));

        let readings = evaluator.read_all(1023, 1023);
        assert_eq!(readings.co_ppm, None);
        assert_eq!(readings.no2_ppm, Some(0.0));
    }

    #[test]
    fn test_out_of_range_reading() {
        let evaluator = CalibrationEvaluator::default();

        assert_eq!(
            evaluator.evaluate(GasKind::CarbonMonoxide, 1024),
            Err(CalibrationError::OutOfRange {
                raw: 1024,
                max: 1023
            })
        );
    }

    #[test]
    fn test_every_in_range_reading_is_finite() {
        let evaluator = CalibrationEvaluator::default();

        for raw in 1..1023 {
            let co = evaluator.carbon_monoxide_ppm(raw).unwrap();
            let no2 = evaluator.nitrogen_dioxide_ppm(raw).unwrap();
            assert!(co.is_finite() && co > 0.0, "CO at raw {raw}: {co}");
            assert!(no2.is_finite() && no2 > 0.0, "NO2 at raw {raw}: {no2}");
        }
    }

    #[test]
    fn test_curves_move_in_opposite_directions() {
        let evaluator = CalibrationEvaluator::default();

        // Higher voltage means lower Rs: CO rises, NO2 falls.
        let co_low = evaluator.carbon_monoxide_ppm(200).unwrap();
        let co_high = evaluator.carbon_monoxide_ppm(800).unwrap();
        let no2_low = evaluator.nitrogen_dioxide_ppm(200).unwrap();
        let no2_high = evaluator.nitrogen_dioxide_ppm(800).unwrap();

        assert!(co_high > co_low);
        assert!(no2_high < no2_low);
    }

    #[test]
    fn test_field_reference_resistance() {
        let mut config = CalibrationConfig::default();
        config.nitrogen_dioxide = CurveParams::NITROGEN_DIOXIDE.with_reference_resistance(12.5);
        let evaluator = CalibrationEvaluator::new(config);

        assert_close(evaluator.nitrogen_dioxide_ppm(512).unwrap(), 0.29188, 1e-4);
        // CO channel keeps the default baseline.
        assert_close(evaluator.carbon_monoxide_ppm(512).unwrap(), 117.233, 1e-2);
    }

    #[test]
    fn test_read_all_maps_undefined_to_missing() {
        let evaluator = CalibrationEvaluator::default();

        let readings = evaluator.read_all(0, 512);
        assert_eq!(readings.co_ppm, None);
        assert!(readings.no2_ppm.is_some());

        let readings = evaluator.read_all(512, 2000);
        assert!(readings.co_ppm.is_some());
        assert_eq!(readings.no2_ppm, None);
    }

    #[test]
    fn test_free_function_matches_evaluator() {
        let circuit = CircuitConfig::REFERENCE;
        let direct = calibration_curve(&CurveParams::CARBON_MONOXIDE, &circuit, 640).unwrap();
        let evaluator = CalibrationEvaluator::default();

        assert_eq!(direct, evaluator.carbon_monoxide_ppm(640).unwrap());
    }
}
