pub mod gas;
pub mod pms5003;

/// Trait for sensor reading data structures.
/// Provides compile-time guarantees about the number of values and their conversion to arrays.
pub trait SensorReadings<const COUNT: usize> {
    /// Convert the readings into a fixed-size array.
    fn to_array(self) -> [i32; COUNT];
}

pub use gas::{CalibrationError, CalibrationEvaluator, GasKind, GasReadings, calibration_curve};
pub use pms5003::{
    DecodeError, FRAME_LEN, FrameDecoder, FrameStats, ParticulateFrame, encode_frame,
    try_decode_frame,
};
