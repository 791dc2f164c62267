//! Hardware-independent sensing core for airscout
//!
//! This crate contains the platform-agnostic parts of the airscout field node:
//! the PMS5003 particulate frame decoder, the resistive gas sensor calibration
//! curves, the byte stream abstraction the decoder reads from, and the
//! configuration structs that carry per-unit constants.
//!
//! It is `#![no_std]` so it compiles on both the node's microcontroller and
//! desktop hosts (for the simulator and tests). Nothing here blocks or owns
//! global state; the aggregator decides when to poll.

#![no_std]

pub mod config;
pub mod sensors;
pub mod stream;

pub use config::{
    CalibrationConfig, CircuitConfig, ConfigError, CurveParams, DecoderConfig, NodeConfig,
    SamplingConfig,
};
pub use sensors::{
    CalibrationError, CalibrationEvaluator, DecodeError, FrameDecoder, FrameStats, GasKind,
    GasReadings, ParticulateFrame, SensorReadings,
};
pub use stream::{ByteStream, RingStream, SliceStream, StreamError};
