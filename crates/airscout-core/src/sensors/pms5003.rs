//! PMS5003 particulate sensor frame decoder
//!
//! The sensor streams fixed 32-byte frames over UART at 9600 baud:
//!
//! | Offset | Size | Content                                   |
//! |--------|------|-------------------------------------------|
//! | 0      | 2    | Start marker `0x42 0x4D`                  |
//! | 2      | 28   | Checksummed body (concentration fields)   |
//! | 30     | 2    | Checksum, big-endian                      |
//!
//! The checksum is the wrapping 16-bit sum of the 28 body bytes. Six big-endian
//! concentration words are read from the body starting at
//! [`DecoderConfig::field_offset`].
//!
//! Decoding never blocks. Each call makes at most one attempt: hunt for the
//! marker (slipping one byte at a time, bounded by
//! [`DecoderConfig::max_resync_scan`]), read one frame, verify it. The caller
//! polls again once more bytes have arrived.

use log::{debug, trace, warn};
use serde::Serialize;
use thiserror_no_std::Error;

use super::SensorReadings;
use crate::config::{ConfigError, DecoderConfig};
use crate::stream::{ByteStream, StreamError};

/// Length of one complete frame, marker and checksum included.
pub const FRAME_LEN: usize = 32;

/// Frame start sentinel.
pub const START_MARKER: [u8; 2] = [0x42, 0x4D];

const BODY_LEN: usize = FRAME_LEN - START_MARKER.len();
const CHECKSUM_SPAN: usize = 28;
const FIELD_COUNT: usize = 6;

/// Largest field offset that keeps all six fields inside the checksummed body.
pub const MAX_FIELD_OFFSET: usize = CHECKSUM_SPAN - FIELD_COUNT * 2;

/// One validated particulate reading [μg/m³].
///
/// Only produced by a successful decode, so every field is backed by a frame
/// that passed its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticulateFrame {
    pm1_0_std: u16,
    pm2_5_std: u16,
    pm10_std: u16,
    pm1_0_atm: u16,
    pm2_5_atm: u16,
    pm10_atm: u16,
}

impl ParticulateFrame {
    fn from_body(body: &[u8], field_offset: usize) -> Self {
        let word = |index: usize| {
            let at = field_offset + index * 2;
            u16::from_be_bytes([body[at], body[at + 1]])
        };

        Self {
            pm1_0_std: word(0),
            pm2_5_std: word(1),
            pm10_std: word(2),
            pm1_0_atm: word(3),
            pm2_5_atm: word(4),
            pm10_atm: word(5),
        }
    }

    /// PM1.0, standard particle (CF=1)
    pub const fn pm1_0_std(&self) -> u16 {
        self.pm1_0_std
    }

    /// PM2.5, standard particle (CF=1)
    pub const fn pm2_5_std(&self) -> u16 {
        self.pm2_5_std
    }

    /// PM10, standard particle (CF=1)
    pub const fn pm10_std(&self) -> u16 {
        self.pm10_std
    }

    /// PM1.0, atmospheric environment
    pub const fn pm1_0_atm(&self) -> u16 {
        self.pm1_0_atm
    }

    /// PM2.5, atmospheric environment
    pub const fn pm2_5_atm(&self) -> u16 {
        self.pm2_5_atm
    }

    /// PM10, atmospheric environment
    pub const fn pm10_atm(&self) -> u16 {
        self.pm10_atm
    }
}

impl SensorReadings<FIELD_COUNT> for ParticulateFrame {
    fn to_array(self) -> [i32; FIELD_COUNT] {
        [
            self.pm1_0_std as i32,
            self.pm2_5_std as i32,
            self.pm10_std as i32,
            self.pm1_0_atm as i32,
            self.pm2_5_atm as i32,
            self.pm10_atm as i32,
        ]
    }
}

/// Why a decode attempt produced no frame.
///
/// None of these are fatal; the decoder is ready for the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Less than one full frame is buffered
    #[error("Incomplete frame (available: {available})")]
    Incomplete {
        /// Bytes buffered when the attempt stopped
        available: usize,
    },

    /// No start marker found within the resync bound
    #[error("Lost frame sync after scanning {scanned} bytes")]
    SyncLost {
        /// Bytes slipped during this call
        scanned: usize,
    },

    /// Frame body failed its checksum and was dropped
    #[error("Checksum mismatch (computed: {computed:#06x}, declared: {declared:#06x})")]
    ChecksumMismatch {
        /// Wrapping sum of the received body bytes
        computed: u16,
        /// Checksum carried in the frame trailer
        declared: u16,
    },
}

impl From<StreamError> for DecodeError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Insufficient { available, .. } => Self::Incomplete { available },
            // Peek/consume/skip only ever report `Insufficient`.
            StreamError::Overflow { .. } | StreamError::Source => {
                Self::Incomplete { available: 0 }
            }
        }
    }
}

/// Stateless PMS5003 frame decoder.
///
/// The only state that survives between calls is the stream's read cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder {
    config: DecoderConfig,
}

impl FrameDecoder {
    /// Build a decoder, clamping `field_offset` to [`MAX_FIELD_OFFSET`].
    ///
    /// Use [`FrameDecoder::try_new`] to reject an out-of-range config instead.
    pub const fn new(config: DecoderConfig) -> Self {
        let field_offset = if config.field_offset > MAX_FIELD_OFFSET {
            MAX_FIELD_OFFSET
        } else {
            config.field_offset
        };

        Self {
            config: DecoderConfig {
                field_offset,
                ..config
            },
        }
    }

    pub fn try_new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Attempt to decode one frame, returning `None` on any non-fatal failure.
    pub fn try_decode_frame<S>(&self, stream: &mut S) -> Option<ParticulateFrame>
    where
        S: ByteStream + ?Sized,
    {
        self.decode(stream).ok()
    }

    /// Attempt to decode one frame, reporting why when no frame is produced.
    ///
    /// Consumption rules:
    /// - fewer than [`FRAME_LEN`] bytes buffered: nothing is consumed
    /// - marker mismatch: one byte slipped per mismatch, up to the resync bound
    /// - marker found: exactly [`FRAME_LEN`] bytes consumed, whether or not the
    ///   checksum holds
    pub fn decode<S>(&self, stream: &mut S) -> Result<ParticulateFrame, DecodeError>
    where
        S: ByteStream + ?Sized,
    {
        self.synchronize(stream)?;

        let mut frame = [0u8; FRAME_LEN];
        stream.consume(&mut frame)?;
        let body = &frame[START_MARKER.len()..];

        let computed = checksum(&body[..CHECKSUM_SPAN]);
        let declared = u16::from_be_bytes([body[CHECKSUM_SPAN], body[CHECKSUM_SPAN + 1]]);
        if computed != declared {
            warn!(
                "PMS5003: dropping frame, checksum {:#06x} != declared {:#06x}",
                computed, declared
            );
            return Err(DecodeError::ChecksumMismatch { computed, declared });
        }

        let reading = ParticulateFrame::from_body(body, self.config.field_offset);
        trace!("PMS5003: {:?}", reading);
        Ok(reading)
    }

    /// Slip bytes until the stream head is a start marker with a full frame behind it.
    fn synchronize<S>(&self, stream: &mut S) -> Result<(), DecodeError>
    where
        S: ByteStream + ?Sized,
    {
        let mut scanned = 0;
        let mut head = [0u8; START_MARKER.len()];

        loop {
            let available = stream.available();
            if available < FRAME_LEN {
                if scanned > 0 {
                    debug!("PMS5003: skipped {} bytes, awaiting more data", scanned);
                }
                return Err(DecodeError::Incomplete { available });
            }

            stream.peek(&mut head)?;
            if head == START_MARKER {
                if scanned > 0 {
                    debug!("PMS5003: resynchronized after skipping {} bytes", scanned);
                }
                return Ok(());
            }

            if scanned >= self.config.max_resync_scan {
                warn!("PMS5003: no start marker within {} bytes", scanned);
                return Err(DecodeError::SyncLost { scanned });
            }

            stream.skip(1)?;
            scanned += 1;
        }
    }
}

/// Decode one frame with the default PMS5003 layout.
pub fn try_decode_frame<S>(stream: &mut S) -> Option<ParticulateFrame>
where
    S: ByteStream + ?Sized,
{
    FrameDecoder::default().try_decode_frame(stream)
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Build a valid frame carrying `fields` in PM1.0/PM2.5/PM10 standard then
/// atmospheric order. Used to synthesize sensor traffic.
///
/// When `field_offset` leaves room, the leading body word is set to the frame
/// length the way the sensor reports it.
///
/// # Panics
///
/// Panics if the six fields do not fit inside the checksummed body.
pub fn encode_frame(fields: &[u16; FIELD_COUNT], field_offset: usize) -> [u8; FRAME_LEN] {
    assert!(
        field_offset <= MAX_FIELD_OFFSET,
        "fields must fit inside the checksummed body"
    );

    let mut frame = [0u8; FRAME_LEN];
    frame[..START_MARKER.len()].copy_from_slice(&START_MARKER);

    let body = &mut frame[START_MARKER.len()..];
    if field_offset >= 2 {
        body[..2].copy_from_slice(&((BODY_LEN - 2) as u16).to_be_bytes());
    }
    for (i, value) in fields.iter().enumerate() {
        let at = field_offset + i * 2;
        body[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    let sum = checksum(&body[..CHECKSUM_SPAN]);
    body[CHECKSUM_SPAN..].copy_from_slice(&sum.to_be_bytes());
    frame
}

/// Decode outcome counters, owned by the polling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames decoded successfully
    pub frames: u32,
    /// Polls that found less than a full frame buffered
    pub incomplete: u32,
    /// Frames dropped for a bad checksum
    pub checksum_failures: u32,
    /// Polls that hit the resync bound without finding a marker
    pub sync_losses: u32,
}

impl FrameStats {
    pub fn record(&mut self, outcome: &Result<ParticulateFrame, DecodeError>) {
        let counter = match outcome {
            Ok(_) => &mut self.frames,
            Err(DecodeError::Incomplete { .. }) => &mut self.incomplete,
            Err(DecodeError::ChecksumMismatch { .. }) => &mut self.checksum_failures,
            Err(DecodeError::SyncLost { .. }) => &mut self.sync_losses,
        };
        *counter = counter.saturating_add(1);
    }
}
