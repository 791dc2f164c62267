//! Desktop simulator for the airscout sensing core.
//!
//! Plays the part of the node's aggregator: synthesizes a noisy PMS5003 UART
//! stream and analog gas readings, polls `airscout-core` once per sampling
//! cycle, and logs the composed record. Run with `RUST_LOG=debug` to see the
//! decoder's resync and checksum diagnostics.
//!
//! The line noise is deterministic, so every run exercises the same mix of
//! clean frames, leading garbage, corrupted checksums and split deliveries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{info, warn};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;

use airscout_core::sensors::encode_frame;
use airscout_core::{
    ByteStream, CalibrationEvaluator, DecodeError, FrameDecoder, FrameStats, GasReadings,
    NodeConfig, ParticulateFrame, RingStream,
};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Number of sampling cycles before exiting.
const SIM_CYCLES: u32 = 24;

/// Simulated seconds per wall-clock second.
const TIME_SCALE: u32 = 300;

/// UART receive buffer size on the node.
const UART_BUFFER_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Seeded noise source for the synthetic UART line.
struct LineNoise {
    rng: WyRand,
}

impl LineNoise {
    fn new(seed: u64) -> Self {
        Self {
            rng: WyRand::seed_from_u64(seed),
        }
    }

    fn next(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn chance(&mut self, percent: u32) -> bool {
        self.next() % 100 < percent
    }

    /// Random bytes that never contain the frame start marker.
    fn garbage(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next() as u8) & 0x3F).collect()
    }
}

/// Generates synthetic readings that vary over time.
struct MockSensorGenerator {
    elapsed_secs: f64,
    noise: LineNoise,
}

impl MockSensorGenerator {
    fn new() -> Self {
        Self {
            elapsed_secs: 0.0,
            noise: LineNoise::new(0x5EED),
        }
    }

    /// Advance the internal clock and return raw wire bytes plus ADC codes.
    fn next_cycle(&mut self, dt_secs: f64) -> (Vec<u8>, u16, u16) {
        self.elapsed_secs += dt_secs;
        let t = self.elapsed_secs;

        // PM2.5: 10–40 μg/m³ with a slow traffic cycle
        let pm2_5 = 25.0 + 15.0 * (t / 3600.0).sin();
        let pm1_0 = pm2_5 * 0.7;
        let pm10 = pm2_5 * 1.4 + 5.0 * (t / 900.0).cos();
        let std_fields = [pm1_0, pm2_5, pm10].map(|v| v.max(0.0) as u16);
        // Atmospheric values read slightly lower than CF=1 outdoors.
        let atm_fields = std_fields.map(|v| v.saturating_sub(v / 10));
        let fields = [
            std_fields[0],
            std_fields[1],
            std_fields[2],
            atm_fields[0],
            atm_fields[1],
            atm_fields[2],
        ];

        let mut wire = Vec::new();
        if self.noise.chance(30) {
            let len = 1 + (self.noise.next() % 24) as usize;
            wire.extend(self.noise.garbage(len));
        }

        let mut frame = encode_frame(&fields, 0);
        if self.noise.chance(15) {
            let at = 2 + (self.noise.next() % 28) as usize;
            frame[at] ^= 0x10;
        }
        wire.extend_from_slice(&frame);

        // MQ sensors drift around mid-scale; an unplugged channel reads 0.
        let co_raw = (520.0 + 180.0 * (t / 1800.0).sin()) as u16;
        let no2_raw = if self.noise.chance(10) {
            0
        } else {
            (480.0 + 120.0 * (t / 2400.0).cos()) as u16
        };

        (wire, co_raw, no2_raw)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Drain every complete frame currently buffered, keeping the newest.
fn poll_particulate<S: ByteStream>(
    decoder: &FrameDecoder,
    stream: &mut S,
    stats: &mut FrameStats,
) -> Option<ParticulateFrame> {
    let mut latest = None;
    loop {
        let outcome = decoder.decode(stream);
        stats.record(&outcome);
        match outcome {
            Ok(frame) => latest = Some(frame),
            Err(DecodeError::Incomplete { .. }) => break,
            Err(DecodeError::ChecksumMismatch { .. }) => continue,
            Err(DecodeError::SyncLost { scanned }) => {
                warn!("UART stream unsynchronized ({} bytes scanned)", scanned);
            }
        }
    }
    latest
}

fn log_record(timestamp: u64, particulate: Option<ParticulateFrame>, gas: GasReadings) {
    let pm = particulate
        .map(|f| {
            format!(
                "pm1.0={} pm2.5={} pm10={}",
                f.pm1_0_atm(),
                f.pm2_5_atm(),
                f.pm10_atm()
            )
        })
        .unwrap_or_else(|| "pm=missing".to_string());
    let fmt_ppm = |v: Option<f32>| v.map_or_else(|| "missing".to_string(), |p| format!("{p:.3}"));

    info!(
        "t={} {} co_ppm={} no2_ppm={}",
        timestamp,
        pm,
        fmt_ppm(gas.co_ppm),
        fmt_ppm(gas.no2_ppm)
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting airscout simulator");

    let config = NodeConfig::default();
    if let Err(e) = config.validate() {
        log::error!("Invalid node config: {}", e);
        return;
    }

    let decoder = FrameDecoder::new(config.decoder);
    let evaluator = CalibrationEvaluator::new(config.calibration);
    let mut stream: RingStream<UART_BUFFER_LEN> = RingStream::new();
    let mut stats = FrameStats::default();
    let mut sensor_gen = MockSensorGenerator::new();

    let interval = Duration::from_millis(u64::from(config.sampling.sample_interval_ms));
    info!(
        "Sampling every {:?} (simulated at {}x)",
        interval, TIME_SCALE
    );

    let start_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    for cycle in 0..SIM_CYCLES {
        let (wire, co_raw, no2_raw) = sensor_gen.next_cycle(interval.as_secs_f64());

        // Deliver the wire bytes in two bursts to mimic a split UART read.
        let split = wire.len() / 2;
        let mut particulate = None;
        for burst in [&wire[..split], &wire[split..]] {
            let taken = stream.extend_from_slice(burst);
            if taken < burst.len() {
                warn!("UART buffer overrun, dropped {} bytes", burst.len() - taken);
            }
            if let Some(frame) = poll_particulate(&decoder, &mut stream, &mut stats) {
                particulate = Some(frame);
            }
        }

        let gas = evaluator.read_all(co_raw, no2_raw);

        let timestamp = start_ts + u64::from(cycle) * interval.as_secs();
        log_record(timestamp, particulate, gas);

        std::thread::sleep(interval / TIME_SCALE);
    }

    info!(
        "Done: {} frames, {} checksum failures, {} sync losses, {} partial polls",
        stats.frames, stats.checksum_failures, stats.sync_losses, stats.incomplete
    );
    info!("Simulator exiting");
}
