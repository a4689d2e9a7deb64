// Crate-wide defaults shared by configuration, pipeline and control surface

/// Default device sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default device block size in frames (~21.3ms at 48kHz)
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Device blocks captured and equalized per capture cycle
pub const DEFAULT_BLOCKS_PER_CYCLE: usize = 4;

/// Butterworth prototype order used for every band
pub const DEFAULT_FILTER_ORDER: usize = 2;

pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
pub const DEFAULT_DSP_WORKERS: usize = 4;
pub const DEFAULT_INITIAL_VOLUME: f32 = 1.0;

pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1000;
pub const DEFAULT_CAPTURE_IDLE_MS: u64 = 10;
pub const DEFAULT_PLAYBACK_IDLE_US: u64 = 100;

/// How long `start()` waits for both loops to report their devices
pub const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 5000;

/// Band gain range exposed to the control surface (dB)
pub const MIN_BAND_GAIN_DB: f32 = -20.0;
pub const MAX_BAND_GAIN_DB: f32 = 20.0;

/// Master volume range as a linear fraction (0% - 200%)
pub const MAX_MASTER_VOLUME: f32 = 2.0;

/// Default 18-band layout, low/high edges in Hz
pub const DEFAULT_FREQUENCY_BANDS: [(f64, f64); 18] = [
    (20.0, 76.0),
    (77.0, 109.0),
    (110.0, 155.0),
    (156.0, 219.0),
    (220.0, 310.0),
    (311.0, 439.0),
    (440.0, 621.0),
    (622.0, 879.0),
    (880.0, 1200.0),
    (1201.0, 1800.0),
    (1801.0, 2500.0),
    (2501.0, 3499.0),
    (3500.0, 5000.0),
    (5001.0, 7000.0),
    (7001.0, 10000.0),
    (10001.0, 14000.0),
    (14001.0, 18000.0),
    (18001.0, 20000.0),
];
