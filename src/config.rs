// Equalizer configuration loaded from a TOML file
//
// All settings live under an `[equalizer]` table. Device names, stream
// format, initial volume, queue capacity and worker count are required;
// everything else falls back to the crate defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::types::FrequencyBand;
use crate::types::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file has no [{0}] section")]
    MissingSection(&'static str),

    #[error("Missing required config key '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

const SECTION: &str = "equalizer";

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    equalizer: Option<RawEqualizerConfig>,
}

/// Every key optional so a missing one can be reported by name
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEqualizerConfig {
    input_device_name: Option<String>,
    output_device_name: Option<String>,
    sample_rate: Option<u32>,
    block_size: Option<usize>,
    initial_volume: Option<f32>,
    max_queue_size: Option<usize>,
    num_dsp_workers: Option<usize>,
    blocks_per_cycle: Option<usize>,
    filter_order: Option<usize>,
    shutdown_grace_ms: Option<u64>,
    capture_idle_ms: Option<u64>,
    playback_idle_us: Option<u64>,
    bands: Option<Vec<(f64, f64)>>,
}

fn required<T>(value: Option<T>, key: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing(key))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EqualizerConfig {
    pub input_device_name: String,
    pub output_device_name: String,
    pub sample_rate: u32,
    /// Device block size in frames
    pub block_size: usize,
    /// Linear master volume at startup (1.0 = 100%)
    pub initial_volume: f32,
    /// Transfer queue capacity in blocks; 0 = unbounded
    pub max_queue_size: usize,
    pub num_dsp_workers: usize,
    pub blocks_per_cycle: usize,
    pub filter_order: usize,
    pub shutdown_grace_ms: u64,
    pub capture_idle_ms: u64,
    pub playback_idle_us: u64,
    pub bands: Vec<FrequencyBand>,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            input_device_name: String::new(),
            output_device_name: String::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            initial_volume: DEFAULT_INITIAL_VOLUME,
            max_queue_size: DEFAULT_QUEUE_CAPACITY,
            num_dsp_workers: DEFAULT_DSP_WORKERS,
            blocks_per_cycle: DEFAULT_BLOCKS_PER_CYCLE,
            filter_order: DEFAULT_FILTER_ORDER,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            capture_idle_ms: DEFAULT_CAPTURE_IDLE_MS,
            playback_idle_us: DEFAULT_PLAYBACK_IDLE_US,
            bands: default_bands(),
        }
    }
}

pub fn default_bands() -> Vec<FrequencyBand> {
    DEFAULT_FREQUENCY_BANDS
        .iter()
        .copied()
        .map(FrequencyBand::from)
        .collect()
}

impl EqualizerConfig {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: RawConfigFile = toml::from_str(text)?;
        let raw = file.equalizer.ok_or(ConfigError::MissingSection(SECTION))?;

        let config = Self {
            input_device_name: required(raw.input_device_name, "input_device_name")?,
            output_device_name: required(raw.output_device_name, "output_device_name")?,
            sample_rate: required(raw.sample_rate, "sample_rate")?,
            block_size: required(raw.block_size, "block_size")?,
            initial_volume: required(raw.initial_volume, "initial_volume")?,
            max_queue_size: required(raw.max_queue_size, "max_queue_size")?,
            num_dsp_workers: required(raw.num_dsp_workers, "num_dsp_workers")?,
            blocks_per_cycle: raw.blocks_per_cycle.unwrap_or(DEFAULT_BLOCKS_PER_CYCLE),
            filter_order: raw.filter_order.unwrap_or(DEFAULT_FILTER_ORDER),
            shutdown_grace_ms: raw.shutdown_grace_ms.unwrap_or(DEFAULT_SHUTDOWN_GRACE_MS),
            capture_idle_ms: raw.capture_idle_ms.unwrap_or(DEFAULT_CAPTURE_IDLE_MS),
            playback_idle_us: raw.playback_idle_us.unwrap_or(DEFAULT_PLAYBACK_IDLE_US),
            bands: raw
                .bands
                .map(|bands| bands.into_iter().map(FrequencyBand::from).collect())
                .unwrap_or_else(default_bands),
        };

        config.validate()?;
        Ok(config)
    }

    /// Range checks. Band edges against Nyquist are checked again when the
    /// filter bank is designed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(8000..=192000).contains(&self.sample_rate) {
            return Err(ConfigError::Invalid {
                key: "sample_rate",
                reason: format!("{} Hz (must be 8000-192000 Hz)", self.sample_rate),
            });
        }

        if !(16..=8192).contains(&self.block_size) {
            return Err(ConfigError::Invalid {
                key: "block_size",
                reason: format!("{} (must be 16-8192 frames)", self.block_size),
            });
        }

        if !self.initial_volume.is_finite() || !(0.0..=MAX_MASTER_VOLUME).contains(&self.initial_volume) {
            return Err(ConfigError::Invalid {
                key: "initial_volume",
                reason: format!("{} (must be 0.0-{})", self.initial_volume, MAX_MASTER_VOLUME),
            });
        }

        if self.num_dsp_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "num_dsp_workers",
                reason: "at least one DSP worker is required".to_string(),
            });
        }

        if self.blocks_per_cycle == 0 {
            return Err(ConfigError::Invalid {
                key: "blocks_per_cycle",
                reason: "must be at least 1".to_string(),
            });
        }

        if !(1..=8).contains(&self.filter_order) {
            return Err(ConfigError::Invalid {
                key: "filter_order",
                reason: format!("{} (must be 1-8)", self.filter_order),
            });
        }

        if self.bands.is_empty() {
            return Err(ConfigError::Invalid {
                key: "bands",
                reason: "at least one frequency band is required".to_string(),
            });
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        for (index, band) in self.bands.iter().enumerate() {
            let sane = band.low_hz.is_finite()
                && band.high_hz.is_finite()
                && band.low_hz > 0.0
                && band.low_hz < band.high_hz
                && band.high_hz < nyquist;
            if !sane {
                return Err(ConfigError::Invalid {
                    key: "bands",
                    reason: format!(
                        "band #{} [{}, {}] must satisfy 0 < low < high < {} Hz",
                        index, band.low_hz, band.high_hz, nyquist
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn frequency_bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Frames read and equalized per capture cycle
    pub fn frames_per_cycle(&self) -> usize {
        self.block_size * self.blocks_per_cycle
    }
}
