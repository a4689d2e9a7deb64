// Error taxonomy for the equalizer core, device layer and pipeline supervisor

use std::fmt;

/// Errors raised while building filters or equalizing a block
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EqualizerError {
    #[error("Invalid frequency band #{index} ({low_hz} Hz - {high_hz} Hz): {reason}")]
    InvalidBand {
        index: usize,
        low_hz: f64,
        high_hz: f64,
        reason: String,
    },

    #[error("Invalid filter order {0} (must be at least 1)")]
    InvalidFilterOrder(usize),

    #[error("Invalid sample rate {0} Hz")]
    InvalidSampleRate(u32),

    #[error("Filter bank needs at least one frequency band")]
    NoBands,

    #[error("Band #{index} processing failed: {reason}")]
    BandProcessing { index: usize, reason: String },

    #[error("Gain vector has {gains} entries but the filter bank has {bands} bands")]
    GainCountMismatch { gains: usize, bands: usize },

    #[error("Invalid audio block: {0}")]
    BlockShape(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

/// Which side of the pipeline a device serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Capture,
    Playback,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Capture => write!(f, "input"),
            DeviceKind::Playback => write!(f, "output"),
        }
    }
}

/// Errors raised by capture sources, playback sinks and device providers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("The selected {kind} audio device \"{name}\" not found on the system!")]
    DeviceNotFound { kind: DeviceKind, name: String },

    #[error("Audio stream error on '{device}': {reason}")]
    Stream { device: String, reason: String },

    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Audio device '{0}' disconnected")]
    Disconnected(String),
}

/// Errors raised by the control state when the control surface sends bad values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("Band index {index} out of range (equalizer has {bands} bands)")]
    BandIndexOutOfRange { index: usize, bands: usize },

    #[error("Gain list has {gains} entries but the equalizer has {bands} bands")]
    GainCountMismatch { gains: usize, bands: usize },

    #[error("{parameter} must be a finite number")]
    NonFinite { parameter: &'static str },
}

/// Lifecycle errors surfaced by the pipeline supervisor
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Equalizer pipeline is already running")]
    AlreadyRunning,

    #[error("{kind} loop did not report launch within {timeout_ms} ms")]
    LaunchTimeout { kind: DeviceKind, timeout_ms: u64 },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Equalizer(#[from] EqualizerError),

    #[error("Failed to spawn pipeline thread: {0}")]
    Thread(#[from] std::io::Error),
}
