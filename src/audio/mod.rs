// Audio module - Live multiband equalizer
//
// - types: audio blocks and frequency bands
// - errors: error taxonomy shared by every layer
// - devices: capture/playback contracts and backends (cpal, in-memory)
// - effects: bandpass filter design, filter bank, fan-out equalizer
// - mixer: control state and the capture → equalize → playback pipeline

pub mod devices;
pub mod effects;
pub mod errors;
pub mod mixer;
pub mod types;

// Re-export commonly used types for easier imports
pub use types::{AudioBlock, FrequencyBand, GainVector};

pub use errors::{ControlError, DeviceError, DeviceKind, EqualizerError, PipelineError};

pub use effects::{BandEqualizer, BandFilter, FilterBank, FilterCoefficients};

pub use devices::{
    AudioDeviceInfo, CaptureSource, CpalDeviceProvider, DeviceProvider, MemoryDeviceProvider,
    PlaybackSink, StreamSettings,
};

pub use mixer::{
    ControlSnapshot, ControlState, EqualizerPipeline, PipelinePhase, PipelineSettings, RunState,
    ShutdownReport,
};
