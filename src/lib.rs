pub mod audio;
pub mod commands;
pub mod config;
pub mod log;
pub mod types;

// Re-export audio types for testing and external use
pub use audio::{
    AudioBlock, BandEqualizer, ControlState, CpalDeviceProvider, DeviceProvider, EqualizerPipeline,
    FilterBank, FrequencyBand, MemoryDeviceProvider, PipelineError, ShutdownReport,
};
pub use config::{ConfigError, EqualizerConfig};
