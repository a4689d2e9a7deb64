// Audio devices module - Capture/playback contracts and device backends
//
// The pipeline only sees two narrow contracts:
// - CaptureSource: read one interleaved block of a requested frame count
// - PlaybackSink: write one block
// and a DeviceProvider that resolves configured device names to them.
//
// Backends:
// - cpal_backend: real hardware through cpal, with rtrb ring buffers
//   between the device callbacks and the pipeline loops
// - memory: scripted sources and recording sinks for tests and demos

pub mod cpal_backend;
pub mod memory;

use serde::Serialize;

use crate::audio::errors::{DeviceError, DeviceKind};
use crate::audio::types::AudioBlock;

pub use cpal_backend::CpalDeviceProvider;
pub use memory::{MemoryDeviceProvider, RecordedBlocks, RecordingSink, ScriptedSource};

/// Audio device information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
    pub channels: u16,
    pub host_api: String,
}

/// Stream parameters requested when a device is opened
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    /// Device block size in frames
    pub block_size: usize,
    /// Frames the capture loop reads per cycle
    pub frames_per_cycle: usize,
    /// Channel count to request; `None` uses the device default
    pub channels: Option<u16>,
}

impl StreamSettings {
    /// Real-time duration of `frames` at this sample rate
    pub fn duration_of(&self, frames: usize) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// Source of captured audio. Lives on the capture loop's thread.
pub trait CaptureSource {
    fn device_name(&self) -> String;

    fn channel_count(&self) -> u16;

    /// Block until `frame_count` frames are available (bounded by roughly one
    /// block of real time) and return them.
    fn read_block(&mut self, frame_count: usize) -> Result<AudioBlock, DeviceError>;
}

/// Destination for equalized audio. Lives on the playback loop's thread.
pub trait PlaybackSink {
    fn device_name(&self) -> String;

    /// May block while the device buffer drains.
    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError>;
}

/// Resolves configured device names and opens streams on them
pub trait DeviceProvider: Send + Sync {
    fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, DeviceError>;

    /// Full name of the first device of `kind` matching `name`
    fn resolve_device(&self, kind: DeviceKind, name: &str) -> Result<String, DeviceError>;

    fn open_capture(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn CaptureSource>, DeviceError>;

    fn open_playback(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn PlaybackSink>, DeviceError>;
}

/// Case-insensitive substring match against device names; surrounding
/// whitespace in the configured name is ignored. First match wins.
pub fn find_device_by_name<T, I, F>(candidates: I, wanted: &str, mut name_of: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> Option<String>,
{
    let wanted = wanted.trim().to_lowercase();
    candidates.into_iter().find(|candidate| {
        name_of(candidate)
            .map(|name| name.to_lowercase().contains(&wanted))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_device_by_name_is_fuzzy() {
        let devices = vec![
            "Built-in Microphone".to_string(),
            "Speakers (Realtek High Definition Audio)".to_string(),
            "Headphones (USB Audio)".to_string(),
        ];

        let found = find_device_by_name(devices.iter(), "  realtek ", |d| Some(d.to_string()));
        assert_eq!(found.map(String::as_str), Some("Speakers (Realtek High Definition Audio)"));

        let found = find_device_by_name(devices.iter(), "USB", |d| Some(d.to_string()));
        assert_eq!(found.map(String::as_str), Some("Headphones (USB Audio)"));

        assert!(find_device_by_name(devices.iter(), "bluetooth", |d| Some(d.to_string())).is_none());
    }

    #[test]
    fn test_unnamed_devices_never_match() {
        let devices = vec![None, Some("Line In".to_string())];
        let found = find_device_by_name(devices.into_iter(), "line", |d| d.clone());
        assert_eq!(found, Some(Some("Line In".to_string())));
    }
}
