// In-memory devices: scripted capture sources and recording playback sinks
//
// Used by the integration tests and by anything that wants to drive the
// pipeline without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{find_device_by_name, AudioDeviceInfo, CaptureSource, DeviceProvider, PlaybackSink, StreamSettings};
use crate::audio::errors::{DeviceError, DeviceKind};
use crate::audio::types::AudioBlock;

#[derive(Debug, Clone, Copy)]
struct Tone {
    frequency_hz: f64,
    amplitude: f32,
    sample_rate: u32,
}

/// What a scripted source does once its queued blocks run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExhausted {
    Silence,
    Disconnect,
}

/// Capture source replaying queued blocks, or generating a continuous sine
pub struct ScriptedSource {
    name: String,
    channels: u16,
    blocks: VecDeque<AudioBlock>,
    tone: Option<Tone>,
    frames_generated: u64,
    pacing: Option<Duration>,
    exhausted: WhenExhausted,
}

impl ScriptedSource {
    /// Replay `blocks` in order; silence afterwards
    pub fn from_blocks(name: &str, channels: u16, blocks: Vec<AudioBlock>) -> Self {
        Self {
            name: name.to_string(),
            channels,
            blocks: blocks.into(),
            tone: None,
            frames_generated: 0,
            pacing: None,
            exhausted: WhenExhausted::Silence,
        }
    }

    /// Endless sine at `frequency_hz` on every channel
    pub fn tone(name: &str, channels: u16, sample_rate: u32, frequency_hz: f64, amplitude: f32) -> Self {
        Self {
            tone: Some(Tone {
                frequency_hz,
                amplitude,
                sample_rate,
            }),
            ..Self::from_blocks(name, channels, Vec::new())
        }
    }

    pub fn silence(name: &str, channels: u16) -> Self {
        Self::from_blocks(name, channels, Vec::new())
    }

    /// Sleep this long before returning each block, like a device would
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn when_exhausted(mut self, behaviour: WhenExhausted) -> Self {
        self.exhausted = behaviour;
        self
    }

    fn next_tone_block(&mut self, tone: Tone, frame_count: usize) -> AudioBlock {
        let start = self.frames_generated;
        self.frames_generated += frame_count as u64;
        AudioBlock::from_fn(frame_count, self.channels, |frame, _| {
            let t = (start + frame as u64) as f64 / tone.sample_rate as f64;
            tone.amplitude * (2.0 * std::f64::consts::PI * tone.frequency_hz * t).sin() as f32
        })
    }
}

impl CaptureSource for ScriptedSource {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn read_block(&mut self, frame_count: usize) -> Result<AudioBlock, DeviceError> {
        if let Some(pacing) = self.pacing {
            std::thread::sleep(pacing);
        }

        if let Some(block) = self.blocks.pop_front() {
            return Ok(block);
        }
        if let Some(tone) = self.tone {
            return Ok(self.next_tone_block(tone, frame_count));
        }
        match self.exhausted {
            WhenExhausted::Silence => Ok(AudioBlock::silent(frame_count, self.channels)),
            WhenExhausted::Disconnect => Err(DeviceError::Disconnected(self.name.clone())),
        }
    }
}

/// Shared view of every block a [`RecordingSink`] has received
#[derive(Debug, Clone, Default)]
pub struct RecordedBlocks {
    inner: Arc<(Mutex<Vec<AudioBlock>>, Condvar)>,
}

impl RecordedBlocks {
    fn push(&self, block: AudioBlock) {
        let (blocks, arrived) = &*self.inner;
        blocks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(block);
        arrived.notify_all();
    }

    pub fn blocks(&self) -> Vec<AudioBlock> {
        self.inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` blocks were recorded; false on timeout
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let (blocks, arrived) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut guard = blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while guard.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match arrived.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// Playback sink that keeps every block it is given
pub struct RecordingSink {
    name: String,
    recorded: RecordedBlocks,
    write_delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new(name: &str) -> (Self, RecordedBlocks) {
        let recorded = RecordedBlocks::default();
        let sink = Self {
            name: name.to_string(),
            recorded: recorded.clone(),
            write_delay: None,
        };
        (sink, recorded)
    }

    pub fn recording_into(name: &str, recorded: RecordedBlocks) -> Self {
        Self {
            name: name.to_string(),
            recorded,
            write_delay: None,
        }
    }

    /// Simulate a slow device: each write blocks this long
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }
}

impl PlaybackSink for RecordingSink {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        self.recorded.push(block.clone());
        Ok(())
    }
}

type CaptureFactory =
    Box<dyn Fn(&StreamSettings) -> Result<Box<dyn CaptureSource>, DeviceError> + Send + Sync>;
type PlaybackFactory =
    Box<dyn Fn(&StreamSettings) -> Result<Box<dyn PlaybackSink>, DeviceError> + Send + Sync>;

/// Device provider whose devices are created by caller-supplied factories
#[derive(Default)]
pub struct MemoryDeviceProvider {
    captures: Vec<(String, CaptureFactory)>,
    playbacks: Vec<(String, PlaybackFactory)>,
}

impl MemoryDeviceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture<F, S>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&StreamSettings) -> S + Send + Sync + 'static,
        S: CaptureSource + 'static,
    {
        let boxed: CaptureFactory = Box::new(
            move |settings: &StreamSettings| -> Result<Box<dyn CaptureSource>, DeviceError> {
                Ok(Box::new(factory(settings)))
            },
        );
        self.captures.push((name.to_string(), boxed));
        self
    }

    pub fn with_playback<F, S>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&StreamSettings) -> S + Send + Sync + 'static,
        S: PlaybackSink + 'static,
    {
        let boxed: PlaybackFactory = Box::new(
            move |settings: &StreamSettings| -> Result<Box<dyn PlaybackSink>, DeviceError> {
                Ok(Box::new(factory(settings)))
            },
        );
        self.playbacks.push((name.to_string(), boxed));
        self
    }

    /// Register a capture device that fails to open
    pub fn with_broken_capture(mut self, name: &str, error: DeviceError) -> Self {
        let factory: CaptureFactory = Box::new(
            move |_: &StreamSettings| -> Result<Box<dyn CaptureSource>, DeviceError> {
                Err(error.clone())
            },
        );
        self.captures.push((name.to_string(), factory));
        self
    }

    /// Register a playback device that fails to open
    pub fn with_broken_playback(mut self, name: &str, error: DeviceError) -> Self {
        let factory: PlaybackFactory = Box::new(
            move |_: &StreamSettings| -> Result<Box<dyn PlaybackSink>, DeviceError> {
                Err(error.clone())
            },
        );
        self.playbacks.push((name.to_string(), factory));
        self
    }
}

impl DeviceProvider for MemoryDeviceProvider {
    fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, DeviceError> {
        let inputs = self.captures.iter().map(|(name, _)| AudioDeviceInfo {
            name: name.clone(),
            is_input: true,
            is_output: false,
            is_default: false,
            channels: 0,
            host_api: "Memory".to_string(),
        });
        let outputs = self.playbacks.iter().map(|(name, _)| AudioDeviceInfo {
            name: name.clone(),
            is_input: false,
            is_output: true,
            is_default: false,
            channels: 0,
            host_api: "Memory".to_string(),
        });
        Ok(inputs.chain(outputs).collect())
    }

    fn resolve_device(&self, kind: DeviceKind, name: &str) -> Result<String, DeviceError> {
        let found = match kind {
            DeviceKind::Capture => {
                find_device_by_name(self.captures.iter(), name, |(n, _)| Some(n.clone())).map(|(n, _)| n)
            }
            DeviceKind::Playback => {
                find_device_by_name(self.playbacks.iter(), name, |(n, _)| Some(n.clone())).map(|(n, _)| n)
            }
        };
        found.cloned().ok_or_else(|| DeviceError::DeviceNotFound {
            kind,
            name: name.to_string(),
        })
    }

    fn open_capture(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn CaptureSource>, DeviceError> {
        let (_, factory) = find_device_by_name(self.captures.iter(), name, |(n, _)| Some(n.clone()))
            .ok_or_else(|| DeviceError::DeviceNotFound {
                kind: DeviceKind::Capture,
                name: name.to_string(),
            })?;
        factory(settings)
    }

    fn open_playback(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn PlaybackSink>, DeviceError> {
        let (_, factory) = find_device_by_name(self.playbacks.iter(), name, |(n, _)| Some(n.clone()))
            .ok_or_else(|| DeviceError::DeviceNotFound {
                kind: DeviceKind::Playback,
                name: name.to_string(),
            })?;
        factory(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_replays_then_goes_silent() {
        let block = AudioBlock::from_fn(4, 1, |frame, _| frame as f32);
        let mut source = ScriptedSource::from_blocks("Mic", 1, vec![block.clone()]);

        assert_eq!(source.read_block(4).unwrap(), block);
        assert!(source.read_block(4).unwrap().is_silent());
    }

    #[test]
    fn test_scripted_source_can_disconnect() {
        let mut source = ScriptedSource::silence("Mic", 2).when_exhausted(WhenExhausted::Disconnect);
        assert_eq!(
            source.read_block(8),
            Err(DeviceError::Disconnected("Mic".to_string()))
        );
    }

    #[test]
    fn test_tone_is_continuous_across_blocks() {
        let mut source = ScriptedSource::tone("Mic", 1, 48000, 1000.0, 1.0);
        let first = source.read_block(10).unwrap();
        let second = source.read_block(10).unwrap();

        let expected = (2.0 * std::f64::consts::PI * 1000.0 * 10.0 / 48000.0).sin() as f32;
        assert!((second.sample(0, 0) - expected).abs() < 1e-6);
        assert_eq!(first.sample(0, 0), 0.0);
    }

    #[test]
    fn test_recording_sink_shares_blocks() {
        let (mut sink, recorded) = RecordingSink::new("Speakers");
        sink.write_block(&AudioBlock::silent(4, 2)).unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded.wait_for(1, Duration::from_millis(10)));
        assert!(!recorded.wait_for(2, Duration::from_millis(10)));
    }

    #[test]
    fn test_memory_provider_resolves_fuzzy_names() {
        let provider = MemoryDeviceProvider::new()
            .with_capture("USB Microphone", |_| ScriptedSource::silence("USB Microphone", 1))
            .with_playback("Studio Monitors", |_| RecordingSink::new("Studio Monitors").0);

        assert_eq!(
            provider.resolve_device(DeviceKind::Capture, "usb").unwrap(),
            "USB Microphone"
        );
        assert!(matches!(
            provider.resolve_device(DeviceKind::Playback, "headphones"),
            Err(DeviceError::DeviceNotFound { kind: DeviceKind::Playback, .. })
        ));
        assert_eq!(provider.list_devices().unwrap().len(), 2);
    }
}
