// cpal device backend
//
// Each opened device owns a cpal stream plus one side of an rtrb ring buffer.
// The cpal callback thread only pushes/pops samples; the pipeline loops read
// and write whole blocks from the other side.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info, warn};

use super::{find_device_by_name, AudioDeviceInfo, CaptureSource, DeviceProvider, PlaybackSink, StreamSettings};
use crate::audio::errors::{DeviceError, DeviceKind};
use crate::audio::types::AudioBlock;

/// Blocks of headroom in each ring buffer
const RING_BUFFER_BLOCKS: usize = 8;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Device provider backed by the platform's default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceProvider;

impl CpalDeviceProvider {
    pub fn new() -> Self {
        Self
    }

    /// Capture search covers input devices first, then output devices so a
    /// loopback-capable output can be used as a capture source.
    fn find_capture_device(&self, name: &str) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();

        let inputs = host
            .input_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        if let Some(device) = find_device_by_name(inputs, name, |d| d.name().ok()) {
            return Ok(device);
        }

        let outputs = host
            .output_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        find_device_by_name(outputs, name, |d| d.name().ok()).ok_or_else(|| {
            DeviceError::DeviceNotFound {
                kind: DeviceKind::Capture,
                name: name.to_string(),
            }
        })
    }

    fn find_playback_device(&self, name: &str) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        let outputs = host
            .output_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        find_device_by_name(outputs, name, |d| d.name().ok()).ok_or_else(|| {
            DeviceError::DeviceNotFound {
                kind: DeviceKind::Playback,
                name: name.to_string(),
            }
        })
    }
}

impl DeviceProvider for CpalDeviceProvider {
    fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, DeviceError> {
        let host = cpal::default_host();
        let host_api = format!("{:?}", host.id());
        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let mut devices: Vec<AudioDeviceInfo> = Vec::new();

        let inputs = host
            .input_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        for device in inputs {
            let Ok(name) = device.name() else { continue };
            let channels = device
                .default_input_config()
                .map(|config| config.channels())
                .unwrap_or(0);
            devices.push(AudioDeviceInfo {
                is_default: default_input.as_deref() == Some(name.as_str()),
                name,
                is_input: true,
                is_output: false,
                channels,
                host_api: host_api.clone(),
            });
        }

        let outputs = host
            .output_devices()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        for device in outputs {
            let Ok(name) = device.name() else { continue };
            let is_default = default_output.as_deref() == Some(name.as_str());
            if let Some(existing) = devices.iter_mut().find(|info| info.name == name) {
                existing.is_output = true;
                existing.is_default |= is_default;
                continue;
            }
            let channels = device
                .default_output_config()
                .map(|config| config.channels())
                .unwrap_or(0);
            devices.push(AudioDeviceInfo {
                name,
                is_input: false,
                is_output: true,
                is_default,
                channels,
                host_api: host_api.clone(),
            });
        }

        Ok(devices)
    }

    fn resolve_device(&self, kind: DeviceKind, name: &str) -> Result<String, DeviceError> {
        let device = match kind {
            DeviceKind::Capture => self.find_capture_device(name)?,
            DeviceKind::Playback => self.find_playback_device(name)?,
        };
        device.name().map_err(|e| DeviceError::Backend(e.to_string()))
    }

    fn open_capture(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn CaptureSource>, DeviceError> {
        let device = self.find_capture_device(name)?;
        let source = CpalCaptureSource::open(device, settings)?;
        Ok(Box::new(source))
    }

    fn open_playback(
        &self,
        name: &str,
        settings: &StreamSettings,
    ) -> Result<Box<dyn PlaybackSink>, DeviceError> {
        let device = self.find_playback_device(name)?;
        let sink = CpalPlaybackSink::open(device, settings)?;
        Ok(Box::new(sink))
    }
}

/// Stream flags shared with the cpal error callback
#[derive(Debug, Default)]
struct StreamHealth {
    disconnected: AtomicBool,
    dropped_samples: AtomicU64,
}

fn stream_error(device: &str, reason: impl ToString) -> DeviceError {
    DeviceError::Stream {
        device: device.to_string(),
        reason: reason.to_string(),
    }
}

fn error_callback(
    device_name: String,
    health: Arc<StreamHealth>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            health.disconnected.store(true, Ordering::Release);
        }
        error!("{} stream error on '{}': {}", "AUDIO_DEVICE".red(), device_name, err);
    }
}

pub struct CpalCaptureSource {
    name: String,
    channels: u16,
    settings: StreamSettings,
    consumer: Consumer<f32>,
    health: Arc<StreamHealth>,
    _stream: cpal::Stream,
}

impl CpalCaptureSource {
    fn open(device: cpal::Device, settings: &StreamSettings) -> Result<Self, DeviceError> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        // Output devices opened for loopback only expose an output config
        let default_config = device
            .default_input_config()
            .or_else(|_| device.default_output_config())
            .map_err(|e| stream_error(&name, e))?;

        let channels = settings.channels.unwrap_or_else(|| default_config.channels());
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(settings.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = settings.frames_per_cycle.max(settings.block_size) * channels as usize * RING_BUFFER_BLOCKS;
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);
        let health = Arc::new(StreamHealth::default());

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => build_capture_stream::<f32>(&device, &config, producer, &name, &health),
            SampleFormat::I16 => build_capture_stream::<i16>(&device, &config, producer, &name, &health),
            SampleFormat::U16 => build_capture_stream::<u16>(&device, &config, producer, &name, &health),
            other => {
                return Err(stream_error(&name, format!("Unsupported sample format: {:?}", other)));
            }
        }?;

        stream.play().map_err(|e| stream_error(&name, e))?;

        info!(
            "{} Capture stream on '{}' ({} Hz, {} ch, {:?})",
            "AUDIO_DEVICE".green(),
            name,
            settings.sample_rate,
            channels,
            default_config.sample_format()
        );

        Ok(Self {
            name,
            channels,
            settings: settings.clone(),
            consumer,
            health,
            _stream: stream,
        })
    }
}

fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: Producer<f32>,
    name: &str,
    health: &Arc<StreamHealth>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let callback_health = health.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for (written, &sample) in data.iter().enumerate() {
                    if producer.push(sample.to_sample::<f32>()).is_err() {
                        callback_health
                            .dropped_samples
                            .fetch_add((data.len() - written) as u64, Ordering::Relaxed);
                        break;
                    }
                }
            },
            error_callback(name.to_string(), health.clone()),
            None,
        )
        .map_err(|e| stream_error(name, e))
}

impl CaptureSource for CpalCaptureSource {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    /// Waits up to two blocks of real time for a full block; a device that
    /// produces nothing in that window yields a silent block.
    fn read_block(&mut self, frame_count: usize) -> Result<AudioBlock, DeviceError> {
        let needed = frame_count * self.channels as usize;
        let deadline = Instant::now() + self.settings.duration_of(frame_count) * 2;

        while self.consumer.slots() < needed {
            if self.health.disconnected.load(Ordering::Acquire) || self.consumer.is_abandoned() {
                return Err(DeviceError::Disconnected(self.name.clone()));
            }
            if Instant::now() >= deadline {
                return Ok(AudioBlock::silent(frame_count, self.channels));
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let chunk = self
            .consumer
            .read_chunk(needed)
            .map_err(|e| stream_error(&self.name, e))?;
        let (first, second) = chunk.as_slices();
        let mut samples = Vec::with_capacity(needed);
        samples.extend_from_slice(first);
        samples.extend_from_slice(second);
        chunk.commit_all();

        let dropped = self.health.dropped_samples.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!(
                "{} Capture ring buffer full on '{}', lost {} samples",
                "AUDIO_DEVICE".yellow(),
                self.name,
                dropped
            );
        }

        AudioBlock::new(samples, self.channels).map_err(|e| stream_error(&self.name, e))
    }
}

pub struct CpalPlaybackSink {
    name: String,
    channels: u16,
    settings: StreamSettings,
    producer: Producer<f32>,
    health: Arc<StreamHealth>,
    _stream: cpal::Stream,
}

impl CpalPlaybackSink {
    fn open(device: cpal::Device, settings: &StreamSettings) -> Result<Self, DeviceError> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default_config = device
            .default_output_config()
            .map_err(|e| stream_error(&name, e))?;

        let channels = settings.channels.unwrap_or_else(|| default_config.channels());
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(settings.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = settings.frames_per_cycle.max(settings.block_size) * channels as usize * RING_BUFFER_BLOCKS;
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);
        let health = Arc::new(StreamHealth::default());

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => build_playback_stream::<f32>(&device, &config, consumer, &name, &health),
            SampleFormat::I16 => build_playback_stream::<i16>(&device, &config, consumer, &name, &health),
            SampleFormat::U16 => build_playback_stream::<u16>(&device, &config, consumer, &name, &health),
            other => {
                return Err(stream_error(&name, format!("Unsupported sample format: {:?}", other)));
            }
        }?;

        stream.play().map_err(|e| stream_error(&name, e))?;

        info!(
            "{} Playback stream on '{}' ({} Hz, {} ch, {:?})",
            "AUDIO_DEVICE".green(),
            name,
            settings.sample_rate,
            channels,
            default_config.sample_format()
        );

        Ok(Self {
            name,
            channels,
            settings: settings.clone(),
            producer,
            health,
            _stream: stream,
        })
    }
}

fn build_playback_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    name: &str,
    health: &Arc<StreamHealth>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    *slot = match consumer.pop() {
                        Ok(sample) => T::from_sample(sample),
                        Err(_) => T::EQUILIBRIUM,
                    };
                }
            },
            error_callback(name.to_string(), health.clone()),
            None,
        )
        .map_err(|e| stream_error(name, e))
}

impl PlaybackSink for CpalPlaybackSink {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    /// Blocks while the device drains its buffer, for at most two blocks of
    /// real time.
    fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
        if block.channel_count() != self.channels {
            return Err(stream_error(
                &self.name,
                format!(
                    "block has {} channels, stream has {}",
                    block.channel_count(),
                    self.channels
                ),
            ));
        }

        let samples = block.samples();
        let deadline = Instant::now() + self.settings.duration_of(block.frame_count()) * 2;
        let mut written = 0;

        while written < samples.len() {
            if self.health.disconnected.load(Ordering::Acquire) || self.producer.is_abandoned() {
                return Err(DeviceError::Disconnected(self.name.clone()));
            }

            let free = self.producer.slots();
            if free == 0 {
                if Instant::now() >= deadline {
                    return Err(stream_error(
                        &self.name,
                        format!("device buffer full, {} samples not written", samples.len() - written),
                    ));
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            let end = (written + free).min(samples.len());
            for &sample in &samples[written..end] {
                if self.producer.push(sample).is_err() {
                    break;
                }
                written += 1;
            }
        }

        Ok(())
    }
}
