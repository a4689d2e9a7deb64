// Pipeline Manager: owns the equalizer pipeline lifecycle
//
// - Builds the filter bank, DSP worker pool and control state once
// - start(): resolves devices, then launches the capture loop and the
//   playback loop on their own threads and waits for both to confirm
// - stop(): cooperative stop with a bounded grace period; a loop that does
//   not exit in time is detached with a warning

use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use serde::Serialize;
use tracing::{error, info, warn};

use super::context::PipelineContext;
use super::input_worker::CaptureLoop;
use super::output_worker::PlaybackLoop;
use super::queue_types::QueueInfo;
use super::stats::{PipelineStats, PipelineStatsSnapshot};
use crate::audio::devices::{AudioDeviceInfo, DeviceProvider, StreamSettings};
use crate::audio::effects::{BandEqualizer, FilterBank};
use crate::audio::errors::{DeviceError, DeviceKind, PipelineError};
use crate::audio::mixer::control_state::{ControlState, PipelinePhase};
use crate::audio::types::FrequencyBand;
use crate::config::EqualizerConfig;
use crate::types::DEFAULT_LAUNCH_TIMEOUT_MS;

/// Runtime parameters of one pipeline, derived from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub input_device_name: String,
    pub output_device_name: String,
    pub sample_rate: u32,
    pub block_size: usize,
    pub frames_per_cycle: usize,
    pub initial_volume: f32,
    /// 0 means unbounded
    pub queue_capacity: usize,
    pub dsp_workers: usize,
    pub shutdown_grace: Duration,
    pub capture_idle: Duration,
    pub playback_idle: Duration,
    pub launch_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &EqualizerConfig) -> Self {
        Self {
            input_device_name: config.input_device_name.clone(),
            output_device_name: config.output_device_name.clone(),
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            frames_per_cycle: config.frames_per_cycle(),
            initial_volume: config.initial_volume,
            queue_capacity: config.max_queue_size,
            dsp_workers: config.num_dsp_workers,
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
            capture_idle: Duration::from_millis(config.capture_idle_ms),
            playback_idle: Duration::from_micros(config.playback_idle_us),
            launch_timeout: Duration::from_millis(DEFAULT_LAUNCH_TIMEOUT_MS),
        }
    }

    fn stream_settings(&self, channels: Option<u16>) -> StreamSettings {
        StreamSettings {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            frames_per_cycle: self.frames_per_cycle,
            channels,
        }
    }
}

/// Outcome of a stop request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownReport {
    /// Both loops exited within the grace period
    pub clean: bool,
    /// Queued blocks thrown away instead of played
    pub discarded_blocks: usize,
    pub elapsed: Duration,
}

impl ShutdownReport {
    fn already_idle() -> Self {
        Self {
            clean: true,
            discarded_blocks: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// One started pipeline: the shared context plus exit notifications for the
/// two loop threads. The exit channels never carry a message; they
/// disconnect when the thread holding the sender finishes.
struct ActiveRun {
    context: PipelineContext,
    capture_exit: Receiver<()>,
    playback_exit: Receiver<()>,
    capture_device: String,
    playback_device: String,
}

pub struct EqualizerPipeline {
    settings: PipelineSettings,
    provider: Arc<dyn DeviceProvider>,
    equalizer: Arc<BandEqualizer>,
    control: Arc<ControlState>,
    stats: Arc<PipelineStats>,
    active: Option<ActiveRun>,
}

impl EqualizerPipeline {
    /// Build the pipeline around an already designed filter bank. Nothing is
    /// opened until `start()`.
    pub fn new(
        settings: PipelineSettings,
        filters: FilterBank,
        provider: Arc<dyn DeviceProvider>,
    ) -> Result<Self, PipelineError> {
        let filters = Arc::new(filters);
        let control = Arc::new(ControlState::new(filters.len(), settings.initial_volume));
        let equalizer = Arc::new(BandEqualizer::new(filters, settings.dsp_workers)?);

        info!(
            "🏗️ {} Created ({} Hz, {} frames per cycle, queue {})",
            "EQ_PIPELINE".green(),
            settings.sample_rate,
            settings.frames_per_cycle,
            if settings.queue_capacity == 0 {
                "unbounded".to_string()
            } else {
                settings.queue_capacity.to_string()
            }
        );

        Ok(Self {
            settings,
            provider,
            equalizer,
            control,
            stats: Arc::new(PipelineStats::default()),
            active: None,
        })
    }

    /// Design the filter bank described by `config` and build the pipeline
    pub fn from_config(
        config: &EqualizerConfig,
        provider: Arc<dyn DeviceProvider>,
    ) -> Result<Self, PipelineError> {
        let filters = FilterBank::build(config.sample_rate, config.frequency_bands(), config.filter_order)?;
        Self::new(PipelineSettings::from_config(config), filters, provider)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    pub fn filter_bank(&self) -> &FilterBank {
        self.equalizer.filter_bank()
    }

    pub fn bands(&self) -> Vec<FrequencyBand> {
        self.filter_bank().bands().copied().collect()
    }

    /// Counters accumulated over every run of this pipeline
    pub fn get_stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue_info(&self) -> Option<QueueInfo> {
        self.active
            .as_ref()
            .map(|active| active.context.queue.get_queue_info())
    }

    pub fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, DeviceError> {
        self.provider.list_devices()
    }

    /// True while a started run has not been asked to stop. A run that
    /// stopped itself (device disconnect) reports false.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| active.context.run_state.should_continue())
            .unwrap_or(false)
    }

    pub fn phase(&self) -> PipelinePhase {
        self.active
            .as_ref()
            .map(|active| active.context.run_state.phase())
            .unwrap_or(PipelinePhase::Idle)
    }

    /// Names of the devices the current run is using
    pub fn active_devices(&self) -> Option<(String, String)> {
        self.active
            .as_ref()
            .map(|active| (active.capture_device.clone(), active.playback_device.clone()))
    }

    /// Resolve both devices, launch the capture and playback loops and return
    /// once both have opened their devices. Any startup error is returned and
    /// leaves the pipeline idle.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        if self.active.is_some() {
            // Previous run ended on its own; reap it first
            self.stop();
        }

        let capture_device = self
            .provider
            .resolve_device(DeviceKind::Capture, &self.settings.input_device_name)?;
        let playback_device = self
            .provider
            .resolve_device(DeviceKind::Playback, &self.settings.output_device_name)?;

        info!(
            "🚀 {} Starting: '{}' -> '{}'",
            "EQ_PIPELINE".green(),
            capture_device,
            playback_device
        );

        let context = PipelineContext::new(
            self.control.clone(),
            self.stats.clone(),
            self.settings.queue_capacity,
        );
        context.run_state.mark_running();

        let (capture_exit, channels) = match self.launch_capture(&context, &capture_device) {
            Ok(launched) => launched,
            Err(e) => {
                abort_launch(&context);
                return Err(e);
            }
        };

        let playback_exit = match self.launch_playback(&context, &playback_device, channels) {
            Ok(exit) => exit,
            Err(e) => {
                abort_launch(&context);
                if !wait_for_exit(&capture_exit, Instant::now() + self.settings.shutdown_grace) {
                    warn!(
                        "⚠️ {} Capture loop did not stop after failed launch, detaching it",
                        "EQ_PIPELINE".yellow()
                    );
                }
                return Err(e);
            }
        };

        info!(
            "✅ {} Running ({} channels, {} bands)",
            "EQ_PIPELINE".green(),
            channels,
            self.equalizer.filter_bank().len()
        );

        self.active = Some(ActiveRun {
            context,
            capture_exit,
            playback_exit,
            capture_device,
            playback_device,
        });
        Ok(())
    }

    /// Spawn the capture thread; it opens the device itself and reports the
    /// device's channel count back before entering its loop.
    fn launch_capture(
        &self,
        context: &PipelineContext,
        device: &str,
    ) -> Result<(Receiver<()>, u16), PipelineError> {
        let (launch_tx, launch_rx) = channel::bounded::<Result<u16, DeviceError>>(1);
        let (exit_tx, exit_rx) = channel::bounded::<()>(0);

        let provider = self.provider.clone();
        let equalizer = self.equalizer.clone();
        let loop_context = context.clone();
        let device_name = device.to_string();
        let stream_settings = self.settings.stream_settings(None);
        let frames_per_cycle = self.settings.frames_per_cycle;
        let idle = self.settings.capture_idle;

        std::thread::Builder::new()
            .name("live-eq-capture".to_string())
            .spawn(move || {
                let _exit = exit_tx;
                let source = match provider.open_capture(&device_name, &stream_settings) {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = launch_tx.send(Err(e));
                        return;
                    }
                };
                let _ = launch_tx.send(Ok(source.channel_count()));
                CaptureLoop::new(source, equalizer, loop_context, frames_per_cycle, idle).run();
            })?;

        let channels = self.await_launch(&launch_rx, DeviceKind::Capture)?;
        Ok((exit_rx, channels))
    }

    fn launch_playback(
        &self,
        context: &PipelineContext,
        device: &str,
        channels: u16,
    ) -> Result<Receiver<()>, PipelineError> {
        let (launch_tx, launch_rx) = channel::bounded::<Result<u16, DeviceError>>(1);
        let (exit_tx, exit_rx) = channel::bounded::<()>(0);

        let provider = self.provider.clone();
        let loop_context = context.clone();
        let device_name = device.to_string();
        let stream_settings = self.settings.stream_settings(Some(channels));
        let idle = self.settings.playback_idle;

        std::thread::Builder::new()
            .name("live-eq-playback".to_string())
            .spawn(move || {
                let _exit = exit_tx;
                let sink = match provider.open_playback(&device_name, &stream_settings) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = launch_tx.send(Err(e));
                        return;
                    }
                };
                let _ = launch_tx.send(Ok(channels));
                PlaybackLoop::new(sink, loop_context, idle).run();
            })?;

        self.await_launch(&launch_rx, DeviceKind::Playback)?;
        Ok(exit_rx)
    }

    fn await_launch(
        &self,
        launch_rx: &Receiver<Result<u16, DeviceError>>,
        kind: DeviceKind,
    ) -> Result<u16, PipelineError> {
        match launch_rx.recv_timeout(self.settings.launch_timeout) {
            Ok(Ok(channels)) => Ok(channels),
            Ok(Err(e)) => {
                error!("❌ {} Failed to open {} device: {}", "EQ_PIPELINE".red(), kind, e);
                Err(e.into())
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                error!(
                    "❌ {} {} loop did not confirm launch",
                    "EQ_PIPELINE".red(),
                    kind
                );
                Err(PipelineError::LaunchTimeout {
                    kind,
                    timeout_ms: self.settings.launch_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Ask both loops to stop and wait for them up to the grace period. Never
    /// fails: loops that overrun the grace period are detached and reported
    /// through `ShutdownReport::clean`.
    pub fn stop(&mut self) -> ShutdownReport {
        let Some(active) = self.active.take() else {
            return ShutdownReport::already_idle();
        };

        info!("🛑 {} Stopping...", "EQ_PIPELINE".green());
        let started = Instant::now();
        let deadline = started + self.settings.shutdown_grace;
        active.context.run_state.request_stop();

        let capture_stopped = wait_for_exit(&active.capture_exit, deadline);
        let playback_stopped = wait_for_exit(&active.playback_exit, deadline);
        if !capture_stopped {
            warn!(
                "⚠️ {} Capture loop on '{}' did not stop within {:?}, detaching it",
                "EQ_PIPELINE".yellow(),
                active.capture_device,
                self.settings.shutdown_grace
            );
        }
        if !playback_stopped {
            warn!(
                "⚠️ {} Playback loop on '{}' did not stop within {:?}, detaching it",
                "EQ_PIPELINE".yellow(),
                active.playback_device,
                self.settings.shutdown_grace
            );
        }

        let discarded_blocks = active.context.queue.clear();
        active.context.run_state.mark_idle();

        let report = ShutdownReport {
            clean: capture_stopped && playback_stopped,
            discarded_blocks,
            elapsed: started.elapsed(),
        };
        info!(
            "✅ {} Stopped in {:?} ({} queued blocks discarded)",
            "EQ_PIPELINE".green(),
            report.elapsed,
            report.discarded_blocks
        );
        report
    }

    /// Start when idle, stop when running. Returns whether the pipeline is
    /// running afterwards.
    pub fn toggle(&mut self) -> Result<bool, PipelineError> {
        if self.is_running() {
            self.stop();
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }
}

impl Drop for EqualizerPipeline {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for EqualizerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqualizerPipeline")
            .field("settings", &self.settings)
            .field("equalizer", &self.equalizer)
            .field("phase", &self.phase())
            .finish()
    }
}

fn abort_launch(context: &PipelineContext) {
    context.run_state.request_stop();
    context.run_state.mark_idle();
}

/// True once the thread owning the paired sender has exited
fn wait_for_exit(exit: &Receiver<()>, deadline: Instant) -> bool {
    match exit.recv_deadline(deadline) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}
