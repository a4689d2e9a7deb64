// Capture side of the pipeline
//
// One dedicated thread that:
// 1. Reads a fixed-size block from the capture source
// 2. Skips (and idles briefly on) digital silence
// 3. Applies master volume and runs the fan-out equalizer
// 4. Hands the result to the playback side through the transfer queue

use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use tracing::{error, info, warn};

use super::context::PipelineContext;
use crate::audio::devices::CaptureSource;
use crate::audio::effects::BandEqualizer;
use crate::audio::errors::DeviceError;

/// What one capture cycle did with its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Queued,
    Silent,
    DroppedOverflow,
    DroppedFault,
    CaptureFailed,
}

pub struct CaptureLoop {
    source: Box<dyn CaptureSource>,
    equalizer: Arc<BandEqualizer>,
    context: PipelineContext,
    frames_per_cycle: usize,
    silence_idle: Duration,
    cycles: u64,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn CaptureSource>,
        equalizer: Arc<BandEqualizer>,
        context: PipelineContext,
        frames_per_cycle: usize,
        silence_idle: Duration,
    ) -> Self {
        Self {
            source,
            equalizer,
            context,
            frames_per_cycle,
            silence_idle,
            cycles: 0,
        }
    }

    pub fn device_name(&self) -> String {
        self.source.device_name()
    }

    pub fn channel_count(&self) -> u16 {
        self.source.channel_count()
    }

    /// Run one read -> equalize -> enqueue cycle. Never fails; every
    /// steady-state problem is logged, counted and folded into the outcome.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        let stats = &self.context.stats;

        let mut block = match self.source.read_block(self.frames_per_cycle) {
            Ok(block) => block,
            Err(DeviceError::Disconnected(device)) => {
                error!(
                    "{} Capture device '{}' disconnected, stopping pipeline",
                    "CAPTURE_LOOP".red(),
                    device
                );
                stats.record_capture_error();
                self.context.run_state.request_stop();
                return CycleOutcome::CaptureFailed;
            }
            Err(e) => {
                warn!("{} Capture read failed: {}", "CAPTURE_LOOP".yellow(), e);
                stats.record_capture_error();
                std::thread::sleep(self.silence_idle);
                return CycleOutcome::CaptureFailed;
            }
        };
        stats.record_captured();

        if block.is_silent() {
            stats.record_silent();
            std::thread::sleep(self.silence_idle);
            return CycleOutcome::Silent;
        }

        let started = Instant::now();
        let controls = self.context.control.snapshot();
        block.scale(controls.master_volume);

        let equalized = match self.equalizer.equalize(&block, &controls.gains) {
            Ok(equalized) => equalized,
            Err(e) => {
                error!(
                    "{} Equalization failed, dropping audio block: {}",
                    "CAPTURE_LOOP".red(),
                    e
                );
                stats.record_fault_drop();
                return CycleOutcome::DroppedFault;
            }
        };
        stats.record_equalized();

        crate::audio_debug!(
            "CAPTURE_LOOP: cycle #{} equalized {} frames in {}μs (controls v{})",
            self.cycles,
            equalized.frame_count(),
            started.elapsed().as_micros(),
            controls.version
        );

        if self.context.queue.try_push(equalized) {
            CycleOutcome::Queued
        } else {
            warn!("Internal audio buffer overflow, dropping audio block");
            stats.record_overflow_drop();
            CycleOutcome::DroppedOverflow
        }
    }

    /// Cycle until a stop is requested, then release the capture device and
    /// tell the playback side to stop too.
    pub fn run(mut self) {
        info!(
            "{} Started on '{}' ({} frames per cycle)",
            "CAPTURE_LOOP".green(),
            self.source.device_name(),
            self.frames_per_cycle
        );

        while self.context.run_state.should_continue() {
            self.run_cycle();
        }

        let device = self.source.device_name();
        let cycles = self.cycles;
        let run_state = self.context.run_state.clone();
        drop(self);
        run_state.request_stop();

        info!(
            "{} Stopped on '{}' after {} cycles",
            "CAPTURE_LOOP".green(),
            device,
            cycles
        );
    }
}
