// Playback side of the pipeline
//
// One dedicated thread that pops equalized blocks off the transfer queue in
// FIFO order and writes them to the playback sink. An empty queue costs a
// very short idle so starvation stays short.

use std::time::Duration;

use colored::*;
use tracing::{error, info, trace, warn};

use super::context::PipelineContext;
use crate::audio::devices::PlaybackSink;
use crate::audio::errors::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Played,
    Underrun,
    WriteFailed,
}

pub struct PlaybackLoop {
    sink: Box<dyn PlaybackSink>,
    context: PipelineContext,
    underrun_idle: Duration,
    blocks_played: u64,
    // A block was popped on the previous cycle
    draining: bool,
}

impl PlaybackLoop {
    pub fn new(sink: Box<dyn PlaybackSink>, context: PipelineContext, underrun_idle: Duration) -> Self {
        Self {
            sink,
            context,
            underrun_idle,
            blocks_played: 0,
            draining: false,
        }
    }

    pub fn device_name(&self) -> String {
        self.sink.device_name()
    }

    /// Pop one block and write it. An underrun is counted once per episode,
    /// when the queue runs dry after a popped block, not on every idle poll.
    pub fn run_cycle(&mut self) -> PlaybackOutcome {
        let stats = &self.context.stats;

        let Some(block) = self.context.queue.try_pop() else {
            if self.draining {
                trace!("PLAYBACK_LOOP: transfer queue ran dry");
                stats.record_underrun();
                self.draining = false;
            }
            std::thread::sleep(self.underrun_idle);
            return PlaybackOutcome::Underrun;
        };
        self.draining = true;

        match self.sink.write_block(&block) {
            Ok(()) => {
                self.blocks_played += 1;
                stats.record_played();
                PlaybackOutcome::Played
            }
            Err(DeviceError::Disconnected(device)) => {
                error!(
                    "{} Playback device '{}' disconnected, stopping pipeline",
                    "PLAYBACK_LOOP".red(),
                    device
                );
                stats.record_playback_error();
                self.context.run_state.request_stop();
                PlaybackOutcome::WriteFailed
            }
            Err(e) => {
                warn!("{} Playback write failed: {}", "PLAYBACK_LOOP".yellow(), e);
                stats.record_playback_error();
                PlaybackOutcome::WriteFailed
            }
        }
    }

    /// Cycle until a stop is requested. Whatever is still queued is left for
    /// the supervisor to discard.
    pub fn run(mut self) {
        info!(
            "{} Started on '{}'",
            "PLAYBACK_LOOP".green(),
            self.sink.device_name()
        );

        while self.context.run_state.should_continue() {
            self.run_cycle();
        }

        info!(
            "{} Stopped on '{}' after {} blocks ({} still queued)",
            "PLAYBACK_LOOP".green(),
            self.sink.device_name(),
            self.blocks_played,
            self.context.queue.len()
        );
    }
}
