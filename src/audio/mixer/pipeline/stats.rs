use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-pipeline counters, written by the loops and read by the control surface.
///
/// Backpressure drops and internal-fault drops are counted separately so the
/// two kinds of lost audio can be told apart.
#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_captured: AtomicU64,
    silent_blocks: AtomicU64,
    blocks_equalized: AtomicU64,
    blocks_dropped_overflow: AtomicU64,
    blocks_dropped_fault: AtomicU64,
    blocks_played: AtomicU64,
    underruns: AtomicU64,
    capture_errors: AtomicU64,
    playback_errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub blocks_captured: u64,
    pub silent_blocks: u64,
    pub blocks_equalized: u64,
    pub blocks_dropped_overflow: u64,
    pub blocks_dropped_fault: u64,
    pub blocks_played: u64,
    pub underruns: u64,
    pub capture_errors: u64,
    pub playback_errors: u64,
}

macro_rules! counters {
    ($($field:ident => $record:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*

            pub fn snapshot(&self) -> PipelineStatsSnapshot {
                PipelineStatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    blocks_captured => record_captured,
    silent_blocks => record_silent,
    blocks_equalized => record_equalized,
    blocks_dropped_overflow => record_overflow_drop,
    blocks_dropped_fault => record_fault_drop,
    blocks_played => record_played,
    underruns => record_underrun,
    capture_errors => record_capture_error,
    playback_errors => record_playback_error,
}

impl PipelineStatsSnapshot {
    pub fn blocks_dropped(&self) -> u64 {
        self.blocks_dropped_overflow + self.blocks_dropped_fault
    }
}
