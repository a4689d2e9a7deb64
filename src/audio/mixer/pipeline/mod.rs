// Real-time equalizer pipeline
//
// Architecture:
// Capture Loop:  device block → [master volume + fan-out equalizer] → Transfer Queue
// Playback Loop: Transfer Queue → device
//
// The two loops run on their own threads and only meet at the transfer
// queue. The pipeline manager owns their lifecycle.

pub mod context;
pub mod input_worker;
pub mod output_worker;
pub mod pipeline_manager;
pub mod queue_types;
pub mod stats;

pub use context::PipelineContext;
pub use input_worker::{CaptureLoop, CycleOutcome};
pub use output_worker::{PlaybackLoop, PlaybackOutcome};
pub use pipeline_manager::{EqualizerPipeline, PipelineSettings, ShutdownReport};
pub use queue_types::*;
pub use stats::{PipelineStats, PipelineStatsSnapshot};
