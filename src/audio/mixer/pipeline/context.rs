use std::sync::Arc;

use super::queue_types::TransferQueue;
use super::stats::PipelineStats;
use crate::audio::mixer::control_state::{ControlState, RunState};

/// Shared handles one pipeline run hands to both loops
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub control: Arc<ControlState>,
    pub run_state: Arc<RunState>,
    pub queue: TransferQueue,
    pub stats: Arc<PipelineStats>,
}

impl PipelineContext {
    /// Fresh run flags and transfer queue; control state and counters are
    /// carried over from the owner.
    pub fn new(control: Arc<ControlState>, stats: Arc<PipelineStats>, queue_capacity: usize) -> Self {
        Self {
            control,
            run_state: Arc::new(RunState::new()),
            queue: TransferQueue::new(queue_capacity),
            stats,
        }
    }
}
