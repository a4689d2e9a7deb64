// Audio mixer module - live control state and the equalizer pipeline

pub mod control_state;
pub mod pipeline;

pub use control_state::{ControlSnapshot, ControlState, PipelinePhase, RunState};
pub use pipeline::{EqualizerPipeline, PipelineSettings, ShutdownReport};
