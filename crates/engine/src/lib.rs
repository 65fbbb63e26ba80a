//! Applies parsed command sequences to the segment partition and hosts the
//! debounced reprocess pipeline that re-derives the whole timeline from
//! scratch on every script change.

mod anchor;
mod executor;
mod pipeline;
mod report;

pub use anchor::{format_range_command, AnchorLogic, AnchorResponse, AnchorState};
pub use executor::{
    run_script, CommandExecutor, FixedDurationProbe, MapProbe, MediaProbe, ProbeError,
};
pub use pipeline::{PipelineConfig, ReprocessOutcome, ReprocessPipeline};
pub use report::{CommandOutcome, CommandResult, ExecutionReport};
