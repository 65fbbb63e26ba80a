//! Applies an ordered command batch against a [`SegmentManager`].
//!
//! Execution is fail-soft: a command whose precondition does not hold is
//! recorded in the report and the batch keeps going, so one bad script line
//! never blocks the rest of the edit list.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use script::{parse_commands, parse_scene_blocks, CommandKind, EditCommand, SceneBlock};
use timeline::{SegmentAnnotation, SegmentManager};

use crate::report::{CommandResult, ExecutionReport};

#[derive(Debug, Error, Clone)]
#[error("unable to probe `{path}`: {message}")]
pub struct ProbeError {
    pub path: String,
    pub message: String,
}

/// External collaborator that knows media durations. The engine never
/// derives a duration itself.
pub trait MediaProbe {
    fn duration_of(&self, path: &str) -> Result<f64, ProbeError>;
}

impl<T: MediaProbe + ?Sized> MediaProbe for &T {
    fn duration_of(&self, path: &str) -> Result<f64, ProbeError> {
        (**self).duration_of(path)
    }
}

impl<T: MediaProbe + ?Sized> MediaProbe for Arc<T> {
    fn duration_of(&self, path: &str) -> Result<f64, ProbeError> {
        (**self).duration_of(path)
    }
}

/// Reports the same duration for every path. The CLI uses this with a
/// user-declared duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDurationProbe(pub f64);

impl MediaProbe for FixedDurationProbe {
    fn duration_of(&self, _path: &str) -> Result<f64, ProbeError> {
        Ok(self.0)
    }
}

/// Path→duration lookup; unknown paths fail the LOAD that names them.
#[derive(Debug, Clone, Default)]
pub struct MapProbe {
    durations: HashMap<String, f64>,
}

impl MapProbe {
    pub fn with(mut self, path: impl Into<String>, duration: f64) -> Self {
        self.durations.insert(path.into(), duration);
        self
    }
}

impl MediaProbe for MapProbe {
    fn duration_of(&self, path: &str) -> Result<f64, ProbeError> {
        self.durations.get(path).copied().ok_or_else(|| ProbeError {
            path: path.to_string(),
            message: "unknown media file".to_string(),
        })
    }
}

pub struct CommandExecutor<P> {
    probe: P,
}

impl<P: MediaProbe> CommandExecutor<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Execute the batch in script order. Never fails as a whole.
    pub fn apply(&self, manager: &mut SegmentManager, commands: &[EditCommand]) -> ExecutionReport {
        self.apply_cancellable(manager, commands, || false)
            .unwrap_or_default()
    }

    /// Like [`apply`](Self::apply), but checks `is_stale` between commands.
    /// Returns `None` when the run was abandoned; the caller is expected to
    /// be working on a scratch manager so nothing partial becomes visible.
    pub fn apply_cancellable(
        &self,
        manager: &mut SegmentManager,
        commands: &[EditCommand],
        is_stale: impl Fn() -> bool,
    ) -> Option<ExecutionReport> {
        let mut report = ExecutionReport::default();
        for command in commands {
            if is_stale() {
                tracing::debug!(line = command.line, "batch superseded, abandoning run");
                return None;
            }
            report.results.push(self.apply_one(manager, command));
        }
        Some(report)
    }

    fn apply_one(&self, manager: &mut SegmentManager, command: &EditCommand) -> CommandResult {
        let rendered = command.to_string();
        let outcome = match &command.kind {
            CommandKind::Load { path } => self
                .probe
                .duration_of(path)
                .map_err(|e| e.to_string())
                .and_then(|duration| {
                    manager
                        .reset(path, duration)
                        .map(|id| vec![id])
                        .map_err(|e| e.to_string())
                }),
            CommandKind::Cut { at } => manager
                .cut(*at)
                .map(|(a, b)| vec![a, b])
                .map_err(|e| e.to_string()),
            CommandKind::Hide { start, end } => manager
                .set_range_visibility(*start, *end, false)
                .map_err(|e| e.to_string()),
            CommandKind::Show { start, end } => manager
                .set_range_visibility(*start, *end, true)
                .map_err(|e| e.to_string()),
            CommandKind::Delete { start, end } => {
                manager.delete_range(*start, *end).map_err(|e| e.to_string())
            }
            CommandKind::Merge { start, end } => manager
                .merge_range(*start, *end)
                .map(|id| vec![id])
                .map_err(|e| e.to_string()),
            CommandKind::Speed { rate, start, end } => manager
                .set_range_speed(*start, *end, *rate)
                .map_err(|e| e.to_string()),
        };
        match outcome {
            Ok(affected) => CommandResult::applied(command.line, rendered, affected),
            Err(message) => {
                tracing::debug!(line = command.line, %message, "command failed");
                CommandResult::failed(command.line, rendered, message)
            }
        }
    }
}

/// Full script pass: parse scene blocks and commands, execute the batch,
/// project block text onto the resulting partition. This is the one entry
/// point the CLI and the reprocess pipeline share.
pub fn run_script<P: MediaProbe>(
    manager: &mut SegmentManager,
    text: &str,
    probe: P,
) -> (Vec<SceneBlock>, ExecutionReport) {
    let blocks = parse_scene_blocks(text);
    let (commands, parse_errors) = parse_commands(text);
    let mut report = CommandExecutor::new(probe).apply(manager, &commands);
    report.parse_errors = parse_errors;
    manager.apply_annotations(&annotations_from(&blocks));
    (blocks, report)
}

pub(crate) fn annotations_from(blocks: &[SceneBlock]) -> Vec<SegmentAnnotation> {
    blocks
        .iter()
        .map(|block| SegmentAnnotation {
            start: block.start,
            end: block.end,
            title: block.title.clone(),
            subtitle: block.subtitle.clone(),
            free_texts: block
                .content
                .as_deref()
                .unwrap_or("")
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .skip(2)
                .map(str::to_string)
                .collect(),
        })
        .collect()
}
