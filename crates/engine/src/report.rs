//! Per-command results and the aggregated batch report. Failures are plain
//! values here; nothing in the engine surfaces them as panics or errors.

use serde::{Deserialize, Serialize};

use script::ParseError;
use timeline::SegmentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Applied,
    Failed(String),
}

/// What happened to one command of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub line: usize,
    /// Canonical rendering of the command, for logs and the error panel.
    pub command: String,
    pub outcome: CommandOutcome,
    pub affected: Vec<SegmentId>,
}

impl CommandResult {
    pub fn applied(line: usize, command: String, affected: Vec<SegmentId>) -> Self {
        Self { line, command, outcome: CommandOutcome::Applied, affected }
    }

    pub fn failed(line: usize, command: String, message: impl Into<String>) -> Self {
        Self {
            line,
            command,
            outcome: CommandOutcome::Failed(message.into()),
            affected: Vec::new(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, CommandOutcome::Applied)
    }
}

/// Aggregated outcome of one full batch: execution results plus the parse
/// errors collected while scanning the script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub results: Vec<CommandResult>,
    pub parse_errors: Vec<ParseError>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.parse_errors.is_empty()
    }

    /// Line-tagged error strings for the error panel, ordered by line.
    pub fn error_lines(&self) -> Vec<String> {
        let mut tagged: Vec<(usize, String)> = self
            .parse_errors
            .iter()
            .map(|e| (e.line, e.to_string()))
            .collect();
        for result in &self.results {
            if let CommandOutcome::Failed(message) = &result.outcome {
                tagged.push((result.line, format!("行{}: {}", result.line, message)));
            }
        }
        tagged.sort_by_key(|(line, _)| *line);
        tagged.into_iter().map(|(_, text)| text).collect()
    }
}
