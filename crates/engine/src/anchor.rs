//! Two-click range selection: the first click pins a pivot, the second
//! confirms the span between them. Drives command formatting from a live
//! cursor position; it never touches the partition itself.

use serde::{Deserialize, Serialize};

use script::timecode::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorResponse {
    /// Entered recording; live preview starts as a zero-width range.
    Preview(f64, f64),
    /// Second click landed; the selection is final and the machine is idle.
    Confirmed(f64, f64),
}

#[derive(Debug, Default)]
pub struct AnchorLogic {
    pivot: Option<f64>,
}

impl AnchorLogic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AnchorState {
        if self.pivot.is_some() {
            AnchorState::Recording
        } else {
            AnchorState::Idle
        }
    }

    /// First click pins the pivot and starts recording; a second click is
    /// routed to [`confirm`](Self::confirm).
    pub fn set_pivot(&mut self, t: f64) -> AnchorResponse {
        match self.pivot {
            None => {
                self.pivot = Some(t);
                AnchorResponse::Preview(t, t)
            }
            Some(_) => {
                let (start, end) = self.confirm(t);
                AnchorResponse::Confirmed(start, end)
            }
        }
    }

    /// Live feedback between the two clicks; does not change state.
    pub fn preview(&self, t: f64) -> Option<(f64, f64)> {
        self.pivot.map(|p| ordered(p, t))
    }

    /// Close the selection and reset. While idle this degenerates to the
    /// zero-width range `(t, t)` rather than erroring.
    pub fn confirm(&mut self, t: f64) -> (f64, f64) {
        match self.pivot.take() {
            Some(p) => ordered(p, t),
            None => (t, t),
        }
    }

    /// Discard any pivot; no range is produced.
    pub fn cancel(&mut self) {
        self.pivot = None;
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    (a.min(b), a.max(b))
}

/// Format a canonical range command line (`HIDE`, `SHOW`, `DELETE`, `MERGE`)
/// from a confirmed selection, ready to append to the script.
pub fn format_range_command(keyword: &str, range: (f64, f64)) -> String {
    format!(
        "{} {} {}",
        keyword.to_ascii_uppercase(),
        format_timestamp(range.0),
        format_timestamp(range.1)
    )
}
