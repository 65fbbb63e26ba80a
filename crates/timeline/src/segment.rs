use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque segment identifier, stable for the lifetime of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentState {
    Stopped,
    Playing,
    Hidden,
}

/// A contiguous sub-range of the source media timeline. `start`/`end` are
/// source-media offsets in seconds and survive deletes unchanged, so a
/// partition can legitimately contain gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegment {
    pub id: SegmentId,
    pub start: f64,
    pub end: f64,
    pub visible: bool,
    pub state: SegmentState,
    pub video_path: String,
    pub speed: f64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub free_texts: Vec<String>,
}

impl VideoSegment {
    pub fn new(video_path: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: SegmentId::new(),
            start,
            end,
            visible: true,
            state: SegmentState::Stopped,
            video_path: video_path.into(),
            speed: 1.0,
            title: None,
            subtitle: None,
            free_texts: Vec::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Playback duration after the speed rate is applied.
    pub fn effective_duration(&self) -> f64 {
        self.duration() / self.speed
    }

    /// Clone with a fresh id and new bounds, keeping every other property.
    /// Used when a range operation splits a segment at an intersection point.
    pub(crate) fn sliced(&self, start: f64, end: f64) -> Self {
        let mut out = self.clone();
        out.id = SegmentId::new();
        out.start = start;
        out.end = end;
        out
    }
}
