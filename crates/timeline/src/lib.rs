//! Canonical segment partition of one source video.
//!
//! The [`SegmentManager`] owns the sorted, non-overlapping segment list and
//! is the only place it is mutated; everything downstream observes it through
//! [`SegmentEvent`]s. The [`PlaybackArbiter`] enforces the external
//! at-most-one-playing-segment constraint.

mod manager;
mod playback;
mod segment;

use thiserror::Error;

pub use manager::{SegmentAnnotation, SegmentEvent, SegmentManager};
pub use playback::{PlaybackArbiter, PlaybackToken};
pub use segment::{SegmentId, SegmentState, VideoSegment};

/// Merge adjacency tolerance: segments closer than this are contiguous.
pub const ADJACENCY_EPSILON: f64 = 0.001;

/// General float comparison slack for boundary tests.
pub(crate) const EPSILON: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("position outside segment")]
    OutsideSegment,

    #[error("no segment intersects range {start:.3}..{end:.3}")]
    NoIntersection { start: f64, end: f64 },

    #[error("non-contiguous merge range")]
    NonContiguousMerge,

    #[error("media duration must be positive, got {0}")]
    InvalidDuration(f64),

    #[error("no media loaded")]
    NoMedia,

    #[error("unknown segment {0}")]
    UnknownSegment(String),

    #[error("segment is hidden and cannot play")]
    HiddenSegment,

    #[error("playback already held by another segment")]
    PlaybackBusy,

    #[error("partition invariant violated: {0}")]
    InvariantViolation(String),
}
