//! Exclusive playback arbitration.
//!
//! Exactly one segment may hold the active-playback token at a time, and a
//! handoff is sequenced: the previous holder must release before the next
//! acquire succeeds. Injected where needed instead of living in a global.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::segment::SegmentId;
use crate::TimelineError;

#[derive(Default)]
pub struct PlaybackArbiter {
    current: Mutex<Option<SegmentId>>,
}

impl PlaybackArbiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { current: Mutex::new(None) })
    }

    /// Take the playback token for `id`. Fails while another holder is live.
    pub fn acquire(self: &Arc<Self>, id: SegmentId) -> Result<PlaybackToken, TimelineError> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(TimelineError::PlaybackBusy);
        }
        *current = Some(id.clone());
        tracing::debug!(segment = %id, "playback token acquired");
        Ok(PlaybackToken {
            arbiter: Arc::clone(self),
            id: Some(id),
        })
    }

    pub fn holder(&self) -> Option<SegmentId> {
        self.current.lock().clone()
    }

    fn release(&self, id: &SegmentId) {
        let mut current = self.current.lock();
        if current.as_ref() == Some(id) {
            *current = None;
            tracing::debug!(segment = %id, "playback token released");
        }
    }
}

/// Ownership of the single playback slot. Released explicitly or on drop.
pub struct PlaybackToken {
    arbiter: Arc<PlaybackArbiter>,
    id: Option<SegmentId>,
}

impl PlaybackToken {
    pub fn segment_id(&self) -> &SegmentId {
        // Invariant: `id` is only None after release consumed self.
        self.id.as_ref().expect("token already released")
    }

    pub fn release(mut self) {
        if let Some(id) = self.id.take() {
            self.arbiter.release(&id);
        }
    }
}

impl Drop for PlaybackToken {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.arbiter.release(&id);
        }
    }
}
