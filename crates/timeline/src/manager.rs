//! Owner of the segment partition. Every mutation is validated against the
//! partition invariant before it commits, and every structural change is
//! published as a [`SegmentEvent`] so observers can reconcile incrementally.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::playback::{PlaybackArbiter, PlaybackToken};
use crate::segment::{SegmentId, SegmentState, VideoSegment};
use crate::{TimelineError, ADJACENCY_EPSILON, EPSILON};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SegmentEvent {
    Added(VideoSegment),
    Removed(SegmentId),
    Updated(VideoSegment),
}

/// Title/subtitle/free-text payload projected onto the segments a time range
/// covers. Produced from scene blocks by the engine crate; the manager only
/// sees plain ranges so the two text models stay decoupled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentAnnotation {
    pub start: f64,
    pub end: f64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub free_texts: Vec<String>,
}

pub struct SegmentManager {
    segments: Vec<VideoSegment>,
    video_path: Option<String>,
    media_duration: f64,
    subscribers: Vec<Sender<SegmentEvent>>,
}

impl Default for SegmentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentManager {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            video_path: None,
            media_duration: 0.0,
            subscribers: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[VideoSegment] {
        &self.segments
    }

    pub fn video_path(&self) -> Option<&str> {
        self.video_path.as_deref()
    }

    pub fn media_duration(&self) -> f64 {
        self.media_duration
    }

    pub fn subscribe(&mut self) -> Receiver<SegmentEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// The segment whose interior strictly contains `t`, if any.
    pub fn segment_at(&self, t: f64) -> Option<&VideoSegment> {
        self.segments
            .iter()
            .find(|s| t > s.start + EPSILON && t < s.end - EPSILON)
    }

    pub fn find(&self, id: &SegmentId) -> Option<&VideoSegment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    /// Reset the partition to a single segment spanning `[0, duration)`.
    pub fn reset(&mut self, path: &str, duration: f64) -> Result<SegmentId, TimelineError> {
        if duration <= 0.0 {
            return Err(TimelineError::InvalidDuration(duration));
        }
        let mut events: Vec<SegmentEvent> = self
            .segments
            .iter()
            .map(|s| SegmentEvent::Removed(s.id.clone()))
            .collect();
        let root = VideoSegment::new(path, 0.0, duration);
        let id = root.id.clone();
        events.push(SegmentEvent::Added(root.clone()));

        self.video_path = Some(path.to_string());
        self.media_duration = duration;
        self.segments = vec![root];
        self.emit(events);
        tracing::debug!(path, duration, "partition reset");
        Ok(id)
    }

    /// Split the segment strictly containing `at` into two contiguous
    /// segments with fresh ids, both stopped.
    pub fn cut(&mut self, at: f64) -> Result<(SegmentId, SegmentId), TimelineError> {
        self.require_media()?;
        let idx = self
            .segments
            .iter()
            .position(|s| at > s.start + EPSILON && at < s.end - EPSILON)
            .ok_or(TimelineError::OutsideSegment)?;

        let mut work = self.segments.clone();
        let source = work.remove(idx);
        let mut left = source.sliced(source.start, at);
        let mut right = source.sliced(at, source.end);
        left.state = SegmentState::Stopped;
        right.state = SegmentState::Stopped;
        let ids = (left.id.clone(), right.id.clone());

        let events = vec![
            SegmentEvent::Removed(source.id.clone()),
            SegmentEvent::Added(left.clone()),
            SegmentEvent::Added(right.clone()),
        ];
        work.insert(idx, right);
        work.insert(idx, left);
        self.commit(work, events)?;
        Ok(ids)
    }

    /// Set visibility (and the matching state) on every segment fully inside
    /// the range, splitting partially-overlapped segments first.
    pub fn set_range_visibility(
        &mut self,
        start: f64,
        end: f64,
        visible: bool,
    ) -> Result<Vec<SegmentId>, TimelineError> {
        self.range_op(start, end, |seg| {
            let state = if visible { SegmentState::Stopped } else { SegmentState::Hidden };
            if seg.visible != visible || seg.state != state {
                seg.visible = visible;
                seg.state = state;
                true
            } else {
                false
            }
        })
    }

    /// Set the speed rate on every segment fully inside the range.
    pub fn set_range_speed(
        &mut self,
        start: f64,
        end: f64,
        rate: f64,
    ) -> Result<Vec<SegmentId>, TimelineError> {
        self.range_op(start, end, |seg| {
            if (seg.speed - rate).abs() > f64::EPSILON {
                seg.speed = rate;
                true
            } else {
                false
            }
        })
    }

    /// Remove every segment fully inside the range. Source-media offsets of
    /// survivors are left unchanged, so the partition keeps a gap.
    pub fn delete_range(&mut self, start: f64, end: f64) -> Result<Vec<SegmentId>, TimelineError> {
        self.require_media()?;
        if !self.intersects(start, end) {
            return Err(TimelineError::NoIntersection { start, end });
        }
        let mut work = self.segments.clone();
        let mut events = Vec::new();
        split_boundary(&mut work, start, &mut events);
        split_boundary(&mut work, end, &mut events);

        let mut removed = Vec::new();
        work.retain(|seg| {
            if covered_by(seg, start, end) {
                events.push(SegmentEvent::Removed(seg.id.clone()));
                removed.push(seg.id.clone());
                false
            } else {
                true
            }
        });
        self.commit(work, events)?;
        Ok(removed)
    }

    /// Coalesce all segments inside the range into one, keeping the earliest
    /// segment's id and properties. Fails without touching the partition if
    /// any gap wider than [`ADJACENCY_EPSILON`] lies inside the range.
    pub fn merge_range(&mut self, start: f64, end: f64) -> Result<SegmentId, TimelineError> {
        self.require_media()?;
        if !self.intersects(start, end) {
            return Err(TimelineError::NoIntersection { start, end });
        }
        let mut work = self.segments.clone();
        let mut events = Vec::new();
        split_boundary(&mut work, start, &mut events);
        split_boundary(&mut work, end, &mut events);

        let covered: Vec<usize> = work
            .iter()
            .enumerate()
            .filter(|(_, seg)| covered_by(seg, start, end))
            .map(|(i, _)| i)
            .collect();
        let (&first_idx, rest) = covered
            .split_first()
            .ok_or(TimelineError::NoIntersection { start, end })?;

        for window in covered.windows(2) {
            let gap = work[window[1]].start - work[window[0]].end;
            if gap > ADJACENCY_EPSILON {
                return Err(TimelineError::NonContiguousMerge);
            }
        }

        let mut merged = work[first_idx].clone();
        merged.end = work[*covered.last().unwrap_or(&first_idx)].end;
        for &idx in rest.iter().rev() {
            let gone = work.remove(idx);
            events.push(SegmentEvent::Removed(gone.id));
        }
        let id = merged.id.clone();
        events.push(SegmentEvent::Updated(merged.clone()));
        work[first_idx] = merged;
        self.commit(work, events)?;
        Ok(id)
    }

    /// Project scene-derived text onto the partition: each segment takes the
    /// title/subtitle of the first annotation containing its midpoint and
    /// collects free text from every annotation that does.
    pub fn apply_annotations(&mut self, annotations: &[SegmentAnnotation]) -> Vec<SegmentId> {
        let mut events = Vec::new();
        let mut changed = Vec::new();
        for seg in &mut self.segments {
            let mid = (seg.start + seg.end) / 2.0;
            let matching: Vec<&SegmentAnnotation> = annotations
                .iter()
                .filter(|a| mid >= a.start && mid < a.end)
                .collect();
            let title = matching.first().and_then(|a| a.title.clone());
            let subtitle = matching.first().and_then(|a| a.subtitle.clone());
            let free_texts: Vec<String> = matching
                .iter()
                .flat_map(|a| a.free_texts.iter().cloned())
                .collect();
            if seg.title != title || seg.subtitle != subtitle || seg.free_texts != free_texts {
                seg.title = title;
                seg.subtitle = subtitle;
                seg.free_texts = free_texts;
                events.push(SegmentEvent::Updated(seg.clone()));
                changed.push(seg.id.clone());
            }
        }
        self.emit(events);
        changed
    }

    /// Switch playback to `id` through the arbiter. The previous playing
    /// segment is stopped before the new one starts, and the returned token
    /// must be released (or dropped) before the next handoff.
    pub fn select_playing(
        &mut self,
        id: &SegmentId,
        arbiter: &Arc<PlaybackArbiter>,
    ) -> Result<PlaybackToken, TimelineError> {
        let idx = self
            .segments
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| TimelineError::UnknownSegment(id.to_string()))?;
        if !self.segments[idx].visible {
            return Err(TimelineError::HiddenSegment);
        }
        let token = arbiter.acquire(id.clone())?;

        let mut events = Vec::new();
        for seg in &mut self.segments {
            if seg.state == SegmentState::Playing && &seg.id != id {
                seg.state = SegmentState::Stopped;
                events.push(SegmentEvent::Updated(seg.clone()));
            }
        }
        if self.segments[idx].state != SegmentState::Playing {
            self.segments[idx].state = SegmentState::Playing;
            events.push(SegmentEvent::Updated(self.segments[idx].clone()));
        }
        self.emit(events);
        Ok(token)
    }

    /// Stop whichever segment is playing, if any.
    pub fn stop_playing(&mut self) {
        let mut events = Vec::new();
        for seg in &mut self.segments {
            if seg.state == SegmentState::Playing {
                seg.state = SegmentState::Stopped;
                events.push(SegmentEvent::Updated(seg.clone()));
            }
        }
        self.emit(events);
    }

    /// Wholesale-replace this partition with another manager's state. Used by
    /// the reprocess pipeline to commit a finished scratch run; observers see
    /// a full remove/add cycle and reconcile from that.
    pub fn adopt(&mut self, source: &SegmentManager) -> Result<(), TimelineError> {
        validate_list(&source.segments)?;
        let mut events: Vec<SegmentEvent> = self
            .segments
            .iter()
            .map(|s| SegmentEvent::Removed(s.id.clone()))
            .collect();
        events.extend(source.segments.iter().cloned().map(SegmentEvent::Added));
        self.segments = source.segments.clone();
        self.video_path = source.video_path.clone();
        self.media_duration = source.media_duration;
        self.emit(events);
        Ok(())
    }

    // ---- internals ----

    fn require_media(&self) -> Result<(), TimelineError> {
        if self.video_path.is_none() {
            return Err(TimelineError::NoMedia);
        }
        Ok(())
    }

    fn intersects(&self, start: f64, end: f64) -> bool {
        self.segments
            .iter()
            .any(|s| s.start < end - EPSILON && s.end > start + EPSILON)
    }

    /// Shared body of hide/show/speed: boundary-split, mutate covered
    /// segments through `mutate`, commit atomically.
    fn range_op(
        &mut self,
        start: f64,
        end: f64,
        mut mutate: impl FnMut(&mut VideoSegment) -> bool,
    ) -> Result<Vec<SegmentId>, TimelineError> {
        self.require_media()?;
        if !self.intersects(start, end) {
            return Err(TimelineError::NoIntersection { start, end });
        }
        let mut work = self.segments.clone();
        let mut events = Vec::new();
        split_boundary(&mut work, start, &mut events);
        split_boundary(&mut work, end, &mut events);

        let mut affected = Vec::new();
        for seg in work.iter_mut().filter(|s| covered_by(s, start, end)) {
            if mutate(seg) {
                events.push(SegmentEvent::Updated(seg.clone()));
            }
            affected.push(seg.id.clone());
        }
        self.commit(work, events)?;
        Ok(affected)
    }

    /// Validate, then swap in the new list and publish the queued events.
    /// Nothing is observable until validation passes.
    fn commit(
        &mut self,
        work: Vec<VideoSegment>,
        events: Vec<SegmentEvent>,
    ) -> Result<(), TimelineError> {
        validate_list(&work)?;
        self.segments = work;
        self.emit(events);
        Ok(())
    }

    fn emit(&mut self, events: Vec<SegmentEvent>) {
        if events.is_empty() || self.subscribers.is_empty() {
            return;
        }
        for event in events {
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

fn covered_by(seg: &VideoSegment, start: f64, end: f64) -> bool {
    seg.start >= start - EPSILON && seg.end <= end + EPSILON
}

/// If `t` falls strictly inside a segment, replace it with two slices that
/// inherit every property. No-op when `t` is already a boundary or a gap.
fn split_boundary(work: &mut Vec<VideoSegment>, t: f64, events: &mut Vec<SegmentEvent>) {
    let Some(idx) = work
        .iter()
        .position(|s| t > s.start + EPSILON && t < s.end - EPSILON)
    else {
        return;
    };
    let source = work.remove(idx);
    let left = source.sliced(source.start, t);
    let right = source.sliced(t, source.end);
    events.push(SegmentEvent::Removed(source.id));
    events.push(SegmentEvent::Added(left.clone()));
    events.push(SegmentEvent::Added(right.clone()));
    work.insert(idx, right);
    work.insert(idx, left);
}

fn validate_list(segments: &[VideoSegment]) -> Result<(), TimelineError> {
    for seg in segments {
        if seg.end - seg.start <= EPSILON {
            return Err(TimelineError::InvariantViolation(format!(
                "zero-length segment {:.3}..{:.3}",
                seg.start, seg.end
            )));
        }
        if seg.speed <= 0.0 {
            return Err(TimelineError::InvariantViolation(format!(
                "non-positive speed {} on segment {}",
                seg.speed, seg.id
            )));
        }
    }
    for pair in segments.windows(2) {
        if pair[1].start < pair[0].end - EPSILON {
            return Err(TimelineError::InvariantViolation(format!(
                "overlap between {:.3}..{:.3} and {:.3}..{:.3}",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(duration: f64) -> SegmentManager {
        let mut mgr = SegmentManager::new();
        mgr.reset("v.mp4", duration).unwrap();
        mgr
    }

    fn bounds(mgr: &SegmentManager) -> Vec<(f64, f64)> {
        mgr.segments().iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn reset_creates_full_partition() {
        let mgr = loaded(30.0);
        assert_eq!(bounds(&mgr), vec![(0.0, 30.0)]);
        assert!(mgr.segments()[0].visible);
        assert_eq!(mgr.segments()[0].state, SegmentState::Stopped);
    }

    #[test]
    fn cut_splits_into_contiguous_halves() {
        let mut mgr = loaded(30.0);
        mgr.cut(10.0).unwrap();
        assert_eq!(bounds(&mgr), vec![(0.0, 10.0), (10.0, 30.0)]);
        assert!(mgr.segments().iter().all(|s| s.state == SegmentState::Stopped));
    }

    #[test]
    fn cut_on_boundary_or_outside_fails() {
        let mut mgr = loaded(30.0);
        mgr.cut(10.0).unwrap();
        assert_eq!(mgr.cut(10.0), Err(TimelineError::OutsideSegment));
        assert_eq!(mgr.cut(0.0), Err(TimelineError::OutsideSegment));
        assert_eq!(mgr.cut(30.0), Err(TimelineError::OutsideSegment));
        assert_eq!(mgr.cut(60.0), Err(TimelineError::OutsideSegment));
        // Partition unchanged by the failures.
        assert_eq!(bounds(&mgr), vec![(0.0, 10.0), (10.0, 30.0)]);
    }

    #[test]
    fn hide_auto_splits_partial_overlaps() {
        let mut mgr = loaded(30.0);
        mgr.set_range_visibility(5.0, 15.0, false).unwrap();
        assert_eq!(bounds(&mgr), vec![(0.0, 5.0), (5.0, 15.0), (15.0, 30.0)]);
        let states: Vec<SegmentState> = mgr.segments().iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![SegmentState::Stopped, SegmentState::Hidden, SegmentState::Stopped]
        );
        assert!(!mgr.segments()[1].visible);
    }

    #[test]
    fn show_restores_hidden_range() {
        let mut mgr = loaded(30.0);
        mgr.set_range_visibility(5.0, 15.0, false).unwrap();
        mgr.set_range_visibility(5.0, 15.0, true).unwrap();
        assert!(mgr.segments().iter().all(|s| s.visible));
        assert!(mgr.segments().iter().all(|s| s.state == SegmentState::Stopped));
    }

    #[test]
    fn delete_leaves_source_offsets_untouched() {
        let mut mgr = loaded(30.0);
        mgr.delete_range(5.0, 15.0).unwrap();
        assert_eq!(bounds(&mgr), vec![(0.0, 5.0), (15.0, 30.0)]);
    }

    #[test]
    fn range_without_intersection_fails() {
        let mut mgr = loaded(30.0);
        mgr.delete_range(5.0, 15.0).unwrap();
        assert!(matches!(
            mgr.set_range_visibility(6.0, 14.0, false),
            Err(TimelineError::NoIntersection { .. })
        ));
    }

    #[test]
    fn merge_coalesces_and_keeps_earliest_id() {
        let mut mgr = loaded(30.0);
        mgr.cut(10.0).unwrap();
        mgr.cut(20.0).unwrap();
        let first_id = mgr.segments()[0].id.clone();
        let kept = mgr.merge_range(0.0, 30.0).unwrap();
        assert_eq!(kept, first_id);
        assert_eq!(bounds(&mgr), vec![(0.0, 30.0)]);
    }

    #[test]
    fn merge_across_gap_fails_and_leaves_partition_untouched() {
        let mut mgr = loaded(30.0);
        mgr.delete_range(5.0, 15.0).unwrap();
        let before = bounds(&mgr);
        assert_eq!(mgr.merge_range(0.0, 30.0), Err(TimelineError::NonContiguousMerge));
        assert_eq!(bounds(&mgr), before);
        // Even interior boundary splits from the failed attempt must not leak.
        assert_eq!(mgr.merge_range(2.0, 20.0), Err(TimelineError::NonContiguousMerge));
        assert_eq!(bounds(&mgr), before);
    }

    #[test]
    fn speed_applies_to_covered_segments_only() {
        let mut mgr = loaded(30.0);
        mgr.set_range_speed(5.0, 15.0, 2.0).unwrap();
        let speeds: Vec<f64> = mgr.segments().iter().map(|s| s.speed).collect();
        assert_eq!(speeds, vec![1.0, 2.0, 1.0]);
        assert_eq!(mgr.segments()[1].effective_duration(), 5.0);
    }

    #[test]
    fn operations_before_load_fail() {
        let mut mgr = SegmentManager::new();
        assert_eq!(mgr.cut(1.0), Err(TimelineError::NoMedia));
        assert_eq!(mgr.delete_range(0.0, 1.0), Err(TimelineError::NoMedia));
    }

    #[test]
    fn events_follow_structural_changes() {
        let mut mgr = SegmentManager::new();
        let rx = mgr.subscribe();
        mgr.reset("v.mp4", 30.0).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), SegmentEvent::Added(_)));

        mgr.cut(10.0).unwrap();
        let burst: Vec<SegmentEvent> = rx.try_iter().collect();
        assert_eq!(burst.len(), 3); // removed original, added both halves
        assert!(matches!(burst[0], SegmentEvent::Removed(_)));

        mgr.set_range_visibility(0.0, 10.0, false).unwrap();
        let burst: Vec<SegmentEvent> = rx.try_iter().collect();
        assert!(burst.iter().any(|e| matches!(e, SegmentEvent::Updated(_))));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut mgr = SegmentManager::new();
        let rx = mgr.subscribe();
        drop(rx);
        mgr.reset("v.mp4", 10.0).unwrap();
        assert!(mgr.subscribers.is_empty());
    }

    #[test]
    fn annotations_project_onto_covering_segments() {
        let mut mgr = loaded(30.0);
        mgr.cut(10.0).unwrap();
        let changed = mgr.apply_annotations(&[SegmentAnnotation {
            start: 0.0,
            end: 10.0,
            title: Some("Intro".into()),
            subtitle: Some("cold open".into()),
            free_texts: vec!["note".into()],
        }]);
        assert_eq!(changed.len(), 1);
        assert_eq!(mgr.segments()[0].title.as_deref(), Some("Intro"));
        assert_eq!(mgr.segments()[0].free_texts, vec!["note".to_string()]);
        assert!(mgr.segments()[1].title.is_none());

        // Re-applying with nothing clears the projection.
        let cleared = mgr.apply_annotations(&[]);
        assert_eq!(cleared.len(), 1);
        assert!(mgr.segments()[0].title.is_none());
    }

    #[test]
    fn select_playing_is_a_sequenced_handoff() {
        let arbiter = PlaybackArbiter::new();
        let mut mgr = loaded(30.0);
        mgr.cut(10.0).unwrap();
        let first = mgr.segments()[0].id.clone();
        let second = mgr.segments()[1].id.clone();

        let token = mgr.select_playing(&first, &arbiter).unwrap();
        assert_eq!(mgr.segments()[0].state, SegmentState::Playing);

        // Previous session still holds the slot.
        assert!(matches!(
            mgr.select_playing(&second, &arbiter),
            Err(TimelineError::PlaybackBusy)
        ));

        token.release();
        mgr.select_playing(&second, &arbiter).unwrap();
        assert_eq!(mgr.segments()[0].state, SegmentState::Stopped);
        assert_eq!(mgr.segments()[1].state, SegmentState::Playing);
    }

    #[test]
    fn hidden_segment_cannot_play() {
        let arbiter = PlaybackArbiter::new();
        let mut mgr = loaded(30.0);
        mgr.set_range_visibility(0.0, 30.0, false).unwrap();
        let id = mgr.segments()[0].id.clone();
        assert!(matches!(
            mgr.select_playing(&id, &arbiter),
            Err(TimelineError::HiddenSegment)
        ));
    }

    #[test]
    fn adopt_replaces_wholesale_with_events() {
        let mut shared = SegmentManager::new();
        shared.reset("old.mp4", 10.0).unwrap();
        let rx = shared.subscribe();

        let mut scratch = SegmentManager::new();
        scratch.reset("new.mp4", 20.0).unwrap();
        scratch.cut(5.0).unwrap();

        shared.adopt(&scratch).unwrap();
        assert_eq!(shared.video_path(), Some("new.mp4"));
        assert_eq!(bounds(&shared), vec![(0.0, 5.0), (5.0, 20.0)]);
        let events: Vec<SegmentEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3); // one removed, two added
    }
}
