//! Debounced, single-writer reprocessing.
//!
//! Script edits arrive faster than a full reparse completes, so every
//! submission is stamped with a generation and a single worker thread owns
//! all recomputation: snapshots are coalesced over a quiet window, a run that
//! is superseded mid-flight is abandoned, and only the newest generation is
//! ever committed to the shared [`SegmentManager`]. Runs execute against a
//! scratch manager and are adopted wholesale on commit, so a cancelled run
//! never leaves a partial partition behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use script::{parse_commands, parse_scene_blocks, SceneBlock};
use timeline::{SegmentManager, VideoSegment};

use crate::executor::{annotations_from, CommandExecutor, MediaProbe};
use crate::report::ExecutionReport;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Quiet window over which rapid submissions are coalesced.
    pub quiet_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { quiet_window: Duration::from_millis(250) }
    }
}

/// Result of one committed reprocess run, delivered on a single channel so
/// consumers observe commits in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessOutcome {
    pub generation: u64,
    pub blocks: Vec<SceneBlock>,
    pub report: ExecutionReport,
    pub segments: Vec<VideoSegment>,
}

pub struct ReprocessPipeline {
    tx_text: Sender<(u64, String)>,
    latest: Arc<AtomicU64>,
    rx_outcomes: Receiver<ReprocessOutcome>,
    manager: Arc<Mutex<SegmentManager>>,
}

impl ReprocessPipeline {
    pub fn start(probe: Arc<dyn MediaProbe + Send + Sync>, config: PipelineConfig) -> Self {
        let (tx_text, rx_text) = unbounded::<(u64, String)>();
        let (tx_outcomes, rx_outcomes) = unbounded::<ReprocessOutcome>();
        let latest = Arc::new(AtomicU64::new(0));
        let manager = Arc::new(Mutex::new(SegmentManager::new()));

        {
            let latest = latest.clone();
            let manager = manager.clone();
            thread::spawn(move || {
                worker_loop(rx_text, tx_outcomes, latest, manager, probe, config);
            });
        }

        Self { tx_text, latest, rx_outcomes, manager }
    }

    /// Queue a new script snapshot. Any in-flight run for an older snapshot
    /// becomes stale immediately. Returns the snapshot's generation.
    pub fn submit(&self, text: impl Into<String>) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.tx_text.send((generation, text.into()));
        generation
    }

    /// The single serialization point for committed results.
    pub fn outcomes(&self) -> &Receiver<ReprocessOutcome> {
        &self.rx_outcomes
    }

    /// Shared manager holding the last committed partition.
    pub fn manager(&self) -> Arc<Mutex<SegmentManager>> {
        self.manager.clone()
    }
}

fn worker_loop(
    rx_text: Receiver<(u64, String)>,
    tx_outcomes: Sender<ReprocessOutcome>,
    latest: Arc<AtomicU64>,
    manager: Arc<Mutex<SegmentManager>>,
    probe: Arc<dyn MediaProbe + Send + Sync>,
    config: PipelineConfig,
) {
    while let Ok((mut generation, mut text)) = rx_text.recv() {
        // Debounce: keep swallowing newer snapshots until the stream goes
        // quiet; only the newest survives.
        loop {
            match rx_text.recv_timeout(config.quiet_window) {
                Ok((g, t)) => {
                    generation = g;
                    text = t;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let stale = || latest.load(Ordering::SeqCst) != generation;
        if stale() {
            continue;
        }

        let blocks = parse_scene_blocks(&text);
        let (commands, parse_errors) = parse_commands(&text);

        let mut scratch = SegmentManager::new();
        let executor = CommandExecutor::new(probe.clone());
        let Some(mut report) = executor.apply_cancellable(&mut scratch, &commands, stale) else {
            tracing::debug!(generation, "run superseded before completion");
            continue;
        };
        report.parse_errors = parse_errors;
        scratch.apply_annotations(&annotations_from(&blocks));

        // Commit under the lock, re-checking staleness so a snapshot that
        // arrived during the run wins instead of being overwritten.
        {
            let mut shared = manager.lock();
            if stale() {
                continue;
            }
            if let Err(err) = shared.adopt(&scratch) {
                tracing::error!(generation, %err, "refusing to commit invalid partition");
                continue;
            }
        }
        tracing::debug!(generation, segments = scratch.segments().len(), "run committed");
        let _ = tx_outcomes.send(ReprocessOutcome {
            generation,
            blocks,
            report,
            segments: scratch.segments().to_vec(),
        });
    }
}
