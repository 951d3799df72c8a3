//! High-water-mark tracking
//!
//! Remembers, per wire type, the newest timestamp already forwarded so that
//! overlapping poll windows never submit the same sample twice. All reads and
//! writes go through one lock, taken once per batch rather than per sample.
//!
//! The state lives in memory only; after a restart samples may be forwarded
//! again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Default)]
struct Marks {
    last_forwarded: HashMap<String, i64>,
    latest_timestamp: i64,
}

/// Shared forwarding state, owned by the service and handed out via `Arc`
#[derive(Debug, Default)]
pub struct TrackerState {
    marks: Mutex<Marks>,
}

/// Point-in-time view used by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerSnapshot {
    /// Newest sample timestamp forwarded so far (epoch seconds, 0 if none)
    pub latest_timestamp: i64,
    /// Number of wire types with a high-water mark
    pub tracked_metrics: usize,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the exclusive lock for one batch of checks and updates.
    ///
    /// The returned guard must not be held across an `.await`.
    pub fn begin(&self) -> TrackerBatch<'_> {
        TrackerBatch {
            marks: self.lock(),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let marks = self.lock();
        TrackerSnapshot {
            latest_timestamp: marks.latest_timestamp,
            tracked_metrics: marks.last_forwarded.len(),
        }
    }

    pub fn latest_timestamp(&self) -> i64 {
        self.lock().latest_timestamp
    }

    /// High-water mark for one wire type (0 when nothing was forwarded)
    pub fn last_forwarded(&self, wire_type: &str) -> i64 {
        self.begin().last_forwarded(wire_type)
    }

    fn lock(&self) -> MutexGuard<'_, Marks> {
        // The marks are plain integers; a panic elsewhere cannot leave them
        // half-written.
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to the marks for the duration of one batch
pub struct TrackerBatch<'a> {
    marks: MutexGuard<'a, Marks>,
}

impl TrackerBatch<'_> {
    pub fn last_forwarded(&self, wire_type: &str) -> i64 {
        self.marks
            .last_forwarded
            .get(wire_type)
            .copied()
            .unwrap_or(0)
    }

    /// A sample is forwarded only if it is strictly newer than the mark.
    pub fn should_forward(&self, wire_type: &str, epoch_seconds: i64) -> bool {
        epoch_seconds > self.last_forwarded(wire_type)
    }

    /// Raise the mark for `wire_type`; marks never move backwards.
    pub fn record(&mut self, wire_type: &str, epoch_seconds: i64) {
        match self.marks.last_forwarded.get_mut(wire_type) {
            Some(mark) => *mark = (*mark).max(epoch_seconds),
            None => {
                self.marks
                    .last_forwarded
                    .insert(wire_type.to_string(), epoch_seconds);
            }
        }
        if epoch_seconds > self.marks.latest_timestamp {
            self.marks.latest_timestamp = epoch_seconds;
        }
    }
}
