//! Forwarding encoder
//!
//! Selects the readings that still need to reach the remote store and turns
//! them into [`WireSample`]s stamped with the original sensor time.
//!
//! Ordinary time series forward every reading newer than the metric's
//! high-water mark. Running daily counters (steps) forward a single "total so
//! far" sample keyed on the day start, so a new sample appears only once the
//! day boundary advances; a changed total within the same day is not sent.

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::MetricRegistry;
use crate::tracker::TrackerBatch;
use crate::types::{DecodedRecord, WireSample};

/// When the high-water marks of a batch are committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Commit only after the remote store accepted the batch. A failed write is
    /// retried on the next cycle, at the cost of possible duplicates.
    #[default]
    OnSuccess,
    /// Commit while encoding, before the write. A failed write drops the
    /// samples of that batch.
    BeforeSend,
}

/// Samples selected for one batch, plus the marks they advance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardPlan {
    pub samples: Vec<WireSample>,
    marks: HashMap<String, i64>,
}

impl ForwardPlan {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Mark pending for a wire type, if this plan advances it
    pub fn pending_mark(&self, wire_type: &str) -> Option<i64> {
        self.marks.get(wire_type).copied()
    }

    /// Apply this plan's marks to the tracker
    pub fn commit(&self, batch: &mut TrackerBatch<'_>) {
        for (wire_type, &ts) in &self.marks {
            batch.record(wire_type, ts);
        }
    }
}

/// Builds [`ForwardPlan`]s from decoded records
#[derive(Debug, Clone)]
pub struct ForwardEncoder {
    registry: Arc<MetricRegistry>,
}

impl ForwardEncoder {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry }
    }

    /// Select unseen samples from `records`.
    ///
    /// Marks pending in the plan are consulted too, so a wire type that
    /// appears in several envelopes of one batch is not emitted twice.
    pub fn encode<'r, I>(&self, records: I, batch: &TrackerBatch<'_>) -> ForwardPlan
    where
        I: IntoIterator<Item = &'r DecodedRecord>,
    {
        let mut plan = ForwardPlan::default();

        for record in records {
            let Some(entry) = self.registry.lookup(&record.wire_type) else {
                continue;
            };
            if !entry.is_forwarded() {
                continue;
            }
            let Some(series) = record.as_time_series() else {
                continue;
            };

            let last = plan
                .pending_mark(&record.wire_type)
                .unwrap_or_else(|| batch.last_forwarded(&record.wire_type));

            if entry.counter {
                if series.day_start > last {
                    let Some(sample) =
                        WireSample::new(entry.output_name, series.total, series.day_start)
                    else {
                        skip_out_of_range(&record.wire_type, series.day_start);
                        continue;
                    };
                    plan.samples.push(sample);
                    plan.marks.insert(record.wire_type.clone(), series.day_start);
                }
                continue;
            }

            let mut newest = last;
            for reading in &series.readings {
                if reading.timestamp <= last {
                    continue;
                }
                let Some(sample) =
                    WireSample::new(entry.output_name, reading.value, reading.timestamp)
                else {
                    skip_out_of_range(&record.wire_type, reading.timestamp);
                    continue;
                };
                plan.samples.push(sample);
                newest = newest.max(reading.timestamp);
            }
            if newest > last {
                plan.marks.insert(record.wire_type.clone(), newest);
            }
        }

        plan
    }
}

fn skip_out_of_range(wire_type: &str, epoch_seconds: i64) {
    tracing::trace!(wire_type, epoch_seconds, "skipping reading with out-of-range timestamp");
}
