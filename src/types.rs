//! Core types for uh-ring
//!
//! This module defines the data structures that flow through each stage:
//! the raw API response, the decoded metric records, and the wire samples
//! destined for the remote time-series store.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level response of the `daily_metrics` endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ApiData,
    /// Error message reported by the API instead of data
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: i64,
}

/// Metrics grouped by date, plus the user's most recent timezone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiData {
    /// Date (`YYYY-MM-DD`) to the envelopes reported for that day
    #[serde(default, deserialize_with = "null_as_default")]
    pub metrics: BTreeMap<String, Vec<MetricEnvelope>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latest_time_zone: String,
}

/// One polymorphic metric record tagged with its wire type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEnvelope {
    #[serde(rename = "type")]
    pub wire_type: String,
    /// Undecoded payload; its shape depends on `wire_type`
    #[serde(default)]
    pub object: serde_json::Value,
}

impl MetricEnvelope {
    pub fn new(wire_type: impl Into<String>, object: serde_json::Value) -> Self {
        Self {
            wire_type: wire_type.into(),
            object,
        }
    }
}

/// A single sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: f64,
    /// Epoch seconds of the sensor reading
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
}

/// Decoded time-series metric (heart rate, HRV, steps, ...)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRecord {
    pub day_start: i64,
    pub title: String,
    /// Readings in collection order (not guaranteed sorted by timestamp)
    pub readings: Vec<Reading>,
    pub last_reading: f64,
    pub unit: String,
    pub subtitle: String,
    pub average: f64,
    pub total: f64,
}

/// Decoded single-value metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarRecord {
    /// `None` means the API reported no data, which is not the same as zero
    pub value: Option<f64>,
    pub title: String,
    pub day_start: i64,
}

/// Decoded sleep summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SleepCompositeRecord {
    pub day_start: i64,
    pub score: Option<f64>,
    pub total_sleep_minutes: Option<f64>,
    pub efficiency_percent: Option<f64>,
    pub time_in_bed_minutes: Option<f64>,
    pub deep_sleep_minutes: Option<f64>,
    pub light_sleep_minutes: Option<f64>,
    pub rem_sleep_minutes: Option<f64>,
}

impl SleepCompositeRecord {
    /// A sleep record without a score and without total sleep carries nothing
    /// worth showing.
    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.total_sleep_minutes.is_none()
    }
}

/// One of the canonical metric shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DecodedMetric {
    TimeSeries(TimeSeriesRecord),
    Scalar(ScalarRecord),
    Sleep(SleepCompositeRecord),
}

/// A decoded envelope, still tagged with its wire type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    pub wire_type: String,
    pub metric: DecodedMetric,
}

impl DecodedRecord {
    pub fn as_time_series(&self) -> Option<&TimeSeriesRecord> {
        match &self.metric {
            DecodedMetric::TimeSeries(ts) => Some(ts),
            _ => None,
        }
    }
}

/// All decoded records for a single date, in envelope order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedDay {
    pub date: String,
    pub records: Vec<DecodedRecord>,
}

impl DecodedDay {
    /// First record with the given wire type
    pub fn find(&self, wire_type: &str) -> Option<&DecodedRecord> {
        self.records.iter().find(|r| r.wire_type == wire_type)
    }
}

/// A decoded API response, ordered by date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedReport {
    pub timezone: String,
    pub days: Vec<DecodedDay>,
}

/// One (metric name, value, timestamp) triple for the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct WireSample {
    pub name: String,
    pub value: f64,
    /// Original sensor time in epoch milliseconds
    pub timestamp_ms: i64,
}

impl WireSample {
    /// `None` when the timestamp does not fit in epoch milliseconds
    pub fn new(name: impl Into<String>, value: f64, epoch_seconds: i64) -> Option<Self> {
        Some(Self {
            name: name.into(),
            value,
            timestamp_ms: epoch_seconds.checked_mul(1000)?,
        })
    }
}
