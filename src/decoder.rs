//! Payload decoding
//!
//! Turns raw metric envelopes into one of the canonical record shapes. The
//! registry selects the shape; `sleep` and `motion` are decoded through fixed
//! shapes before the registry is consulted.

use serde::Deserialize;

use crate::error::DecodeError;
use crate::registry::{MetricKind, MetricRegistry, RegistryEntry, SpecialMetric};
use crate::types::{
    null_as_default, ApiResponse, DecodedDay, DecodedMetric, DecodedRecord, DecodedReport,
    MetricEnvelope, Reading, ScalarRecord, SleepCompositeRecord, TimeSeriesRecord,
};

/// Decode an envelope into the shape named by its registry entry
pub fn decode(
    envelope: &MetricEnvelope,
    entry: &RegistryEntry,
) -> Result<DecodedRecord, DecodeError> {
    let metric = match entry.kind {
        MetricKind::TimeSeries => DecodedMetric::TimeSeries(decode_time_series(envelope)?),
        MetricKind::Scalar => DecodedMetric::Scalar(decode_scalar(envelope)?),
        MetricKind::CompositeSleep => DecodedMetric::Sleep(decode_sleep(envelope)?),
    };
    Ok(DecodedRecord {
        wire_type: envelope.wire_type.clone(),
        metric,
    })
}

/// Decode an envelope, resolving its shape from the special types or the
/// registry.
///
/// Returns `None` for wire types nobody knows how to decode.
pub fn decode_envelope(
    envelope: &MetricEnvelope,
    registry: &MetricRegistry,
) -> Option<Result<DecodedRecord, DecodeError>> {
    if let Some(special) = SpecialMetric::from_wire_type(&envelope.wire_type) {
        let metric = match special {
            SpecialMetric::Sleep => decode_sleep(envelope).map(DecodedMetric::Sleep),
            SpecialMetric::Motion => decode_time_series(envelope).map(DecodedMetric::TimeSeries),
        };
        return Some(metric.map(|metric| DecodedRecord {
            wire_type: envelope.wire_type.clone(),
            metric,
        }));
    }

    registry
        .lookup(&envelope.wire_type)
        .map(|entry| decode(envelope, entry))
}

/// Decode one day of envelopes, keeping envelope order.
///
/// Envelopes that fail to decode or have an unknown wire type are skipped.
pub fn decode_day(
    date: &str,
    envelopes: &[MetricEnvelope],
    registry: &MetricRegistry,
) -> DecodedDay {
    let records = envelopes
        .iter()
        .filter_map(|envelope| match decode_envelope(envelope, registry)? {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::trace!(date, error = %e, "skipping envelope");
                None
            }
        })
        .collect();

    DecodedDay {
        date: date.to_string(),
        records,
    }
}

/// Decode every date of an API response, in date order
pub fn decode_response(response: &ApiResponse, registry: &MetricRegistry) -> DecodedReport {
    let days = response
        .data
        .metrics
        .iter()
        .map(|(date, envelopes)| decode_day(date, envelopes, registry))
        .collect();

    DecodedReport {
        timezone: response.data.latest_time_zone.clone(),
        days,
    }
}

pub fn decode_time_series(envelope: &MetricEnvelope) -> Result<TimeSeriesRecord, DecodeError> {
    let raw: RawTimeSeries = parse(envelope)?;
    Ok(TimeSeriesRecord {
        day_start: raw.day_start_timestamp,
        title: raw.title,
        readings: raw.values,
        last_reading: raw.last_reading,
        unit: raw.unit,
        subtitle: raw.subtitle,
        average: raw.avg,
        total: raw.total,
    })
}

pub fn decode_scalar(envelope: &MetricEnvelope) -> Result<ScalarRecord, DecodeError> {
    let raw: RawScalar = parse(envelope)?;
    Ok(ScalarRecord {
        value: raw.value,
        title: raw.title,
        day_start: raw.day_start_timestamp,
    })
}

pub fn decode_sleep(envelope: &MetricEnvelope) -> Result<SleepCompositeRecord, DecodeError> {
    let raw: RawSleep = parse(envelope)?;
    Ok(SleepCompositeRecord {
        day_start: raw.day_start_timestamp,
        score: raw.score,
        total_sleep_minutes: raw.total_sleep,
        efficiency_percent: raw.efficiency,
        time_in_bed_minutes: raw.time_in_bed,
        deep_sleep_minutes: raw.deep_sleep,
        light_sleep_minutes: raw.light_sleep,
        rem_sleep_minutes: raw.rem_sleep,
    })
}

fn parse<T>(envelope: &MetricEnvelope) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(&envelope.object).map_err(|source| DecodeError::Malformed {
        wire_type: envelope.wire_type.clone(),
        source,
    })
}

// Ultrahuman API payload structures

#[derive(Debug, Deserialize)]
struct RawTimeSeries {
    #[serde(default, deserialize_with = "null_as_default")]
    day_start_timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    values: Vec<Reading>,
    #[serde(default, deserialize_with = "null_as_default")]
    last_reading: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    unit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    subtitle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    avg: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    total: f64,
}

#[derive(Debug, Deserialize)]
struct RawScalar {
    #[serde(default)]
    value: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    day_start_timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct RawSleep {
    #[serde(default, deserialize_with = "null_as_default")]
    day_start_timestamp: i64,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    total_sleep: Option<f64>,
    #[serde(default)]
    efficiency: Option<f64>,
    #[serde(default)]
    time_in_bed: Option<f64>,
    #[serde(default)]
    deep_sleep: Option<f64>,
    #[serde(default)]
    light_sleep: Option<f64>,
    #[serde(default)]
    rem_sleep: Option<f64>,
}
