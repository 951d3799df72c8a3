//! Terminal rendering
//!
//! Formats decoded metrics for people: the full daily report, and the single
//! value printed by `uh-ring get <metric>`.

use std::fmt::{self, Write};

use chrono::{DateTime, FixedOffset, Local};

use crate::decoder::decode_envelope;
use crate::registry::{MetricKind, MetricRegistry, RegistryEntry, SpecialMetric, SummaryField};
use crate::types::{
    DecodedDay, DecodedMetric, DecodedRecord, DecodedReport, MetricEnvelope, ScalarRecord,
    SleepCompositeRecord, TimeSeriesRecord,
};

const HEAVY_RULE: &str = "══════════════════════════════════════════════════════════";
const LIGHT_RULE: &str = "──────────────────────────────────────────────────────────";

/// Printed by the single-value query when the metric has no value
pub const NO_DATA: &str = "null";
/// Printed by the single-value query when the metric is absent or unknown
pub const NOT_FOUND: &str = "not found";

/// Consumer of decoded reports
pub trait Renderer {
    fn render(&self, report: &DecodedReport) -> String;
}

/// Zone used to print reading times
#[derive(Debug, Clone, Copy)]
enum ClockZone {
    /// The machine's timezone, resolved per timestamp
    Local,
    Fixed(FixedOffset),
}

/// Plain-text renderer
pub struct TextRenderer<'a> {
    registry: &'a MetricRegistry,
    zone: ClockZone,
}

impl<'a> TextRenderer<'a> {
    /// Renderer showing reading times at a fixed UTC offset
    pub fn new(registry: &'a MetricRegistry, offset: FixedOffset) -> Self {
        Self {
            registry,
            zone: ClockZone::Fixed(offset),
        }
    }

    /// Renderer showing reading times in the machine's timezone, including
    /// daylight-saving changes between readings
    pub fn local(registry: &'a MetricRegistry) -> Self {
        Self {
            registry,
            zone: ClockZone::Local,
        }
    }

    pub fn write_report(&self, out: &mut impl Write, report: &DecodedReport) -> fmt::Result {
        writeln!(out, "{HEAVY_RULE}")?;
        writeln!(out, "  ULTRAHUMAN METRICS | Timezone: {}", report.timezone)?;
        writeln!(out, "{HEAVY_RULE}")?;

        for day in &report.days {
            self.write_day(out, day)?;
        }

        writeln!(out, "\n{HEAVY_RULE}")
    }

    fn write_day(&self, out: &mut impl Write, day: &DecodedDay) -> fmt::Result {
        writeln!(out, "\n  Date: {}", day.date)?;
        writeln!(out, "{LIGHT_RULE}")?;
        for record in &day.records {
            self.write_record(out, record)?;
        }
        Ok(())
    }

    fn write_record(&self, out: &mut impl Write, record: &DecodedRecord) -> fmt::Result {
        match (SpecialMetric::from_wire_type(&record.wire_type), &record.metric) {
            (Some(SpecialMetric::Sleep), DecodedMetric::Sleep(sleep)) => write_sleep(out, sleep),
            (Some(SpecialMetric::Motion), DecodedMetric::TimeSeries(series)) => {
                if series.readings.is_empty() {
                    return Ok(());
                }
                section(out, "MOTION")?;
                writeln!(out, "      Readings: {}", series.readings.len())
            }
            (Some(_), _) => Ok(()),
            (None, metric) => {
                let Some(entry) = self.registry.lookup(&record.wire_type) else {
                    return Ok(());
                };
                match metric {
                    DecodedMetric::TimeSeries(series) => self.write_series(out, entry, series),
                    DecodedMetric::Scalar(scalar) => write_scalar(out, entry, scalar),
                    DecodedMetric::Sleep(sleep) => write_sleep(out, sleep),
                }
            }
        }
    }

    fn write_series(
        &self,
        out: &mut impl Write,
        entry: &RegistryEntry,
        series: &TimeSeriesRecord,
    ) -> fmt::Result {
        if entry.counter {
            if series.total > 0.0 || series.average > 0.0 {
                section(out, entry.display_name)?;
                writeln!(
                    out,
                    "      Total: {:.0} | Avg: {:.0}",
                    series.total, series.average
                )?;
            }
            return Ok(());
        }

        if series.title.is_empty() {
            return Ok(());
        }
        section(out, entry.display_name)?;

        let unit = if entry.unit.is_empty() {
            series.unit.as_str()
        } else {
            entry.unit
        };
        let precision = usize::from(entry.precision);

        match entry.summary.unwrap_or(SummaryField::Last) {
            SummaryField::Last => writeln!(
                out,
                "      Last: {}",
                with_unit(&format!("{:.*}", precision, series.last_reading), unit)
            )?,
            SummaryField::Average => writeln!(
                out,
                "      Average: {}",
                with_unit(&format!("{:.*}", precision, series.average), unit)
            )?,
            SummaryField::Total => writeln!(out, "      Total: {:.0}", series.total)?,
        }

        for reading in &series.readings {
            writeln!(
                out,
                "      - {} @ {}",
                with_unit(&format!("{:.*}", precision, reading.value), unit),
                self.clock_time(reading.timestamp)
            )?;
        }
        Ok(())
    }

    /// `HH:MM` of an epoch-seconds timestamp in the renderer's zone
    pub fn clock_time(&self, epoch_seconds: i64) -> String {
        let Some(utc) = DateTime::from_timestamp(epoch_seconds, 0) else {
            return "--:--".to_string();
        };
        match self.zone {
            ClockZone::Local => utc.with_timezone(&Local).format("%H:%M").to_string(),
            ClockZone::Fixed(offset) => utc.with_timezone(&offset).format("%H:%M").to_string(),
        }
    }
}

impl Renderer for TextRenderer<'_> {
    fn render(&self, report: &DecodedReport) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_report(&mut out, report);
        out
    }
}

/// Value of `wire_type` among one day's envelopes, as printed by the
/// single-metric query.
pub fn metric_value(
    envelopes: &[MetricEnvelope],
    wire_type: &str,
    registry: &MetricRegistry,
) -> String {
    let Some(envelope) = envelopes.iter().find(|e| e.wire_type == wire_type) else {
        return NOT_FOUND.to_string();
    };

    let record = match decode_envelope(envelope, registry) {
        None => return NOT_FOUND.to_string(),
        Some(Err(_)) => return NO_DATA.to_string(),
        Some(Ok(record)) => record,
    };

    match (SpecialMetric::from_wire_type(wire_type), &record.metric) {
        (Some(SpecialMetric::Sleep), DecodedMetric::Sleep(sleep)) => sleep
            .score
            .map(|score| format!("{score:.0}"))
            .unwrap_or_else(|| NO_DATA.to_string()),
        (Some(SpecialMetric::Motion), DecodedMetric::TimeSeries(series)) => {
            series.readings.len().to_string()
        }
        (Some(_), _) => NO_DATA.to_string(),
        (None, metric) => {
            let Some(entry) = registry.lookup(wire_type) else {
                return NOT_FOUND.to_string();
            };
            let precision = usize::from(entry.precision);
            match (entry.kind, metric) {
                (MetricKind::TimeSeries, DecodedMetric::TimeSeries(series)) => {
                    let value = match entry.summary.unwrap_or(SummaryField::Last) {
                        SummaryField::Last => series.last_reading,
                        SummaryField::Average => series.average,
                        SummaryField::Total => series.total,
                    };
                    format!("{:.*}", precision, value)
                }
                (MetricKind::Scalar, DecodedMetric::Scalar(scalar)) => match scalar.value {
                    None => NO_DATA.to_string(),
                    Some(minutes) if entry.is_duration => format_duration(minutes),
                    Some(value) => format!("{:.*}", precision, value),
                },
                (MetricKind::CompositeSleep, DecodedMetric::Sleep(sleep)) => sleep
                    .score
                    .map(|score| format!("{score:.0}"))
                    .unwrap_or_else(|| NO_DATA.to_string()),
                _ => NO_DATA.to_string(),
            }
        }
    }
}

/// `7h 12m`, or `45m` below one hour
pub fn format_duration(minutes: f64) -> String {
    let total = minutes as i64;
    let (hours, mins) = (total / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

fn section(out: &mut impl Write, title: &str) -> fmt::Result {
    writeln!(out, "\n  {title}")
}

// Percent and degrees attach to the number; other units are spaced.
fn with_unit(value: &str, unit: &str) -> String {
    match unit {
        "" => value.to_string(),
        "%" | "°C" => format!("{value}{unit}"),
        _ => format!("{value} {unit}"),
    }
}

fn write_sleep(out: &mut impl Write, sleep: &SleepCompositeRecord) -> fmt::Result {
    if sleep.is_empty() {
        return Ok(());
    }
    section(out, "SLEEP")?;
    if let Some(score) = sleep.score {
        writeln!(out, "      Score: {score:.0}")?;
    }
    if let Some(total) = sleep.total_sleep_minutes {
        writeln!(out, "      Total: {}", format_duration(total))?;
    }
    if let Some(efficiency) = sleep.efficiency_percent {
        writeln!(out, "      Efficiency: {efficiency:.0}%")?;
    }
    Ok(())
}

fn write_scalar(out: &mut impl Write, entry: &RegistryEntry, scalar: &ScalarRecord) -> fmt::Result {
    let Some(value) = scalar.value else {
        return Ok(());
    };
    section(out, entry.display_name)?;

    if entry.is_duration {
        return writeln!(out, "      Duration: {}", format_duration(value));
    }
    if entry.unit.is_empty() {
        return writeln!(out, "      Score: {value:.0}");
    }
    let formatted = format!("{:.*}", usize::from(entry.precision), value);
    writeln!(out, "      Value: {}", with_unit(&formatted, entry.unit))
}
