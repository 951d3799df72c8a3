//! Metric schema registry
//!
//! Maps each wire type reported by the API to the canonical shape it decodes
//! into, how it is displayed, and the Prometheus series it is forwarded as.
//! The table is built once and shared read-only.

use std::collections::HashMap;

use crate::error::RegistryError;

/// Canonical shape a wire type decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    TimeSeries,
    Scalar,
    CompositeSleep,
}

/// Which field of a time series summarises the day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Last,
    Average,
    Total,
}

/// Wire types decoded through fixed, hand-written shapes instead of the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialMetric {
    /// Composite sleep summary
    Sleep,
    /// Raw motion series; only the reading count is meaningful
    Motion,
}

impl SpecialMetric {
    pub fn from_wire_type(wire_type: &str) -> Option<Self> {
        match wire_type {
            "sleep" => Some(SpecialMetric::Sleep),
            "motion" => Some(SpecialMetric::Motion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialMetric::Sleep => "sleep",
            SpecialMetric::Motion => "motion",
        }
    }
}

/// How one wire type is decoded, displayed and forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub wire_type: &'static str,
    pub kind: MetricKind,
    /// Summary value for time series; `None` for other kinds
    pub summary: Option<SummaryField>,
    pub display_name: &'static str,
    pub unit: &'static str,
    /// Value is a number of minutes, rendered as `Xh Ym`
    pub is_duration: bool,
    /// Prometheus metric name; empty means the metric is never forwarded
    pub output_name: &'static str,
    /// Running daily counter, forwarded as one day total keyed on day start
    pub counter: bool,
    /// Decimals used when rendering values
    pub precision: u8,
}

impl RegistryEntry {
    pub const fn time_series(
        wire_type: &'static str,
        summary: SummaryField,
        display_name: &'static str,
        unit: &'static str,
        output_name: &'static str,
    ) -> Self {
        Self {
            wire_type,
            kind: MetricKind::TimeSeries,
            summary: Some(summary),
            display_name,
            unit,
            is_duration: false,
            output_name,
            counter: false,
            precision: 0,
        }
    }

    pub const fn scalar(
        wire_type: &'static str,
        display_name: &'static str,
        unit: &'static str,
        output_name: &'static str,
    ) -> Self {
        Self {
            wire_type,
            kind: MetricKind::Scalar,
            summary: None,
            display_name,
            unit,
            is_duration: false,
            output_name,
            counter: false,
            precision: 0,
        }
    }

    pub const fn duration(mut self) -> Self {
        self.is_duration = true;
        self
    }

    pub const fn counter(mut self) -> Self {
        self.counter = true;
        self
    }

    pub const fn precision(mut self, decimals: u8) -> Self {
        self.precision = decimals;
        self
    }

    /// Whether samples of this metric go to the remote store
    pub fn is_forwarded(&self) -> bool {
        self.kind == MetricKind::TimeSeries && !self.output_name.is_empty()
    }
}

use SummaryField::{Average, Last, Total};

const STANDARD_ENTRIES: &[RegistryEntry] = &[
    // Heart & activity
    RegistryEntry::time_series("hr", Last, "HEART RATE", "BPM", "ultrahuman_heart_rate_bpm"),
    RegistryEntry::time_series("hrv", Last, "HEART RATE VARIABILITY", "ms", "ultrahuman_hrv_ms"),
    RegistryEntry::time_series(
        "temp",
        Last,
        "SKIN TEMPERATURE",
        "°C",
        "ultrahuman_skin_temperature_celsius",
    )
    .precision(1),
    RegistryEntry::time_series(
        "spo2",
        Average,
        "SPO2 (Blood Oxygen)",
        "%",
        "ultrahuman_spo2_percent",
    ),
    RegistryEntry::time_series("steps", Total, "STEPS", "", "ultrahuman_steps_total").counter(),
    RegistryEntry::scalar("movement_index", "MOVEMENT INDEX", "", "ultrahuman_movement_index"),
    RegistryEntry::scalar("active_minutes", "ACTIVE MINUTES", "min", "ultrahuman_active_minutes"),
    RegistryEntry::scalar("recovery_index", "RECOVERY INDEX", "", "ultrahuman_recovery_index"),
    RegistryEntry::scalar("recovery", "RECOVERY", "", "ultrahuman_recovery"),
    RegistryEntry::scalar("vo2_max", "VO2 MAX", "ml/kg/min", "ultrahuman_vo2_max").precision(1),
    // Temperature
    RegistryEntry::scalar(
        "temperature_deviation",
        "TEMPERATURE DEVIATION",
        "°C",
        "ultrahuman_temperature_deviation_celsius",
    )
    .precision(1),
    RegistryEntry::scalar(
        "average_body_temperature",
        "AVG BODY TEMP",
        "°C",
        "ultrahuman_avg_body_temperature_celsius",
    )
    .precision(1),
    // Sleep
    RegistryEntry::scalar("sleep_score", "SLEEP SCORE", "", "ultrahuman_sleep_score"),
    RegistryEntry::scalar(
        "total_sleep",
        "TOTAL SLEEP",
        "",
        "ultrahuman_total_sleep_minutes",
    )
    .duration(),
    RegistryEntry::scalar(
        "sleep_efficiency",
        "SLEEP EFFICIENCY",
        "%",
        "ultrahuman_sleep_efficiency_percent",
    ),
    RegistryEntry::scalar(
        "deep_sleep",
        "DEEP SLEEP",
        "",
        "ultrahuman_deep_sleep_minutes",
    )
    .duration(),
    RegistryEntry::scalar(
        "light_sleep",
        "LIGHT SLEEP",
        "",
        "ultrahuman_light_sleep_minutes",
    )
    .duration(),
    RegistryEntry::scalar("rem_sleep", "REM SLEEP", "", "ultrahuman_rem_sleep_minutes").duration(),
    RegistryEntry::scalar(
        "time_in_bed",
        "TIME IN BED",
        "",
        "ultrahuman_time_in_bed_minutes",
    )
    .duration(),
    RegistryEntry::scalar("sleep_rhr", "SLEEP RESTING HR", "BPM", "ultrahuman_sleep_rhr_bpm"),
    RegistryEntry::scalar("night_rhr", "SLEEP RESTING HR", "BPM", "ultrahuman_sleep_rhr_bpm"),
    RegistryEntry::scalar("avg_sleep_hrv", "SLEEP HRV", "ms", "ultrahuman_avg_sleep_hrv_ms"),
    RegistryEntry::scalar("hr_drop", "HR DROP (Sleep)", "BPM", "ultrahuman_hr_drop_bpm"),
    RegistryEntry::scalar(
        "restorative_sleep",
        "RESTORATIVE SLEEP",
        "",
        "ultrahuman_restorative_sleep",
    ),
    RegistryEntry::scalar(
        "morning_alertness",
        "MORNING ALERTNESS",
        "",
        "ultrahuman_morning_alertness",
    ),
    RegistryEntry::scalar("full_sleep_cycles", "SLEEP CYCLES", "", "ultrahuman_full_sleep_cycles"),
    RegistryEntry::scalar("tosses_and_turns", "TOSSES & TURNS", "", "ultrahuman_tosses_and_turns"),
    RegistryEntry::scalar("movements", "MOVEMENTS (Sleep)", "", "ultrahuman_sleep_movements"),
    // Glucose
    RegistryEntry::time_series("glucose", Last, "GLUCOSE", "mg/dL", "ultrahuman_glucose_mg_dl"),
    RegistryEntry::scalar(
        "average_glucose",
        "AVERAGE GLUCOSE",
        "mg/dL",
        "ultrahuman_avg_glucose_mg_dl",
    ),
    RegistryEntry::scalar(
        "glucose_variability",
        "GLUCOSE VARIABILITY",
        "%",
        "ultrahuman_glucose_variability_percent",
    )
    .precision(1),
    RegistryEntry::scalar(
        "time_in_target",
        "TIME IN TARGET",
        "%",
        "ultrahuman_time_in_target_percent",
    ),
    RegistryEntry::scalar(
        "hba1c",
        "HbA1c (Estimated)",
        "%",
        "ultrahuman_hba1c_percent",
    )
    .precision(1),
    RegistryEntry::scalar("metabolic_score", "METABOLIC SCORE", "", "ultrahuman_metabolic_score"),
];

/// Immutable lookup table from wire type to [`RegistryEntry`]
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<&'static str, usize>,
}

impl MetricRegistry {
    /// Build a registry, rejecting duplicate wire types
    pub fn new(entries: Vec<RegistryEntry>) -> Result<Self, RegistryError> {
        let registry = Self::sorted(entries);
        if let Some(pair) = registry
            .entries
            .windows(2)
            .find(|pair| pair[0].wire_type == pair[1].wire_type)
        {
            return Err(RegistryError::Duplicate(pair[0].wire_type.to_string()));
        }
        Ok(registry)
    }

    /// The metrics reported by the Ultrahuman partner API
    pub fn standard() -> Self {
        Self::sorted(STANDARD_ENTRIES.to_vec())
    }

    fn sorted(mut entries: Vec<RegistryEntry>) -> Self {
        entries.sort_by_key(|entry| entry.wire_type);
        let index = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.wire_type, pos))
            .collect();
        Self { entries, index }
    }

    pub fn lookup(&self, wire_type: &str) -> Option<&RegistryEntry> {
        self.index.get(wire_type).map(|&pos| &self.entries[pos])
    }

    /// Entries in wire-type order
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_has_unique_wire_types() {
        let registry = MetricRegistry::new(STANDARD_ENTRIES.to_vec()).unwrap();
        assert_eq!(registry.len(), STANDARD_ENTRIES.len());
    }

    #[test]
    fn test_lookup() {
        let registry = MetricRegistry::standard();

        let hr = registry.lookup("hr").unwrap();
        assert_eq!(hr.kind, MetricKind::TimeSeries);
        assert_eq!(hr.summary, Some(SummaryField::Last));
        assert_eq!(hr.output_name, "ultrahuman_heart_rate_bpm");
        assert!(hr.is_forwarded());

        let steps = registry.lookup("steps").unwrap();
        assert!(steps.counter);
        assert_eq!(steps.summary, Some(SummaryField::Total));

        let total_sleep = registry.lookup("total_sleep").unwrap();
        assert_eq!(total_sleep.kind, MetricKind::Scalar);
        assert!(total_sleep.is_duration);
        assert!(!total_sleep.is_forwarded());

        assert!(registry.lookup("sleep").is_none());
        assert!(registry.lookup("motion").is_none());
        assert!(registry.lookup("unknown_metric").is_none());
    }

    #[test]
    fn test_entries_iterate_in_wire_type_order() {
        let registry = MetricRegistry::standard();
        let wire_types: Vec<&str> = registry.entries().map(|e| e.wire_type).collect();
        let mut sorted = wire_types.clone();
        sorted.sort_unstable();
        assert_eq!(wire_types, sorted);
        assert_eq!(wire_types.first(), Some(&"active_minutes"));
        // Lookups still resolve after reordering
        assert_eq!(registry.lookup("vo2_max").unwrap().wire_type, "vo2_max");
    }

    #[test]
    fn test_duplicate_wire_type_rejected() {
        let entries = vec![
            RegistryEntry::scalar("recovery", "RECOVERY", "", "a"),
            RegistryEntry::scalar("recovery", "RECOVERY", "", "b"),
        ];
        let err = MetricRegistry::new(entries).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref t) if t == "recovery"));
    }

    #[test]
    fn test_special_metrics_bypass_registry() {
        assert_eq!(SpecialMetric::from_wire_type("sleep"), Some(SpecialMetric::Sleep));
        assert_eq!(SpecialMetric::from_wire_type("motion"), Some(SpecialMetric::Motion));
        assert_eq!(SpecialMetric::from_wire_type("hr"), None);
    }

    #[test]
    fn test_precision_overrides() {
        let registry = MetricRegistry::standard();
        for wire_type in ["temp", "vo2_max", "hba1c", "glucose_variability"] {
            assert_eq!(registry.lookup(wire_type).unwrap().precision, 1, "{wire_type}");
        }
        assert_eq!(registry.lookup("hr").unwrap().precision, 0);
    }
}
