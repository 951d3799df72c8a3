//! Poll loop
//!
//! Periodically fetches today's metrics, decodes them and forwards unseen
//! samples. Each cycle walks `Idle -> Fetching -> Decoding -> Forwarding ->
//! Idle`; a failure at any stage ends the cycle and the loop keeps going.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::client::MetricsSource;
use crate::decoder::decode_response;
use crate::error::{FetchError, TransportError};
use crate::forward::{CommitPolicy, ForwardEncoder};
use crate::registry::MetricRegistry;
use crate::remote_write::SampleSink;
use crate::tracker::TrackerState;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Stage of a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Decoding,
    Forwarding,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollState::Idle => "idle",
            PollState::Fetching => "fetching",
            PollState::Decoding => "decoding",
            PollState::Forwarding => "forwarding",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PollFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A poll cycle that stopped early
#[derive(Debug, Error)]
#[error("poll cycle failed while {stage}: {source}")]
pub struct CycleError {
    pub stage: PollState,
    #[source]
    pub source: PollFailure,
}

/// Summary of a completed poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dates: usize,
    pub decoded: usize,
    pub forwarded: usize,
}

/// Fetch-decode-forward loop
pub struct Poller<S, T> {
    source: S,
    sink: T,
    registry: Arc<MetricRegistry>,
    encoder: ForwardEncoder,
    tracker: Arc<TrackerState>,
    interval: Duration,
    policy: CommitPolicy,
}

impl<S, T> Poller<S, T>
where
    S: MetricsSource,
    T: SampleSink,
{
    pub fn new(
        source: S,
        sink: T,
        registry: Arc<MetricRegistry>,
        tracker: Arc<TrackerState>,
    ) -> Self {
        Self {
            source,
            sink,
            encoder: ForwardEncoder::new(Arc::clone(&registry)),
            registry,
            tracker,
            interval: DEFAULT_INTERVAL,
            policy: CommitPolicy::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one fetch-decode-forward cycle for `date`
    pub async fn poll_once(&self, date: NaiveDate) -> Result<CycleReport, CycleError> {
        tracing::debug!(state = %PollState::Fetching, %date);
        let response = self.source.fetch(date).await.map_err(|e| CycleError {
            stage: PollState::Fetching,
            source: e.into(),
        })?;

        tracing::debug!(state = %PollState::Decoding, dates = response.data.metrics.len());
        let report = decode_response(&response, &self.registry);
        let decoded = report.days.iter().map(|d| d.records.len()).sum();

        tracing::debug!(state = %PollState::Forwarding, decoded);
        let records = report.days.iter().flat_map(|d| d.records.iter());
        let plan = {
            let mut batch = self.tracker.begin();
            let plan = self.encoder.encode(records, &batch);
            if self.policy == CommitPolicy::BeforeSend {
                plan.commit(&mut batch);
            }
            plan
        };

        let summary = CycleReport {
            dates: report.days.len(),
            decoded,
            forwarded: plan.len(),
        };

        if plan.is_empty() {
            tracing::debug!("no new samples to push");
            return Ok(summary);
        }

        tracing::info!("Pushing {} data points via remote write", plan.len());
        self.sink.send(&plan.samples).await.map_err(|e| CycleError {
            stage: PollState::Forwarding,
            source: e.into(),
        })?;

        if self.policy == CommitPolicy::OnSuccess {
            plan.commit(&mut self.tracker.begin());
        }

        Ok(summary)
    }

    /// Poll immediately, then every interval, until the process exits
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately
            ticker.tick().await;
            let today = Local::now().date_naive();
            match self.poll_once(today).await {
                Ok(report) => tracing::debug!(?report, "poll cycle complete"),
                Err(e) => tracing::warn!(stage = %e.stage, error = %e.source, "poll cycle failed"),
            }
            tracing::trace!(state = %PollState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiResponse, WireSample};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses, repeating the last one
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<serde_json::Value, String>>>,
        fetches: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<serde_json::Value, String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn fetch(&self, _date: NaiveDate) -> Result<ApiResponse, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            };
            match next {
                Ok(value) => Ok(serde_json::from_value(value)?),
                Err(message) => Err(FetchError::Api(message)),
            }
        }
    }

    /// Records batches; optionally rejects the first `failures` sends
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<WireSample>>>,
        failures: Mutex<usize>,
    }

    #[async_trait]
    impl SampleSink for RecordingSink {
        async fn send(&self, samples: &[WireSample]) -> Result<(), TransportError> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::RemoteRejected {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.batches.lock().unwrap().push(samples.to_vec());
            Ok(())
        }
    }

    fn day(envelopes: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(json!({
            "data": {"metrics": {"2024-01-15": envelopes}, "latest_time_zone": "UTC"},
            "error": null,
            "status": 200
        }))
    }

    fn hr(values: serde_json::Value) -> serde_json::Value {
        json!({"type": "hr", "object": {"title": "HR", "values": values}})
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn poller(
        source: ScriptedSource,
        sink: Arc<RecordingSink>,
    ) -> (Poller<ScriptedSource, Arc<RecordingSink>>, Arc<TrackerState>) {
        let tracker = Arc::new(TrackerState::new());
        let poller = Poller::new(
            source,
            sink,
            Arc::new(MetricRegistry::standard()),
            Arc::clone(&tracker),
        );
        (poller, tracker)
    }

    #[tokio::test]
    async fn test_second_cycle_forwards_nothing_new() {
        let response = day(json!([hr(json!([
            {"value": 70, "timestamp": 1000},
            {"value": 72, "timestamp": 1005}
        ]))]));
        let sink = Arc::new(RecordingSink::default());
        let (poller, tracker) = poller(ScriptedSource::new(vec![response]), Arc::clone(&sink));

        let first = poller.poll_once(date()).await.unwrap();
        assert_eq!(
            first,
            CycleReport {
                dates: 1,
                decoded: 1,
                forwarded: 2
            }
        );

        let second = poller.poll_once(date()).await.unwrap();
        assert_eq!(second.forwarded, 0);

        // Empty batches never reach the sink
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
        assert_eq!(tracker.snapshot().latest_timestamp, 1005);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_cycle_only() {
        let sink = Arc::new(RecordingSink::default());
        let source = ScriptedSource::new(vec![
            Err("rate limited".to_string()),
            day(json!([hr(json!([{"value": 61, "timestamp": 2000}]))])),
        ]);
        let (poller, _tracker) = poller(source, Arc::clone(&sink));

        let err = poller.poll_once(date()).await.unwrap_err();
        assert_eq!(err.stage, PollState::Fetching);
        assert!(matches!(err.source, PollFailure::Fetch(FetchError::Api(_))));

        let report = poller.poll_once(date()).await.unwrap();
        assert_eq!(report.forwarded, 1);
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_with_on_success_policy() {
        let sink = Arc::new(RecordingSink {
            failures: Mutex::new(1),
            ..Default::default()
        });
        let response = day(json!([hr(json!([{"value": 70, "timestamp": 1000}]))]));
        let (poller, tracker) = poller(ScriptedSource::new(vec![response]), Arc::clone(&sink));

        let err = poller.poll_once(date()).await.unwrap_err();
        assert_eq!(err.stage, PollState::Forwarding);
        assert_eq!(tracker.last_forwarded("hr"), 0);

        let retry = poller.poll_once(date()).await.unwrap();
        assert_eq!(retry.forwarded, 1);
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
        assert_eq!(tracker.last_forwarded("hr"), 1000);
    }

    #[tokio::test]
    async fn test_failed_send_drops_batch_with_before_send_policy() {
        let sink = Arc::new(RecordingSink {
            failures: Mutex::new(1),
            ..Default::default()
        });
        let response = day(json!([hr(json!([{"value": 70, "timestamp": 1000}]))]));
        let (poller, tracker) = poller(ScriptedSource::new(vec![response]), Arc::clone(&sink));
        let poller = poller.with_commit_policy(CommitPolicy::BeforeSend);

        assert!(poller.poll_once(date()).await.is_err());
        assert_eq!(tracker.last_forwarded("hr"), 1000);

        let retry = poller.poll_once(date()).await.unwrap();
        assert_eq!(retry.forwarded, 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_dates_forwarded() {
        let response = Ok(json!({
            "data": {
                "metrics": {
                    "2024-01-14": [{"type": "steps", "object": {"day_start_timestamp": 86400, "total": 9000}}],
                    "2024-01-15": [{"type": "steps", "object": {"day_start_timestamp": 172800, "total": 1200}}]
                },
                "latest_time_zone": "UTC"
            },
            "error": null,
            "status": 200
        }));
        let sink = Arc::new(RecordingSink::default());
        let (poller, _tracker) = poller(ScriptedSource::new(vec![response]), Arc::clone(&sink));

        let report = poller.poll_once(date()).await.unwrap();
        assert_eq!(report.dates, 2);

        // Dates are walked in order, so both day starts advance the mark
        let batches = sink.batches.lock().unwrap();
        assert_eq!(
            batches[0],
            vec![
                WireSample::new("ultrahuman_steps_total", 9000.0, 86400).unwrap(),
                WireSample::new("ultrahuman_steps_total", 1200.0, 172800).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_does_not_abort_cycle() {
        let response = day(json!([hr(json!([
            {"value": 70, "timestamp": 9_300_000_000_000_000_i64},
            {"value": 72, "timestamp": 1005}
        ]))]));
        let sink = Arc::new(RecordingSink::default());
        let (poller, tracker) = poller(ScriptedSource::new(vec![response]), Arc::clone(&sink));

        let report = tokio::spawn(async move { poller.poll_once(date()).await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.forwarded, 1);
        assert_eq!(tracker.last_forwarded("hr"), 1005);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_immediately_and_on_interval() {
        let response = day(json!([]));
        let source = ScriptedSource::new(vec![response]);
        let fetches = Arc::clone(&source.fetches);
        let sink = Arc::new(RecordingSink::default());
        let (poller, _tracker) = poller(source, Arc::clone(&sink));
        let poller = poller.with_interval(Duration::from_secs(60));
        assert_eq!(poller.interval(), Duration::from_secs(60));

        let handle = tokio::spawn(poller.run());
        // Ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
