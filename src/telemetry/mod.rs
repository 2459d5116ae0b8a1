//! In-memory aggregation of impressions, events, and metrics, drained periodically by the
//! scheduler.
mod events;
mod impressions;
mod metrics;
mod queue;
mod recorder;

use std::time::Duration;

use chrono::Utc;

use crate::eval::{Evaluation, Key, CONTROL};
use crate::Str;

pub use events::Event;
pub(crate) use events::validate_track;
pub use impressions::Impression;
pub use metrics::{SDK_GET_TREATMENT, SDK_GET_TREATMENTS, SDK_TRACK};
pub use recorder::{Recorder, RecorderConfig, DEFAULT_EVENTS_BASE_URL};

use metrics::{CountersCollector, LatenciesCollector};
use queue::BoundedQueue;

const IMPRESSIONS_QUEUE_CAPACITY: usize = 30_000;
const EVENTS_QUEUE_CAPACITY: usize = 10_000;

/// Telemetry batches evaluation outcomes and timing/counter observations for periodic flush.
///
/// Queues are bounded and delivery is at-most-once: a flush drains the batch first and drops it
/// whether or not the push succeeds, accepting potential data loss over unbounded memory growth
/// or blocking the evaluation path.
pub struct Telemetry {
    impressions: BoundedQueue<Impression>,
    events: BoundedQueue<Event>,
    latencies: LatenciesCollector,
    counters: CountersCollector,
    recorder: Recorder,
}

impl Telemetry {
    pub fn new(recorder: Recorder) -> Telemetry {
        Telemetry {
            impressions: BoundedQueue::new(IMPRESSIONS_QUEUE_CAPACITY),
            events: BoundedQueue::new(EVENTS_QUEUE_CAPACITY),
            latencies: LatenciesCollector::new(),
            counters: CountersCollector::new(),
            recorder,
        }
    }

    /// Record the outcome of one evaluation: log it, queue an impression, and note the call
    /// latency.
    pub fn record_evaluation(
        &self,
        split_name: &Str,
        key: &Key,
        evaluation: &Evaluation,
        elapsed: Duration,
        operation: &'static str,
    ) {
        if evaluation.treatment.as_ref() != CONTROL {
            log::info!(target: "splitio",
                       split_name,
                       key = key.matching(),
                       treatment = evaluation.treatment;
                       "evaluated split");
        } else {
            log::warn!(target: "splitio",
                       split_name,
                       key = key.matching(),
                       label = evaluation.label;
                       "split evaluated to control");
        }

        self.record_impression(split_name, key, evaluation);
        self.latencies.track(operation, elapsed);
        self.counters.count(operation, 1);
    }

    /// Queue an impression for the given evaluation outcome.
    pub fn record_impression(&self, split_name: &Str, key: &Key, evaluation: &Evaluation) {
        let impression = Impression {
            feature: split_name.clone(),
            key_name: key.matching_str().clone(),
            bucketing_key: key.bucketing_str().cloned(),
            treatment: evaluation.treatment.clone(),
            label: evaluation.label,
            change_number: evaluation.change_number,
            time: Utc::now(),
        };
        if !self.impressions.push(impression) {
            log::warn!(target: "splitio", "impressions queue is full, dropping impression");
        }
    }

    /// Queue a `track` event.
    pub fn record_event(&self, event: Event) -> bool {
        let accepted = self.events.push(event);
        if !accepted {
            log::warn!(target: "splitio", "events queue is full, dropping event");
        }
        accepted
    }

    /// Note a latency observation for an SDK operation.
    pub fn track_latency(&self, operation: &str, elapsed: Duration) {
        self.latencies.track(operation, elapsed);
    }

    /// Increment a named counter.
    pub fn count(&self, name: &str, delta: u64) {
        self.counters.count(name, delta);
    }

    /// Push queued impressions. A no-op when the queue is empty; on delivery failure the drained
    /// batch is dropped.
    pub fn flush_impressions(&self) {
        if self.impressions.is_empty() {
            return;
        }

        let batch = self.impressions.drain();
        log::info!(target: "splitio", count = batch.len(); "pushing impressions");
        if let Err(err) = self.recorder.post_impressions(&batch) {
            log::warn!(target: "splitio", "failed to push impressions, dropping the batch: {err}");
        }
    }

    /// Push queued events. Same contract as [`flush_impressions`](Telemetry::flush_impressions).
    pub fn flush_events(&self) {
        if self.events.is_empty() {
            return;
        }

        let batch = self.events.drain();
        log::info!(target: "splitio", count = batch.len(); "pushing events");
        if let Err(err) = self.recorder.post_events(&batch) {
            log::warn!(target: "splitio", "failed to push events, dropping the batch: {err}");
        }
    }

    /// Push collected latencies and counters. Each collector is a no-op when empty; failed
    /// batches are dropped.
    pub fn flush_metrics(&self) {
        if !self.latencies.is_empty() {
            let latencies = self.latencies.drain();
            if let Err(err) = self.recorder.post_latencies(&latencies) {
                log::warn!(target: "splitio", "failed to push latencies, dropping the batch: {err}");
            }
        }

        if !self.counters.is_empty() {
            let counters = self.counters.drain();
            if let Err(err) = self.recorder.post_counters(&counters) {
                log::warn!(target: "splitio", "failed to push counters, dropping the batch: {err}");
            }
        }
    }

    /// Push everything currently queued.
    pub fn flush(&self) {
        self.flush_impressions();
        self.flush_events();
        self.flush_metrics();
    }

    #[cfg(test)]
    pub(crate) fn queued_impressions(&self) -> usize {
        self.impressions.len()
    }

    #[cfg(test)]
    pub(crate) fn queued_events(&self) -> usize {
        self.events.len()
    }
}
