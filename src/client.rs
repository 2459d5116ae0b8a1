use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;

use crate::change_fetcher::{ChangeFetcher, ChangeFetcherConfig};
use crate::eval::{Evaluation, Evaluator, Key};
use crate::poller_thread::{PollerThread, PollerThreadConfig};
use crate::snapshot_store::SnapshotStore;
use crate::synchronizer::Synchronizer;
use crate::telemetry::{
    validate_track, Event, Recorder, RecorderConfig, Telemetry, SDK_GET_TREATMENT,
    SDK_GET_TREATMENTS, SDK_TRACK,
};
use crate::{AttributeValue, Attributes, ClientConfig, Error, Result, Str, SDK_NAME, SDK_VERSION};

/// A treatment together with its per-treatment configuration payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentWithConfig {
    pub treatment: Str,
    /// Raw JSON configured for the returned treatment, `None` when the treatment has no
    /// configuration.
    pub config: Option<String>,
}

struct Pollers {
    // Arc so waiters can block on readiness without holding the pollers lock.
    sync: Arc<PollerThread>,
    impressions: PollerThread,
    metrics: PollerThread,
}

/// A client for the Split API.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// # Background synchronization
///
/// Before calling `SplitClient::get_treatment()`, you should start the background pollers by
/// calling [`SplitClient::start()`], ensuring that the dataset is fetched. It's also recommended
/// to call [`SplitClient::wait_for_ready()`] before the first evaluation; until the first sync
/// completes, every split evaluates to `control`.
///
/// # Examples
/// ```no_run
/// # use splitio::{ClientConfig, SplitClient};
/// let client = ClientConfig::from_sdk_key("sdk-key").to_client();
/// client.start().unwrap();
/// client.wait_for_ready().unwrap();
/// let _treatment = client.get_treatment("user-1", "new_onboarding", &Default::default());
/// ```
pub struct SplitClient {
    evaluator: Evaluator,
    synchronizer: Arc<Synchronizer>,
    telemetry: Arc<Telemetry>,
    features_refresh: std::time::Duration,
    impressions_refresh: std::time::Duration,
    metrics_refresh: std::time::Duration,
    pollers: Mutex<Option<Pollers>>,
}

impl SplitClient {
    /// Create a new `SplitClient` using the specified configuration.
    ///
    /// ```
    /// # use splitio::{ClientConfig, SplitClient};
    /// let client = SplitClient::new(ClientConfig::from_sdk_key("sdk-key"));
    /// ```
    pub fn new(config: ClientConfig) -> SplitClient {
        SplitClient::new_with_store(config, Arc::new(SnapshotStore::new()))
    }

    fn new_with_store(config: ClientConfig, store: Arc<SnapshotStore>) -> SplitClient {
        let fetcher = ChangeFetcher::new(ChangeFetcherConfig {
            base_url: config.base_url,
            sdk_key: config.sdk_key.clone(),
            sdk_name: SDK_NAME.to_owned(),
            sdk_version: SDK_VERSION.to_owned(),
        });
        let recorder = Recorder::new(RecorderConfig {
            events_base_url: config.events_base_url,
            sdk_key: config.sdk_key,
        });

        SplitClient {
            evaluator: Evaluator::new(store.clone()),
            synchronizer: Arc::new(Synchronizer::new(fetcher, store)),
            telemetry: Arc::new(Telemetry::new(recorder)),
            features_refresh: config.features_refresh,
            impressions_refresh: config.impressions_refresh,
            metrics_refresh: config.metrics_refresh,
            pollers: Mutex::new(None),
        }
    }

    /// Get the treatment for the given split and key.
    ///
    /// Never fails: an unknown split, a not-yet-synchronized dataset, or a malformed definition
    /// all resolve to the `control` treatment. The evaluation outcome is queued as an impression.
    pub fn get_treatment(
        &self,
        key: impl Into<Key>,
        split_name: &str,
        attributes: &Attributes,
    ) -> Str {
        self.evaluate_and_record(key.into(), split_name, attributes, false)
            .treatment
    }

    /// Like [`get_treatment`](SplitClient::get_treatment), but also returns the per-treatment
    /// configuration payload.
    pub fn get_treatment_with_config(
        &self,
        key: impl Into<Key>,
        split_name: &str,
        attributes: &Attributes,
    ) -> TreatmentWithConfig {
        let evaluation = self.evaluate_and_record(key.into(), split_name, attributes, true);
        TreatmentWithConfig {
            treatment: evaluation.treatment,
            config: evaluation.config,
        }
    }

    /// Get treatments for several splits at once, evaluated against one consistent snapshot.
    pub fn get_treatments(
        &self,
        key: impl Into<Key>,
        split_names: &[&str],
        attributes: &Attributes,
    ) -> HashMap<Str, Str> {
        let started = Instant::now();
        let key = key.into();

        let telemetry = self.telemetry.clone();
        let record_key = key.clone();
        self.evaluator
            .evaluate_many(&key, split_names, attributes, false)
            .map(move |evaluations| {
                for (split_name, evaluation) in &evaluations {
                    telemetry.record_impression(split_name, &record_key, evaluation);
                }
                telemetry.track_latency(SDK_GET_TREATMENTS, started.elapsed());
                evaluations
            })
            .resolve()
            .into_iter()
            .map(|(split_name, evaluation)| (split_name, evaluation.treatment))
            .collect()
    }

    /// Queue an event for the given key and traffic type.
    ///
    /// Returns `false` (with no side effects) when the input is invalid: an empty or overlong
    /// key, an empty traffic type, an event type that does not match the accepted identifier
    /// format, or a non-finite value.
    pub fn track(
        &self,
        key: &str,
        traffic_type: &str,
        event_type: &str,
        value: Option<f64>,
        properties: Option<HashMap<String, AttributeValue>>,
    ) -> bool {
        let started = Instant::now();

        if !validate_track(key, traffic_type, event_type, value) {
            return false;
        }

        let traffic_type = if traffic_type.chars().any(|c| c.is_uppercase()) {
            log::warn!(target: "splitio", traffic_type; "track: traffic_type should be all lowercase, converting");
            traffic_type.to_lowercase()
        } else {
            traffic_type.to_owned()
        };

        let event = Event {
            event_type_id: event_type.into(),
            traffic_type_name: traffic_type.into(),
            key: key.into(),
            value,
            timestamp: Utc::now(),
            properties,
        };
        let accepted = self.telemetry.record_event(event);
        if accepted {
            log::info!(target: "splitio",
                       event_type,
                       key;
                       "queued event");
        }
        self.telemetry.track_latency(SDK_TRACK, started.elapsed());

        accepted
    }

    /// Start the background pollers: dataset synchronization, impression/event flushing, and
    /// metrics flushing. Calling `start` on a started client is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut pollers = self
            .pollers
            .lock()
            .expect("thread holding pollers lock should not panic");
        if pollers.is_some() {
            return Ok(());
        }

        let sync = {
            let synchronizer = self.synchronizer.clone();
            PollerThread::start_with_config(
                "sync",
                move || synchronizer.sync(),
                PollerThreadConfig::new().with_interval(self.features_refresh),
            )?
        };
        let impressions = {
            let telemetry = self.telemetry.clone();
            PollerThread::start_with_config(
                "impressions",
                move || {
                    telemetry.flush_impressions();
                    telemetry.flush_events();
                    Ok(())
                },
                PollerThreadConfig::new().with_interval(self.impressions_refresh),
            )?
        };
        let metrics = {
            let telemetry = self.telemetry.clone();
            PollerThread::start_with_config(
                "metrics",
                move || {
                    telemetry.flush_metrics();
                    Ok(())
                },
                PollerThreadConfig::new().with_interval(self.metrics_refresh),
            )?
        };

        *pollers = Some(Pollers {
            sync: Arc::new(sync),
            impressions,
            metrics,
        });
        Ok(())
    }

    /// Block until the first dataset synchronization completes.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] if [`start`](SplitClient::start) was not called.
    /// - [`Error::Unauthorized`] if the SDK key was rejected.
    /// - [`Error::PollerThreadPanicked`] if the sync poller panicked.
    pub fn wait_for_ready(&self) -> Result<()> {
        let sync = {
            let pollers = self
                .pollers
                .lock()
                .expect("thread holding pollers lock should not panic");
            match &*pollers {
                Some(pollers) => pollers.sync.clone(),
                None => return Err(Error::NotStarted),
            }
        };
        sync.wait_for_ready()
    }

    /// Stop the background pollers and flush whatever telemetry is still queued.
    ///
    /// No future poll cycle starts after this call; a cycle already in flight completes on its
    /// own. The client can keep evaluating against the last synchronized snapshot.
    pub fn stop(&self) {
        let taken = self
            .pollers
            .lock()
            .expect("thread holding pollers lock should not panic")
            .take();
        if let Some(pollers) = taken {
            pollers.sync.stop();
            pollers.impressions.stop();
            pollers.metrics.stop();
        }

        self.telemetry.flush();
    }

    /// Push queued impressions, events, and metrics now instead of waiting for the next flush
    /// cycle. A no-op when everything is empty.
    pub fn flush(&self) {
        self.telemetry.flush();
    }

    fn evaluate_and_record(
        &self,
        key: Key,
        split_name: &str,
        attributes: &Attributes,
        with_config: bool,
    ) -> Evaluation {
        let started = Instant::now();

        // The telemetry hand-off travels with the result, so ready and deferred evaluations
        // record impressions the same way.
        let telemetry = self.telemetry.clone();
        let record_split = Str::from(split_name);
        let record_key = key.clone();
        self.evaluator
            .evaluate(&key, split_name, attributes, with_config)
            .map(move |evaluation| {
                telemetry.record_evaluation(
                    &record_split,
                    &record_key,
                    &evaluation,
                    started.elapsed(),
                    SDK_GET_TREATMENT,
                );
                evaluation
            })
            .resolve()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::SplitClient;
    use crate::snapshot_store::SnapshotStore;
    use crate::splits::SplitChanges;
    use crate::ClientConfig;

    fn test_client(store: Arc<SnapshotStore>) -> SplitClient {
        // Unreachable events URL so accidental flushes fail fast instead of leaving the machine.
        let config = ClientConfig::from_sdk_key("sdk-key")
            .base_url("http://127.0.0.1:1")
            .events_base_url("http://127.0.0.1:1");
        SplitClient::new_with_store(config, store)
    }

    fn apply_all_keys_split(store: &SnapshotStore) {
        let changes: SplitChanges = serde_json::from_str(
            r#"{
                "since": -1,
                "till": 1,
                "splits": [{
                    "name": "onboarding",
                    "seed": 31,
                    "status": "ACTIVE",
                    "defaultTreatment": "off",
                    "changeNumber": 1,
                    "conditions": [{
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "on", "size": 100}]
                    }]
                }]
            }"#,
        )
        .unwrap();
        store.apply_split_changes(changes.splits, changes.till);
    }

    #[test]
    fn returns_control_while_no_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store);

        assert_eq!(
            client
                .get_treatment("u1", "onboarding", &HashMap::new())
                .as_ref(),
            "control"
        );
    }

    #[test]
    fn returns_proper_treatment_once_dataset_is_synced() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store.clone());

        // updating the dataset after the client is created
        apply_all_keys_split(&store);

        assert_eq!(
            client
                .get_treatment("u1", "onboarding", &HashMap::new())
                .as_ref(),
            "on"
        );
    }

    #[test]
    fn every_evaluation_queues_an_impression() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store.clone());
        apply_all_keys_split(&store);

        client.get_treatment("u1", "onboarding", &HashMap::new());
        client.get_treatment("u2", "missing", &HashMap::new());
        let results = client.get_treatments("u3", &["onboarding", "missing"], &HashMap::new());
        assert_eq!(results["onboarding"].as_ref(), "on");
        assert_eq!(results["missing"].as_ref(), "control");

        assert_eq!(client.telemetry.queued_impressions(), 4);
    }

    #[test]
    fn with_config_returns_payload() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store.clone());

        let changes: SplitChanges = serde_json::from_str(
            r#"{
                "since": -1,
                "till": 1,
                "splits": [{
                    "name": "pricing",
                    "seed": 31,
                    "status": "ACTIVE",
                    "defaultTreatment": "off",
                    "changeNumber": 1,
                    "configurations": {"on": "{\"discount\": 10}"},
                    "conditions": [{
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "on", "size": 100}]
                    }]
                }]
            }"#,
        )
        .unwrap();
        store.apply_split_changes(changes.splits, changes.till);

        let result = client.get_treatment_with_config("u1", "pricing", &HashMap::new());
        assert_eq!(result.treatment.as_ref(), "on");
        assert_eq!(result.config.as_deref(), Some("{\"discount\": 10}"));
    }

    #[test]
    fn track_queues_valid_events_and_rejects_invalid_ones() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store);

        assert!(client.track("u1", "user", "page_view", Some(1.0), None));
        assert_eq!(client.telemetry.queued_events(), 1);

        // Invalid input: rejected with no side effects.
        assert!(!client.track("", "user", "page_view", None, None));
        assert!(!client.track("u1", "", "page_view", None, None));
        assert!(!client.track("u1", "user", "bad event!", None, None));
        assert!(!client.track("u1", "user", "page_view", Some(f64::NAN), None));
        assert_eq!(client.telemetry.queued_events(), 1);

        // Uppercase traffic types are accepted but normalized.
        assert!(client.track("u1", "User", "page_view", None, None));
        assert_eq!(client.telemetry.queued_events(), 2);
    }

    #[test]
    fn wait_for_ready_requires_start() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store);
        assert!(matches!(
            client.wait_for_ready(),
            Err(crate::Error::NotStarted)
        ));
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let store = Arc::new(SnapshotStore::new());
        let client = test_client(store);
        client.stop();
        client.flush();
    }
}
