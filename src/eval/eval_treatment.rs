use std::collections::HashMap;

use serde::Serialize;

use crate::bucketer;
use crate::snapshot::Snapshot;
use crate::splits::compiler::{CompiledCondition, CompiledSplit};
use crate::{Attributes, Str};

use super::Key;

/// The treatment returned when no split definition can answer the call.
pub const CONTROL: &str = "control";

/// Diagnostic reason code accompanying an evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// The requested split is not in the snapshot.
    DefinitionNotFound,
    /// The split is killed; the default treatment applies unconditionally.
    Killed,
    /// A condition matched and its partition table produced a winner.
    Matched,
    /// No condition matched, or the matched condition's partitions yielded no winner.
    NoConditionMatched,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::DefinitionNotFound => "definition_not_found",
            Label::Killed => "killed",
            Label::Matched => "matched",
            Label::NoConditionMatched => "no_condition_matched",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl log::kv::ToValue for Label {
    fn to_value(&self) -> log::kv::Value {
        log::kv::Value::from_display(self)
    }
}

/// The outcome of evaluating one split for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub treatment: Str,
    pub label: Label,
    /// Change number of the split definition that produced this result. `None` when the
    /// definition was not found.
    pub change_number: Option<i64>,
    /// Per-treatment configuration payload, attached only by the with-config entry points.
    pub config: Option<String>,
}

impl Evaluation {
    fn control(label: Label) -> Evaluation {
        Evaluation {
            treatment: CONTROL.into(),
            label,
            change_number: None,
            config: None,
        }
    }
}

/// Evaluate one split against a snapshot.
///
/// This is a pure function over resident data: it performs no I/O and never fails. Definition
/// problems degrade to the `control` treatment (or the split's default treatment) with a
/// diagnostic label.
pub fn get_treatment(
    snapshot: &Snapshot,
    key: &Key,
    split_name: &str,
    attributes: &Attributes,
    with_config: bool,
) -> Evaluation {
    let Some(split) = snapshot.split(split_name) else {
        log::warn!(target: "splitio", split_name; "split not found in snapshot");
        return Evaluation::control(Label::DefinitionNotFound);
    };

    let mut evaluation = split.eval(key, attributes, snapshot);

    if with_config {
        evaluation.config = split.configurations.get(&*evaluation.treatment).cloned();
    }

    log::trace!(target: "splitio",
                split_name,
                key = key.matching(),
                treatment = evaluation.treatment,
                label = evaluation.label;
                "evaluated a split");

    evaluation
}

impl CompiledSplit {
    fn eval(&self, key: &Key, attributes: &Attributes, snapshot: &Snapshot) -> Evaluation {
        if self.killed {
            return self.resolved(Label::Killed, self.default_treatment.clone());
        }

        // First fully-satisfied condition wins; order is part of the definition's semantics.
        for condition in &self.conditions {
            if !condition.matches(key, attributes, snapshot) {
                continue;
            }

            let bucket = bucketer::bucket(key.bucketing(), self.seed, self.algo);
            return match bucketer::partition_treatment(&condition.partitions, bucket) {
                Some(treatment) => self.resolved(Label::Matched, treatment.clone()),
                // The matched condition's table does not cover this bucket. That is a deliberate
                // "no winning partition", not a reason to try later conditions.
                None => self.resolved(Label::NoConditionMatched, self.default_treatment.clone()),
            };
        }

        self.resolved(Label::NoConditionMatched, self.default_treatment.clone())
    }

    fn resolved(&self, label: Label, treatment: Str) -> Evaluation {
        Evaluation {
            treatment,
            label,
            change_number: Some(self.change_number),
            config: None,
        }
    }
}

/// Evaluate several splits against the same snapshot, so one call observes one consistent
/// dataset.
pub fn get_treatments(
    snapshot: &Snapshot,
    key: &Key,
    split_names: &[&str],
    attributes: &Attributes,
    with_config: bool,
) -> HashMap<Str, Evaluation> {
    split_names
        .iter()
        .map(|name| {
            (
                Str::from(*name),
                get_treatment(snapshot, key, name, attributes, with_config),
            )
        })
        .collect()
}

impl CompiledCondition {
    /// AND-combine the condition's matchers, stopping at the first false one.
    fn matches(&self, key: &Key, attributes: &Attributes, snapshot: &Snapshot) -> bool {
        self.matchers
            .iter()
            .all(|matcher| matcher.eval(key, attributes, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::{get_treatment, get_treatments, Label, CONTROL};
    use crate::eval::Key;
    use crate::snapshot::Snapshot;
    use crate::snapshot_store::SnapshotStore;
    use crate::splits::{SegmentChanges, SplitChanges};

    /// Build a snapshot by pushing a split delta through the store, the same way production data
    /// arrives.
    fn snapshot_with(splits_json: &str) -> Arc<Snapshot> {
        let changes: SplitChanges =
            serde_json::from_str(&format!(r#"{{"since": -1, "till": 1, "splits": {splits_json}}}"#))
                .unwrap();
        let store = SnapshotStore::new();
        store.apply_split_changes(changes.splits, changes.till);
        store.snapshot()
    }

    fn no_attributes() -> HashMap<String, crate::AttributeValue> {
        HashMap::new()
    }

    #[test]
    fn all_keys_hundred_percent_on() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let evaluation =
            get_treatment(&snapshot, &Key::new("anykey"), "A", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), "on");
        assert_eq!(evaluation.label, Label::Matched);
        assert_eq!(evaluation.change_number, Some(1));
    }

    #[test]
    fn zero_size_partition_never_wins() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [
                        {"treatment": "on", "size": 0},
                        {"treatment": "off", "size": 100}
                    ]
                }]
            }]"#,
        );

        for key in ["a key", "another key", "u1", "u2"] {
            let evaluation = get_treatment(&snapshot, &Key::new(key), "A", &no_attributes(), false);
            assert_eq!(evaluation.treatment.as_ref(), "off");
        }
    }

    #[test]
    fn whitelist_miss_falls_through_to_default() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {
                        "combiner": "AND",
                        "matchers": [{
                            "matcherType": "WHITELIST",
                            "whitelistMatcherData": {"whitelist": ["u1", "u2"]}
                        }]
                    },
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let miss = get_treatment(&snapshot, &Key::new("u3"), "A", &no_attributes(), false);
        assert_eq!(miss.treatment.as_ref(), CONTROL);
        assert_eq!(miss.label, Label::NoConditionMatched);

        let hit = get_treatment(&snapshot, &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(hit.treatment.as_ref(), "on");
        assert_eq!(hit.label, Label::Matched);
    }

    #[test]
    fn unknown_matcher_kind_resolves_to_default() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {
                        "combiner": "AND",
                        "matchers": [{"matcherType": "SOME_FUTURE_MATCHER"}]
                    },
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let evaluation =
            get_treatment(&snapshot, &Key::new("test@split.io"), "A", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), CONTROL);
        assert_eq!(evaluation.label, Label::NoConditionMatched);
    }

    #[test]
    fn missing_definition_returns_control() {
        let snapshot = Snapshot::empty();
        let evaluation =
            get_treatment(&snapshot, &Key::new("u1"), "nope", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), CONTROL);
        assert_eq!(evaluation.label, Label::DefinitionNotFound);
        assert_eq!(evaluation.change_number, None);
    }

    #[test]
    fn killed_split_returns_default_treatment() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "killed": true,
                "defaultTreatment": "off",
                "changeNumber": 7,
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let evaluation = get_treatment(&snapshot, &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), "off");
        assert_eq!(evaluation.label, Label::Killed);
        assert_eq!(evaluation.change_number, Some(7));
    }

    #[test]
    fn condition_order_is_significant() {
        let whitelist_then_all = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [
                    {
                        "matcherGroup": {
                            "combiner": "AND",
                            "matchers": [{
                                "matcherType": "WHITELIST",
                                "whitelistMatcherData": {"whitelist": ["u1"]}
                            }]
                        },
                        "partitions": [{"treatment": "vip", "size": 100}]
                    },
                    {
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "on", "size": 100}]
                    }
                ]
            }]"#,
        );
        let all_then_whitelist = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [
                    {
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "on", "size": 100}]
                    },
                    {
                        "matcherGroup": {
                            "combiner": "AND",
                            "matchers": [{
                                "matcherType": "WHITELIST",
                                "whitelistMatcherData": {"whitelist": ["u1"]}
                            }]
                        },
                        "partitions": [{"treatment": "vip", "size": 100}]
                    }
                ]
            }]"#,
        );

        // Both conditions match "u1"; the first one listed wins.
        let first = get_treatment(&whitelist_then_all, &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(first.treatment.as_ref(), "vip");
        let second = get_treatment(&all_then_whitelist, &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(second.treatment.as_ref(), "on");
    }

    #[test]
    fn uncovered_bucket_falls_back_to_default_without_trying_later_conditions() {
        // "a key" hashes to bucket 59 under seed 31 (legacy algorithm).
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [
                    {
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "on", "size": 50}]
                    },
                    {
                        "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                        "partitions": [{"treatment": "late", "size": 100}]
                    }
                ]
            }]"#,
        );

        let evaluation = get_treatment(&snapshot, &Key::new("a key"), "A", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), CONTROL);
        assert_eq!(evaluation.label, Label::NoConditionMatched);
    }

    #[test]
    fn covered_bucket_matches() {
        // Bucket 59 is inside a 60% partition.
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [{"treatment": "on", "size": 60}]
                }]
            }]"#,
        );

        let evaluation = get_treatment(&snapshot, &Key::new("a key"), "A", &no_attributes(), false);
        assert_eq!(evaluation.treatment.as_ref(), "on");
        assert_eq!(evaluation.label, Label::Matched);
    }

    #[test]
    fn bucketing_key_drives_allocation_but_not_membership() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {
                        "combiner": "AND",
                        "matchers": [{
                            "matcherType": "WHITELIST",
                            "whitelistMatcherData": {"whitelist": ["u1"]}
                        }]
                    },
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        // Membership checks see the matching key even when a bucketing key is present.
        let evaluation = get_treatment(
            &snapshot,
            &Key::with_bucketing("u1", "account-7"),
            "A",
            &no_attributes(),
            false,
        );
        assert_eq!(evaluation.treatment.as_ref(), "on");

        let evaluation = get_treatment(
            &snapshot,
            &Key::with_bucketing("u3", "u1"),
            "A",
            &no_attributes(),
            false,
        );
        assert_eq!(evaluation.treatment.as_ref(), CONTROL);
    }

    #[test]
    fn in_segment_uses_snapshot_membership() {
        let changes: SplitChanges = serde_json::from_str(
            r#"{
                "since": -1,
                "till": 1,
                "splits": [{
                    "name": "A",
                    "seed": 31,
                    "status": "ACTIVE",
                    "defaultTreatment": "control",
                    "changeNumber": 1,
                    "conditions": [{
                        "matcherGroup": {
                            "combiner": "AND",
                            "matchers": [{
                                "matcherType": "IN_SEGMENT",
                                "userDefinedSegmentMatcherData": {"segmentName": "beta"}
                            }]
                        },
                        "partitions": [{"treatment": "on", "size": 100}]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let store = SnapshotStore::new();
        store.apply_split_changes(changes.splits, changes.till);

        // Before the segment syncs it is treated as empty.
        let before = get_treatment(&store.snapshot(), &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(before.treatment.as_ref(), CONTROL);

        store.apply_segment_changes(SegmentChanges {
            name: "beta".into(),
            since: -1,
            till: 10,
            added: vec!["u1".into()],
            removed: vec![],
        });

        let member = get_treatment(&store.snapshot(), &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(member.treatment.as_ref(), "on");
        let outsider = get_treatment(&store.snapshot(), &Key::new("u2"), "A", &no_attributes(), false);
        assert_eq!(outsider.treatment.as_ref(), CONTROL);
    }

    #[test]
    fn with_config_attaches_treatment_payload() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "off",
                "changeNumber": 1,
                "configurations": {"on": "{\"color\": \"blue\"}"},
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let with = get_treatment(&snapshot, &Key::new("u1"), "A", &no_attributes(), true);
        assert_eq!(with.config.as_deref(), Some("{\"color\": \"blue\"}"));

        let without = get_treatment(&snapshot, &Key::new("u1"), "A", &no_attributes(), false);
        assert_eq!(without.config, None);
    }

    #[test]
    fn get_treatments_evaluates_every_name() {
        let snapshot = snapshot_with(
            r#"[{
                "name": "A",
                "seed": 31,
                "status": "ACTIVE",
                "defaultTreatment": "control",
                "changeNumber": 1,
                "conditions": [{
                    "matcherGroup": {"combiner": "AND", "matchers": [{"matcherType": "ALL_KEYS"}]},
                    "partitions": [{"treatment": "on", "size": 100}]
                }]
            }]"#,
        );

        let results = get_treatments(
            &snapshot,
            &Key::new("u1"),
            &["A", "missing"],
            &no_attributes(),
            false,
        );
        assert_eq!(results["A"].treatment.as_ref(), "on");
        assert_eq!(results["missing"].treatment.as_ref(), CONTROL);
        assert_eq!(results["missing"].label, Label::DefinitionNotFound);
    }
}
