//! A thread-safe in-memory storage for the currently active dataset. [`SnapshotStore`] provides
//! concurrent access for readers (flag evaluation) and writers (the periodic synchronizer).
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::snapshot::{Segment, Snapshot};
use crate::splits::compiler::compile_split;
use crate::splits::{SegmentChanges, SplitWire, Status, TryParse, NEVER_SYNCED};
use crate::Str;

/// `SnapshotStore` holds the authoritative local [`Snapshot`] and applies cursor-based deltas to
/// it.
///
/// `Snapshot` itself is always immutable: every apply builds the next snapshot off-line and
/// publishes it by swapping a single reference. A reader that obtained a snapshot keeps reading
/// the same consistent dataset regardless of concurrent writes; a reader that asks again after a
/// publish sees the whole delta, never a part of it.
///
/// Cursors are monotonic. A delta whose `till` does not advance past the current cursor is a
/// no-op, which protects against out-of-order and repeated delivery.
#[derive(Default)]
pub struct SnapshotStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    /// Create a new store holding the empty snapshot.
    pub fn new() -> SnapshotStore {
        SnapshotStore {
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    /// Get the currently-active snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        // The lock can be poisoned only if a writer panicked while holding it, which should never
        // happen.
        self.snapshot
            .read()
            .expect("thread holding snapshot lock should not panic")
            .clone()
    }

    /// Cursor of the last applied split delta.
    pub fn change_number(&self) -> i64 {
        self.snapshot().change_number
    }

    /// Cursor of the named segment, `-1` if it was never synchronized.
    pub fn segment_since(&self, name: &str) -> i64 {
        self.snapshot()
            .segment(name)
            .map_or(NEVER_SYNCED, |segment| segment.since)
    }

    /// Names of segments referenced by the current split set.
    pub fn referenced_segments(&self) -> HashSet<Str> {
        self.snapshot().referenced_segments()
    }

    /// Apply a split delta: upsert active definitions, drop archived ones, and advance the
    /// cursor to `till`.
    ///
    /// Returns `false` (and changes nothing) when `till` does not advance the cursor. Splits that
    /// failed to parse are skipped individually so the rest of the delta still applies.
    pub fn apply_split_changes(&self, splits: Vec<TryParse<SplitWire>>, till: i64) -> bool {
        let mut slot = self
            .snapshot
            .write()
            .expect("thread holding snapshot lock should not panic");

        let current = Arc::clone(&slot);
        if till <= current.change_number {
            log::debug!(target: "splitio",
                        till,
                        current = current.change_number;
                        "skipping stale split delta");
            return false;
        }

        let mut next_splits = current.splits.clone();
        for split in splits {
            let split = match split {
                TryParse::Parsed(split) => split,
                TryParse::ParseFailed(raw) => {
                    log::warn!(target: "splitio", raw:serde; "failed to parse a split definition, skipping it");
                    continue;
                }
            };

            match split.status {
                Status::Active => {
                    next_splits.insert(split.name.clone(), Arc::new(compile_split(split)));
                }
                // Archived (and unrecognized) definitions leave the snapshot.
                Status::Archived | Status::Unknown => {
                    next_splits.remove(&split.name);
                }
            }
        }

        *slot = Arc::new(Snapshot {
            splits: next_splits,
            segments: current.segments.clone(),
            change_number: till,
        });

        log::debug!(target: "splitio", till; "applied split delta");
        true
    }

    /// Apply a segment delta: union the added keys, subtract the removed ones, and advance the
    /// segment's cursor to `till`.
    ///
    /// Returns `false` (and changes nothing) when `till` does not advance that segment's cursor.
    pub fn apply_segment_changes(&self, changes: SegmentChanges) -> bool {
        let mut slot = self
            .snapshot
            .write()
            .expect("thread holding snapshot lock should not panic");

        let current = Arc::clone(&slot);
        let since = current
            .segment(&changes.name)
            .map_or(NEVER_SYNCED, |segment| segment.since);
        if changes.till <= since {
            log::debug!(target: "splitio",
                        segment = changes.name,
                        till = changes.till,
                        current = since;
                        "skipping stale segment delta");
            return false;
        }

        let mut keys = current
            .segment(&changes.name)
            .map(|segment| segment.keys.clone())
            .unwrap_or_default();
        for key in changes.added {
            keys.insert(key);
        }
        for key in &changes.removed {
            keys.remove(key.as_ref());
        }

        let mut next_segments = current.segments.clone();
        next_segments.insert(
            changes.name.clone(),
            Arc::new(Segment {
                name: changes.name.clone(),
                keys,
                since: changes.till,
            }),
        );

        *slot = Arc::new(Snapshot {
            splits: current.splits.clone(),
            segments: next_segments,
            change_number: current.change_number,
        });

        log::debug!(target: "splitio", segment = changes.name, till = changes.till; "applied segment delta");
        true
    }

    /// Replace the segment set with the single-key view returned by `/mySegments/{key}`: one
    /// one-member segment per returned name.
    ///
    /// This keeps `IN_SEGMENT` evaluation uniform between server-side segment sync and the
    /// client-side single-key mode. The endpoint carries no cursor, so the view is last-write-
    /// wins; atomicity still holds via snapshot replacement.
    pub fn apply_my_segments(&self, key: &str, names: Vec<Str>) {
        let mut slot = self
            .snapshot
            .write()
            .expect("thread holding snapshot lock should not panic");

        let current = Arc::clone(&slot);
        let key = Str::from(key);
        let segments = names
            .into_iter()
            .map(|name| {
                let segment = Segment {
                    name: name.clone(),
                    keys: [key.clone()].into_iter().collect(),
                    since: NEVER_SYNCED,
                };
                (name, Arc::new(segment))
            })
            .collect();

        *slot = Arc::new(Snapshot {
            splits: current.splits.clone(),
            segments,
            change_number: current.change_number,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SnapshotStore;
    use crate::splits::{SegmentChanges, SplitChanges};

    fn split_changes(json: &str) -> SplitChanges {
        serde_json::from_str(json).unwrap()
    }

    fn one_split_delta(name: &str, status: &str, till: i64) -> SplitChanges {
        split_changes(&format!(
            r#"{{
                "since": -1,
                "till": {till},
                "splits": [{{
                    "name": "{name}",
                    "seed": 31,
                    "status": "{status}",
                    "defaultTreatment": "off",
                    "changeNumber": {till},
                    "conditions": []
                }}]
            }}"#
        ))
    }

    fn segment_delta(name: &str, added: &[&str], removed: &[&str], till: i64) -> SegmentChanges {
        SegmentChanges {
            name: name.into(),
            since: -1,
            till,
            added: added.iter().map(|k| (*k).into()).collect(),
            removed: removed.iter().map(|k| (*k).into()).collect(),
        }
    }

    #[test]
    fn starts_empty() {
        let store = SnapshotStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.change_number(), -1);
        assert_eq!(snapshot.split_names().count(), 0);
    }

    #[test]
    fn apply_advances_cursor_and_data() {
        let store = SnapshotStore::new();
        let changes = one_split_delta("flag", "ACTIVE", 100);
        assert!(store.apply_split_changes(changes.splits, changes.till));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.change_number(), 100);
        assert!(snapshot.split("flag").is_some());
    }

    #[test]
    fn stale_delta_is_a_no_op() {
        let store = SnapshotStore::new();
        let changes = one_split_delta("flag", "ACTIVE", 100);
        assert!(store.apply_split_changes(changes.splits, changes.till));

        // Same cursor: no-op.
        let replay = one_split_delta("other", "ACTIVE", 100);
        assert!(!store.apply_split_changes(replay.splits, replay.till));
        assert!(store.snapshot().split("other").is_none());

        // Older cursor: no-op.
        let stale = one_split_delta("other", "ACTIVE", 50);
        assert!(!store.apply_split_changes(stale.splits, stale.till));
        assert_eq!(store.change_number(), 100);
    }

    #[test]
    fn archived_split_is_removed() {
        let store = SnapshotStore::new();
        let changes = one_split_delta("flag", "ACTIVE", 100);
        store.apply_split_changes(changes.splits, changes.till);

        let archive = one_split_delta("flag", "ARCHIVED", 200);
        assert!(store.apply_split_changes(archive.splits, archive.till));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.change_number(), 200);
        assert!(snapshot.split("flag").is_none());
    }

    #[test]
    fn bad_split_does_not_poison_delta() {
        let store = SnapshotStore::new();
        let changes = split_changes(
            r#"{
                "since": -1,
                "till": 100,
                "splits": [
                    {"name": "bad", "seed": "nope", "status": "ACTIVE"},
                    {
                        "name": "good",
                        "seed": 31,
                        "status": "ACTIVE",
                        "defaultTreatment": "off",
                        "changeNumber": 100,
                        "conditions": []
                    }
                ]
            }"#,
        );
        assert!(store.apply_split_changes(changes.splits, changes.till));

        let snapshot = store.snapshot();
        assert!(snapshot.split("good").is_some());
        assert!(snapshot.split("bad").is_none());
    }

    #[test]
    fn segment_delta_applies_adds_and_removes() {
        let store = SnapshotStore::new();
        assert!(store.apply_segment_changes(segment_delta("beta", &["u1", "u2"], &[], 10)));
        assert_eq!(store.segment_since("beta"), 10);

        assert!(store.apply_segment_changes(segment_delta("beta", &["u3"], &["u1"], 20)));
        let snapshot = store.snapshot();
        let segment = snapshot.segment("beta").unwrap();
        assert!(!segment.contains("u1"));
        assert!(segment.contains("u2"));
        assert!(segment.contains("u3"));
        assert_eq!(segment.since, 20);

        // Cursors are per segment.
        assert!(store.apply_segment_changes(segment_delta("employees", &["e1"], &[], 5)));
        assert!(!store.apply_segment_changes(segment_delta("beta", &["u9"], &[], 20)));
    }

    #[test]
    fn my_segments_builds_single_key_view() {
        let store = SnapshotStore::new();
        store.apply_my_segments("u1", vec!["beta".into(), "employees".into()]);

        let snapshot = store.snapshot();
        assert!(snapshot.segment("beta").unwrap().contains("u1"));
        assert!(!snapshot.segment("beta").unwrap().contains("u2"));
        assert!(snapshot.segment("employees").unwrap().contains("u1"));

        // A later fetch replaces the view wholesale.
        store.apply_my_segments("u1", vec!["beta".into()]);
        assert!(store.snapshot().segment("employees").is_none());
    }

    #[test]
    fn can_apply_from_another_thread() {
        let store = Arc::new(SnapshotStore::new());

        assert_eq!(store.snapshot().change_number(), -1);

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                let changes = one_split_delta("flag", "ACTIVE", 100);
                store.apply_split_changes(changes.splits, changes.till);
            })
            .join();
        }

        assert_eq!(store.snapshot().change_number(), 100);
    }

    #[test]
    fn readers_never_observe_a_torn_segment_update() {
        let store = Arc::new(SnapshotStore::new());
        store.apply_segment_changes(segment_delta("beta", &["a", "b", "c"], &[], 1));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                // Flip membership between {a,b,c} and {x,y,z} in single deltas.
                for till in 2..200i64 {
                    let (added, removed): (&[&str], &[&str]) = if till % 2 == 0 {
                        (&["x", "y", "z"], &["a", "b", "c"])
                    } else {
                        (&["a", "b", "c"], &["x", "y", "z"])
                    };
                    store.apply_segment_changes(segment_delta("beta", added, removed, till));
                }
            })
        };

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let snapshot = store.snapshot();
                    let segment = snapshot.segment("beta").unwrap();
                    let abc = ["a", "b", "c"].iter().filter(|k| segment.contains(k)).count();
                    let xyz = ["x", "y", "z"].iter().filter(|k| segment.contains(k)).count();
                    // Either generation is fine; a mix of both is a torn update.
                    assert!(
                        (abc == 3 && xyz == 0) || (abc == 0 && xyz == 3),
                        "observed torn segment: abc={abc} xyz={xyz}"
                    );
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
