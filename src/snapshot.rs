use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::splits::compiler::CompiledSplit;
use crate::splits::NEVER_SYNCED;
use crate::Str;

/// A remotely-managed set of keys usable in `IN_SEGMENT` matchers.
#[derive(Debug)]
pub struct Segment {
    pub name: Str,
    pub keys: HashSet<Str>,
    /// Delta-sync cursor for this segment. `-1` means the segment has never been synchronized.
    pub since: i64,
}

impl Segment {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// The dataset evaluations run against: compiled split definitions, segments, and the
/// split-changes cursor.
///
/// A `Snapshot` is immutable and internally consistent. [`SnapshotStore`] builds a full
/// replacement for every applied delta and publishes it with a single swap, so an evaluation
/// holding a snapshot never observes a half-applied update.
///
/// [`SnapshotStore`]: crate::snapshot_store::SnapshotStore
#[derive(Debug)]
pub struct Snapshot {
    pub(crate) splits: HashMap<Str, Arc<CompiledSplit>>,
    pub(crate) segments: HashMap<Str, Arc<Segment>>,
    pub(crate) change_number: i64,
}

impl Snapshot {
    /// The empty dataset every client starts from.
    pub fn empty() -> Snapshot {
        Snapshot {
            splits: HashMap::new(),
            segments: HashMap::new(),
            change_number: NEVER_SYNCED,
        }
    }

    /// Cursor of the last applied split delta, `-1` before the first sync.
    pub fn change_number(&self) -> i64 {
        self.change_number
    }

    pub fn split_names(&self) -> impl Iterator<Item = &Str> {
        self.splits.keys()
    }

    /// Names of all segments referenced by some split in this snapshot, deduplicated. Only these
    /// segments are worth synchronizing.
    pub fn referenced_segments(&self) -> HashSet<Str> {
        self.splits
            .values()
            .flat_map(|split| split.referenced_segments.iter().cloned())
            .collect()
    }

    pub(crate) fn split(&self, name: &str) -> Option<&CompiledSplit> {
        self.splits.get(name).map(Arc::as_ref)
    }

    pub(crate) fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.get(name).map(Arc::as_ref)
    }
}

impl Default for Snapshot {
    fn default() -> Snapshot {
        Snapshot::empty()
    }
}
