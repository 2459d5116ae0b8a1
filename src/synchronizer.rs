//! Drives one refresh cycle: fetch the split delta, apply it, then refresh every referenced
//! segment.
use std::sync::{Arc, Mutex};

use crate::change_fetcher::ChangeFetcher;
use crate::snapshot_store::SnapshotStore;
use crate::Result;

/// Synchronizer connects a [`ChangeFetcher`] to a [`SnapshotStore`].
///
/// Each cycle asks the server for everything past the store's cursors and hands the deltas to
/// the store, which applies them atomically. Fetch failures leave the store serving the last
/// good snapshot; the poller retries on the next cycle.
pub struct Synchronizer {
    // Fetching mutates the fetcher (cursorless auth caching), so it sits behind a mutex even
    // though only one sync poller normally drives it.
    fetcher: Mutex<ChangeFetcher>,
    store: Arc<SnapshotStore>,
}

impl Synchronizer {
    pub fn new(fetcher: ChangeFetcher, store: Arc<SnapshotStore>) -> Synchronizer {
        Synchronizer {
            fetcher: Mutex::new(fetcher),
            store,
        }
    }

    /// Run one full refresh cycle: splits first, then the segments they reference.
    pub fn sync(&self) -> Result<()> {
        self.sync_splits()?;
        self.sync_segments()
    }

    /// Fetch and apply the split delta since the store's current cursor.
    pub fn sync_splits(&self) -> Result<()> {
        let since = self.store.change_number();
        let changes = self.lock_fetcher().fetch_split_changes(since)?;
        self.store.apply_split_changes(changes.splits, changes.till);
        Ok(())
    }

    /// Fetch and apply deltas for every segment referenced by the current split set.
    ///
    /// No segment is synchronized unless some split references it.
    pub fn sync_segments(&self) -> Result<()> {
        for name in self.store.referenced_segments() {
            let since = self.store.segment_since(&name);
            let changes = self.lock_fetcher().fetch_segment_changes(&name, since)?;
            self.store.apply_segment_changes(changes);
        }
        Ok(())
    }

    /// Single-key mode: fetch the segments `user_key` belongs to and install the one-key
    /// membership view in the store.
    pub fn sync_my_segments(&self, user_key: &str) -> Result<()> {
        let names = self.lock_fetcher().fetch_my_segments(user_key)?;
        self.store.apply_my_segments(user_key, names);
        Ok(())
    }

    fn lock_fetcher(&self) -> std::sync::MutexGuard<'_, ChangeFetcher> {
        self.fetcher
            .lock()
            .expect("thread holding fetcher lock should not panic")
    }
}
