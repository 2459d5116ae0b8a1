use std::collections::HashMap;
use std::sync::Arc;

use crate::snapshot_store::SnapshotStore;
use crate::{Attributes, Str};

use super::{get_treatment, get_treatments, Evaluation, Key, MaybeDeferred};

/// Evaluator binds the evaluation functions to a [`SnapshotStore`] and wraps results in
/// [`MaybeDeferred`].
///
/// Evaluation functions are pure and a bit tedious to call directly; `Evaluator` grabs the
/// current snapshot and passes repeated parameters automatically. The store is an explicit owned
/// field: every client instance carries its own evaluator, never a process-wide one.
pub struct Evaluator {
    store: Arc<SnapshotStore>,
}

impl Evaluator {
    pub fn new(store: Arc<SnapshotStore>) -> Evaluator {
        Evaluator { store }
    }

    /// Evaluate one split against the current snapshot.
    ///
    /// The in-memory store is always resident, so the result is `Ready`; storage adapters that
    /// resolve snapshots asynchronously return `Deferred` results through the same type.
    pub fn evaluate(
        &self,
        key: &Key,
        split_name: &str,
        attributes: &Attributes,
        with_config: bool,
    ) -> MaybeDeferred<Evaluation> {
        MaybeDeferred::ready(get_treatment(
            &self.store.snapshot(),
            key,
            split_name,
            attributes,
            with_config,
        ))
    }

    /// Evaluate several splits against one consistent snapshot.
    pub fn evaluate_many(
        &self,
        key: &Key,
        split_names: &[&str],
        attributes: &Attributes,
        with_config: bool,
    ) -> MaybeDeferred<HashMap<Str, Evaluation>> {
        MaybeDeferred::ready(get_treatments(
            &self.store.snapshot(),
            key,
            split_names,
            attributes,
            with_config,
        ))
    }
}
