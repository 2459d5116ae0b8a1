/// An evaluation result that is either immediately available or produced by a deferred
/// computation.
///
/// The in-memory [`SnapshotStore`] always yields `Ready` results, but storage adapters that are
/// inherently asynchronous (e.g., a shared remote cache) yield `Deferred` ones. Call sites
/// combine both uniformly through [`map`] and force the value with [`resolve`]; the
/// ready-vs-deferred distinction is confined to this type instead of leaking runtime checks into
/// business logic.
///
/// [`SnapshotStore`]: crate::snapshot_store::SnapshotStore
/// [`map`]: MaybeDeferred::map
/// [`resolve`]: MaybeDeferred::resolve
pub enum MaybeDeferred<T> {
    /// The value is already available.
    Ready(T),
    /// The value will be produced on demand.
    Deferred(Box<dyn FnOnce() -> T + Send>),
}

impl<T: Send + 'static> MaybeDeferred<T> {
    pub fn ready(value: T) -> MaybeDeferred<T> {
        MaybeDeferred::Ready(value)
    }

    pub fn deferred(thunk: impl FnOnce() -> T + Send + 'static) -> MaybeDeferred<T> {
        MaybeDeferred::Deferred(Box::new(thunk))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MaybeDeferred::Ready(_))
    }

    /// Apply `f` to the eventual value without forcing a deferred computation.
    pub fn map<U>(self, f: impl FnOnce(T) -> U + Send + 'static) -> MaybeDeferred<U> {
        match self {
            MaybeDeferred::Ready(value) => MaybeDeferred::Ready(f(value)),
            MaybeDeferred::Deferred(thunk) => MaybeDeferred::Deferred(Box::new(move || f(thunk()))),
        }
    }

    /// Force the value.
    pub fn resolve(self) -> T {
        match self {
            MaybeDeferred::Ready(value) => value,
            MaybeDeferred::Deferred(thunk) => thunk(),
        }
    }
}
