use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::Str;

/// Operation names used for SDK latency and counter observations.
pub const SDK_GET_TREATMENT: &str = "sdk.getTreatment";
pub const SDK_GET_TREATMENTS: &str = "sdk.getTreatments";
pub const SDK_TRACK: &str = "sdk.track";

/// Per-operation latency observations (microseconds), drained wholesale on flush.
#[derive(Debug, Default)]
pub(crate) struct LatenciesCollector {
    inner: Mutex<HashMap<Str, Vec<u64>>>,
}

impl LatenciesCollector {
    pub fn new() -> LatenciesCollector {
        LatenciesCollector::default()
    }

    pub fn track(&self, operation: &str, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .entry(operation.into())
            .or_default()
            .push(elapsed.as_micros() as u64);
    }

    pub fn drain(&self) -> HashMap<Str, Vec<u64>> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

/// Named counters, drained wholesale on flush.
#[derive(Debug, Default)]
pub(crate) struct CountersCollector {
    inner: Mutex<HashMap<Str, u64>>,
}

impl CountersCollector {
    pub fn new() -> CountersCollector {
        CountersCollector::default()
    }

    pub fn count(&self, name: &str, delta: u64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.entry(name.into()).or_default() += delta;
    }

    pub fn drain(&self) -> HashMap<Str, u64> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
