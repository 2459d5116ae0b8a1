//! `splitio` is the core of a Split feature-flag SDK for Rust: given a user key and a split
//! name, it deterministically decides which treatment that user receives, based on declarative
//! split definitions synchronized from the remote authority, with no network call on the
//! evaluation hot path.
//!
//! # Overview
//!
//! `splitio` is organized as a set of building blocks.
//!
//! [`Snapshot`] is the heart of the SDK. It is an immutable structure holding the whole
//! server-provided dataset (compiled [split definitions](splits) and segments) that describes
//! how the SDK should evaluate user requests.
//!
//! [`SnapshotStore`](snapshot_store::SnapshotStore) is a thread-safe multi-reader multi-writer
//! in-memory manager for [`Snapshot`]. The job of the store is to be the central authority on
//! what dataset is currently active. Whenever a delta is applied, the snapshot is replaced
//! completely. When a reader gets a snapshot, it receives one that is not affected by further
//! writes—to provide a consistent response to the user, it is important that a reader uses the
//! same `Snapshot` throughout the operation.
//!
//! [`ChangeFetcher`](change_fetcher::ChangeFetcher) is an HTTP client that knows how to fetch
//! dataset deltas from the server using `since` cursors. It's best to save and reuse the same
//! instance, so it can reuse the connection.
//!
//! [`Synchronizer`](synchronizer::Synchronizer) runs one refresh cycle: it applies the split
//! delta and then refreshes every segment the split set references.
//!
//! [`PollerThread`](poller_thread::PollerThread) launches a background thread that periodically
//! runs a unit of work with no overlapping runs: dataset synchronization or telemetry flushing.
//!
//! [`eval`] module contains the functions for treatment evaluation. They are pure functions over
//! a snapshot and never fail: definition problems degrade to the `control` treatment with a
//! diagnostic label.
//!
//! [`telemetry`] module batches [impressions](telemetry::Impression) (evaluation outcomes),
//! `track` [events](telemetry::Event), and latency/counter observations in bounded in-memory
//! queues, drained periodically with at-most-once delivery.
//!
//! [`SplitClient`] ties the blocks together behind the host-facing surface: `get_treatment`,
//! `get_treatments`, `track`, and the `start`/`stop`/`flush` lifecycle.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod change_fetcher;
pub mod eval;
pub mod poller_thread;
pub mod snapshot_store;
pub mod splits;
pub mod synchronizer;
pub mod telemetry;

mod attributes;
mod bucketer;
mod client;
mod config;
mod error;
mod snapshot;
mod str;

pub use crate::str::Str;
pub use attributes::{AttributeValue, Attributes};
pub use client::{SplitClient, TreatmentWithConfig};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use eval::Key;
pub use snapshot::{Segment, Snapshot};

pub(crate) const SDK_NAME: &str = "rust";
pub(crate) const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
