//! A background thread that periodically runs a unit of work: fetching dataset deltas, flushing
//! impressions, or pushing metrics.
use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Condvar, Mutex},
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{Error, Result};

/// Configuration for [`PollerThread`].
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct PollerThreadConfig {
    /// Interval to wait between runs of the job.
    ///
    /// Defaults to [`PollerThreadConfig::DEFAULT_POLL_INTERVAL`].
    pub interval: Duration,
    /// Jitter applies a randomized duration to wait between runs. This helps to avoid multiple
    /// server instances synchronizing and producing spiky network load.
    ///
    /// Defaults to [`PollerThreadConfig::DEFAULT_POLL_JITTER`].
    pub jitter: Duration,
}

impl PollerThreadConfig {
    /// Default value for [`PollerThreadConfig::interval`].
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    /// Default value for [`PollerThreadConfig::jitter`].
    pub const DEFAULT_POLL_JITTER: Duration = Duration::from_secs(3);

    /// Create a new `PollerThreadConfig` using default configuration.
    pub fn new() -> PollerThreadConfig {
        PollerThreadConfig::default()
    }

    /// Update poll interval with `interval`.
    pub fn with_interval(mut self, interval: Duration) -> PollerThreadConfig {
        self.interval = interval;
        self
    }

    /// Update poll interval jitter with `jitter`.
    pub fn with_jitter(mut self, jitter: Duration) -> PollerThreadConfig {
        self.jitter = jitter;
        self
    }
}

impl Default for PollerThreadConfig {
    fn default() -> PollerThreadConfig {
        PollerThreadConfig {
            interval: PollerThreadConfig::DEFAULT_POLL_INTERVAL,
            jitter: PollerThreadConfig::DEFAULT_POLL_JITTER,
        }
    }
}

/// A periodic job runner with no overlapping runs.
///
/// The job runs once immediately on start. The next run is scheduled only after the previous one
/// settled (success or failure), so two runs of the same timer never overlap. [`stop`] prevents
/// any future run from starting but does not cancel a run already in flight; a stopped poller
/// stays stopped (construct a new one to restart).
///
/// [`stop`]: PollerThread::stop
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,

    /// Holds `None` if the job hasn't run yet. Holds `Some(Ok(()))` after the first successful
    /// run. Holds `Some(Err(...))` if the first run failed.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl PollerThread {
    /// Start a poller thread running `job` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an IO Error if the thread failed to start.
    pub fn start<F>(name: &str, job: F) -> std::io::Result<PollerThread>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        PollerThread::start_with_config(name, job, PollerThreadConfig::default())
    }

    /// Start a poller thread running `job` with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an IO Error if the thread failed to start.
    pub fn start_with_config<F>(
        name: &str,
        mut job: F,
        config: PollerThreadConfig,
    ) -> std::io::Result<PollerThread>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        // Using `sync_channel` here as it makes `stop_sender` `Sync` (shareable between
        // threads). Buffer size of 1 should be enough for our use case as we're sending a stop
        // command, and we can simply `try_send()` and ignore if the buffer is full (another
        // thread has sent a stop command already).
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            let update_result = move |value| {
                *result.0.lock().unwrap() = Some(value);
                result.1.notify_all();
            };

            let thread_name = format!("splitio-{name}");
            std::thread::Builder::new().name(thread_name).spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loop {
                    log::debug!(target: "splitio", "running poller job");
                    match job() {
                        Ok(()) => update_result(Ok(())),
                        Err(err @ (Error::Unauthorized | Error::InvalidBaseUrl(_))) => {
                            // Unrecoverable errors
                            update_result(Err(err));
                            return;
                        }
                        Err(err) => {
                            // Other errors are retriable; keep serving the last good data and
                            // try again after the interval. Readiness is not signalled until a
                            // run succeeds.
                            log::warn!(target: "splitio", "poller job failed: {err}");
                        }
                    };

                    let timeout = jitter(config.interval, config.jitter);
                    match stop_receiver.recv_timeout(timeout) {
                        Err(RecvTimeoutError::Timeout) => {
                            // Timed out. Loop back to run the job again.
                        }
                        Ok(()) => {
                            log::debug!(target: "splitio", "poller thread received stop command");
                            // Stop command received, break out of the loop to end the thread.
                            return;
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // When the other end of channel disconnects, calls to
                            // .recv_timeout() return immediately.
                            // Stop the thread.
                            log::debug!(target: "splitio", "poller thread received disconnected");
                            return;
                        }
                    }
                }));

                // If catch_unwind returns Err, it means a panic occurred.
                if outcome.is_err() {
                    // Handle the panic gracefully by updating the result with an error.
                    update_result(Err(Error::PollerThreadPanicked));
                }
            })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Wait for the job's first successful run.
    ///
    /// This method blocks until the poller thread has run the job once successfully (retriable
    /// failures keep it waiting), which for a synchronization poller means the first dataset has
    /// been fetched.
    ///
    /// # Errors
    ///
    /// This method can fail with the following errors:
    ///
    /// - [`Error::PollerThreadPanicked`]
    /// - [`Error::Unauthorized`]
    /// - [`Error::InvalidBaseUrl`]
    pub fn wait_for_ready(&self) -> Result<()> {
        let mut lock = self
            .result
            .0
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => {
                    // The job has already run. Return Ok(()) or a possible error.
                    return result.clone();
                }
                None => {
                    // Block waiting for the first run to settle.
                    lock = self
                        .result
                        .1
                        .wait(lock)
                        .map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }

    /// Stop the poller thread.
    ///
    /// No further run starts after this call. A run already in flight completes and its result
    /// is still applied. This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited) or the channel buffer is
        // full. First case can be ignored as there's nothing useful we can do—thread is already
        // stopped. Second case can be ignored as it indicates that another thread already sent a
        // stop command and the thread will stop anyway.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// If you don't need to wait for the thread to exit, use [`PollerThread::stop`] instead.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the thread has panicked.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        // Error means that the thread has panicked and there's nothing useful we can do in that
        // case.
        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
