use std::time::Duration;

use crate::change_fetcher::DEFAULT_BASE_URL;
use crate::telemetry::DEFAULT_EVENTS_BASE_URL;
use crate::SplitClient;

/// Configuration for [`SplitClient`].
///
/// # Examples
/// ```
/// # use splitio::ClientConfig;
/// let client = ClientConfig::from_sdk_key("sdk-key").to_client();
/// ```
pub struct ClientConfig {
    pub(crate) sdk_key: String,
    pub(crate) base_url: String,
    pub(crate) events_base_url: String,
    pub(crate) features_refresh: Duration,
    pub(crate) impressions_refresh: Duration,
    pub(crate) metrics_refresh: Duration,
}

impl ClientConfig {
    /// Default base URL for dataset fetches.
    pub const DEFAULT_BASE_URL: &'static str = DEFAULT_BASE_URL;
    /// Default base URL for impression/event/metric delivery.
    pub const DEFAULT_EVENTS_BASE_URL: &'static str = DEFAULT_EVENTS_BASE_URL;

    /// How often the dataset is refreshed by default.
    pub const DEFAULT_FEATURES_REFRESH: Duration = Duration::from_secs(30);
    /// How often impressions and events are flushed by default.
    pub const DEFAULT_IMPRESSIONS_REFRESH: Duration = Duration::from_secs(60);
    /// How often metrics are flushed by default.
    pub const DEFAULT_METRICS_REFRESH: Duration = Duration::from_secs(60);

    /// Create a default configuration using the specified SDK key.
    ///
    /// ```
    /// # use splitio::ClientConfig;
    /// ClientConfig::from_sdk_key("sdk-key");
    /// ```
    pub fn from_sdk_key(sdk_key: impl Into<String>) -> Self {
        ClientConfig {
            sdk_key: sdk_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            events_base_url: Self::DEFAULT_EVENTS_BASE_URL.to_owned(),
            features_refresh: Self::DEFAULT_FEATURES_REFRESH,
            impressions_refresh: Self::DEFAULT_IMPRESSIONS_REFRESH,
            metrics_refresh: Self::DEFAULT_METRICS_REFRESH,
        }
    }

    /// Override base URL for dataset fetches. Clients should use the default setting in most
    /// cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override base URL for telemetry delivery. Clients should use the default setting in most
    /// cases.
    pub fn events_base_url(mut self, events_base_url: impl Into<String>) -> Self {
        self.events_base_url = events_base_url.into();
        self
    }

    /// Override how often the dataset is refreshed.
    pub fn features_refresh(mut self, interval: Duration) -> Self {
        self.features_refresh = interval;
        self
    }

    /// Override how often impressions and events are flushed.
    pub fn impressions_refresh(mut self, interval: Duration) -> Self {
        self.impressions_refresh = interval;
        self
    }

    /// Override how often metrics are flushed.
    pub fn metrics_refresh(mut self, interval: Duration) -> Self {
        self.metrics_refresh = interval;
        self
    }

    /// Create a new [`SplitClient`] using the specified configuration.
    ///
    /// ```
    /// # use splitio::{ClientConfig, SplitClient};
    /// let client: SplitClient = ClientConfig::from_sdk_key("sdk-key").to_client();
    /// ```
    pub fn to_client(self) -> SplitClient {
        SplitClient::new(self)
    }
}
