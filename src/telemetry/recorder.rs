//! An HTTP client that delivers impression, event, and metric batches to the events endpoint.
use std::collections::HashMap;

use reqwest::{header, Url};
use serde::Serialize;

use crate::{Error, Result, Str};

use super::{Event, Impression};

pub struct RecorderConfig {
    pub events_base_url: String,
    pub sdk_key: String,
}

pub const DEFAULT_EVENTS_BASE_URL: &str = "https://events.split.io/api";

const IMPRESSIONS_ENDPOINT: &str = "/testImpressions/bulk";
const EVENTS_ENDPOINT: &str = "/events/bulk";
const LATENCIES_ENDPOINT: &str = "/metrics/times";
const COUNTERS_ENDPOINT: &str = "/metrics/counters";

#[derive(Debug, Serialize)]
struct LatenciesDto<'a> {
    name: &'a Str,
    latencies: &'a [u64],
}

#[derive(Debug, Serialize)]
struct CounterDto<'a> {
    name: &'a Str,
    delta: u64,
}

/// A client that pushes telemetry batches. Delivery is fire-and-forget from the aggregator's
/// point of view: callers drop the batch whether or not the push succeeded.
pub struct Recorder {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Recorder {
        Recorder {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }

    pub fn post_impressions(&self, batch: &[Impression]) -> Result<()> {
        self.post_json(IMPRESSIONS_ENDPOINT, &batch)
    }

    pub fn post_events(&self, batch: &[Event]) -> Result<()> {
        self.post_json(EVENTS_ENDPOINT, &batch)
    }

    pub fn post_latencies(&self, latencies: &HashMap<Str, Vec<u64>>) -> Result<()> {
        let body: Vec<LatenciesDto> = latencies
            .iter()
            .map(|(name, latencies)| LatenciesDto {
                name,
                latencies: latencies.as_slice(),
            })
            .collect();
        self.post_json(LATENCIES_ENDPOINT, &body)
    }

    pub fn post_counters(&self, counters: &HashMap<Str, u64>) -> Result<()> {
        let body: Vec<CounterDto> = counters
            .iter()
            .map(|(name, delta)| CounterDto {
                name,
                delta: *delta,
            })
            .collect();
        self.post_json(COUNTERS_ENDPOINT, &body)
    }

    fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<()> {
        let url = Url::parse(&format!("{}{}", self.config.events_base_url, endpoint))
            .map_err(Error::InvalidBaseUrl)?;

        self.client
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.sdk_key),
            )
            .json(body)
            .send()?
            .error_for_status()?;

        Ok(())
    }
}
