//! An HTTP client that fetches split and segment deltas from the server.
use reqwest::{header, StatusCode, Url};

use crate::splits::{MySegmentsResponse, SegmentChanges, SplitChanges};
use crate::{Error, Result, Str};

pub struct ChangeFetcherConfig {
    pub base_url: String,
    pub sdk_key: String,
    /// SDK name. Usually, language name.
    pub sdk_name: String,
    /// Version of SDK.
    pub sdk_version: String,
}

pub const DEFAULT_BASE_URL: &str = "https://sdk.split.io/api";

const SPLIT_CHANGES_ENDPOINT: &str = "/splitChanges";
const SEGMENT_CHANGES_ENDPOINT: &str = "/segmentChanges";
const MY_SEGMENTS_ENDPOINT: &str = "/mySegments";

/// A client that fetches dataset deltas from the server.
///
/// Every fetch takes a `since` cursor and returns the changes up to the server's `till` cursor,
/// so repeated calls transfer only what changed.
pub struct ChangeFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: ChangeFetcherConfig,
    /// If we receive a 401 Unauthorized error during a request, it means the SDK key is not
    /// valid. We cache this error so we don't issue additional requests to the server.
    unauthorized: bool,
}

impl ChangeFetcher {
    pub fn new(config: ChangeFetcherConfig) -> ChangeFetcher {
        let client = reqwest::blocking::Client::new();

        ChangeFetcher {
            client,
            config,
            unauthorized: false,
        }
    }

    /// Fetch the split definitions changed since the given cursor.
    pub fn fetch_split_changes(&mut self, since: i64) -> Result<SplitChanges> {
        let url = self.url(SPLIT_CHANGES_ENDPOINT, &[("since", since.to_string())])?;
        log::debug!(target: "splitio", since; "fetching split changes");
        self.get_json(url)
    }

    /// Fetch the membership delta of one segment since the given cursor.
    pub fn fetch_segment_changes(&mut self, segment_name: &str, since: i64) -> Result<SegmentChanges> {
        let url = self.url(
            &format!("{SEGMENT_CHANGES_ENDPOINT}/{segment_name}"),
            &[("since", since.to_string())],
        )?;
        log::debug!(target: "splitio", segment_name, since; "fetching segment changes");
        self.get_json(url)
    }

    /// Fetch the names of all segments the given key belongs to. Used for client-side,
    /// single-key segment resolution.
    pub fn fetch_my_segments(&mut self, user_key: &str) -> Result<Vec<Str>> {
        let url = self.url(&format!("{MY_SEGMENTS_ENDPOINT}/{user_key}"), &[])?;
        log::debug!(target: "splitio", user_key; "fetching my segments");
        let response: MySegmentsResponse = self.get_json(url)?;
        Ok(response
            .my_segments
            .into_iter()
            .map(|segment| segment.name)
            .collect())
    }

    fn url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut params: Vec<(&str, &str)> = params
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        params.push(("sdkName", &self.config.sdk_name));
        params.push(("sdkVersion", &self.config.sdk_version));

        Url::parse_with_params(&format!("{}{}", self.config.base_url, endpoint), params)
            .map_err(Error::InvalidBaseUrl)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&mut self, url: Url) -> Result<T> {
        if self.unauthorized {
            return Err(Error::Unauthorized);
        }

        let response = self
            .client
            .get(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.sdk_key),
            )
            .send()?;

        let response = response.error_for_status().map_err(|err| {
            if err.status() == Some(StatusCode::UNAUTHORIZED) {
                log::warn!(target: "splitio", "client is not authorized. Check your SDK key");
                self.unauthorized = true;
                Error::Unauthorized
            } else {
                log::warn!(target: "splitio", "received non-200 response while fetching changes: {:?}", err);
                Error::from(err)
            }
        })?;

        let changes = response.json()?;

        log::debug!(target: "splitio", "successfully fetched changes");

        Ok(changes)
    }
}
