use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::splits::Timestamp;
use crate::{AttributeValue, Str};

/// A `track` call queued for batched reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type_id: Str,
    pub traffic_type_name: Str,
    pub key: Str,
    /// Optional numeric value. Serialized as `null` when absent so the backend can tell "no
    /// value" apart from zero.
    pub value: Option<f64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, AttributeValue>>,
}

const MAX_KEY_LENGTH: usize = 250;

fn event_type_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][-_.:a-zA-Z0-9]{0,79}$").expect("event type regex is valid")
    })
}

/// Validate `track` arguments. Invalid input is reported to the caller as `false` with no side
/// effects, never as an error.
pub(crate) fn validate_track(
    key: &str,
    traffic_type: &str,
    event_type: &str,
    value: Option<f64>,
) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        log::warn!(target: "splitio", "track: key must be a non-empty string of at most {MAX_KEY_LENGTH} characters");
        return false;
    }
    if traffic_type.is_empty() {
        log::warn!(target: "splitio", "track: traffic_type must be a non-empty string");
        return false;
    }
    if !event_type_regex().is_match(event_type) {
        log::warn!(target: "splitio",
                   event_type;
                   "track: event_type must start with a letter or number and contain up to 80 letters, numbers, hyphens, underscores, periods, or colons");
        return false;
    }
    if value.is_some_and(|value| !value.is_finite()) {
        log::warn!(target: "splitio", "track: value must be a finite number when present");
        return false;
    }
    true
}
