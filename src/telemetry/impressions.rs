use serde::Serialize;

use crate::eval::Label;
use crate::splits::Timestamp;
use crate::Str;

/// A record of one evaluation outcome, queued for batched reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    /// Name of the evaluated split.
    pub feature: Str,
    /// The matching key the treatment was computed for.
    pub key_name: Str,
    /// The bucketing key, when it differed from the matching key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucketing_key: Option<Str>,
    /// The treatment returned to the caller.
    pub treatment: Str,
    /// Diagnostic reason code for the result.
    pub label: Label,
    /// Change number of the definition that produced the result, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_number: Option<i64>,
    /// When the evaluation happened.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: Timestamp,
}
