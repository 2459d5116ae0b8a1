use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Str;

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Cursor value meaning "never synchronized".
pub const NEVER_SYNCED: i64 = -1;

/// Response format of the `/splitChanges` endpoint: the delta of split definitions between the
/// `since` cursor the caller sent and the `till` cursor the server reached.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SplitChanges {
    pub since: i64,
    pub till: i64,
    /// Changed split definitions. Archived splits are delivered here too; they carry
    /// `status: ARCHIVED` and must be removed from the local snapshot.
    ///
    /// Values are wrapped in `TryParse` so that if we fail to parse one split (e.g., new server
    /// format), we can still apply the rest of the delta.
    #[serde(default)]
    pub splits: Vec<TryParse<SplitWire>>,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// This can be helpful to isolate errors in a subtree. e.g., if one split in a delta parses, the
/// rest of the delta is still usable.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}
impl<T> From<TryParse<T>> for Result<T, serde_json::Value> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Ok(v),
            TryParse::ParseFailed(v) => Err(v),
        }
    }
}
impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}
impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A split definition as served by the remote authority.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SplitWire {
    pub name: Str,
    #[serde(default)]
    pub traffic_type_name: Option<Str>,
    pub seed: i64,
    /// Hashing algorithm used for traffic allocation.
    #[serde(default)]
    pub algo: Algorithm,
    #[serde(default)]
    pub killed: bool,
    pub default_treatment: Str,
    pub status: Status,
    pub change_number: i64,
    #[serde(default)]
    pub conditions: Vec<ConditionWire>,
    /// Per-treatment configuration payloads (raw JSON strings), attached to results on request.
    #[serde(default)]
    pub configurations: Option<HashMap<Str, String>>,
}

/// Traffic-allocation hashing algorithm identifier.
///
/// The wire value is a number; unknown identifiers fall back to the legacy algorithm rather than
/// failing the split, matching how absent values were treated before the field existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Legacy,
    Murmur3,
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<u64>::deserialize(deserializer)?;
        Ok(match value {
            Some(2) => Algorithm::Murmur3,
            _ => Algorithm::Legacy,
        })
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(match self {
            Algorithm::Legacy => 1,
            Algorithm::Murmur3 => 2,
        })
    }
}

/// Lifecycle status of a split definition.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Active,
    Archived,
    /// Unrecognized status. Treated the same as archived: the split is dropped from the snapshot.
    #[serde(other)]
    Unknown,
}

/// One rule of a split: a matcher group and the traffic partitions applied when it matches.
///
/// Conditions are evaluated in list order and the first fully-satisfied condition wins, so order
/// must be preserved end to end.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConditionWire {
    #[serde(default)]
    pub matcher_group: Option<MatcherGroupWire>,
    #[serde(default)]
    pub partitions: Vec<PartitionWire>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MatcherGroupWire {
    pub combiner: Combiner,
    #[serde(default)]
    pub matchers: Vec<MatcherWire>,
}

/// How matchers within a group combine.
///
/// Only `AND` is interpreted today. The field is kept open so future combiners stay representable;
/// a group with an unrecognized combiner never matches.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Combiner {
    And,
    #[serde(other)]
    Other,
}

/// A single matcher as served by the remote authority.
///
/// `matcher_type` is an open-ended tag: kinds this SDK does not recognize must compile to a
/// matcher that never matches, not to an error.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MatcherWire {
    #[serde(default)]
    pub key_selector: Option<KeySelectorWire>,
    pub matcher_type: Str,
    #[serde(default)]
    pub negate: bool,
    #[serde(default)]
    pub whitelist_matcher_data: Option<WhitelistData>,
    #[serde(default)]
    pub user_defined_segment_matcher_data: Option<SegmentData>,
    #[serde(default)]
    pub unary_numeric_matcher_data: Option<UnaryNumericData>,
    #[serde(default)]
    pub between_matcher_data: Option<BetweenData>,
}

/// Selects the value a matcher reads: the matching key itself (no attribute), or a named
/// attribute from the caller-supplied attribute mapping.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct KeySelectorWire {
    #[serde(default)]
    pub traffic_type: Option<Str>,
    #[serde(default)]
    pub attribute: Option<Str>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct WhitelistData {
    #[serde(default)]
    pub whitelist: Vec<Str>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SegmentData {
    pub segment_name: Str,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct UnaryNumericData {
    pub data_type: DataType,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct BetweenData {
    pub data_type: DataType,
    pub start: f64,
    pub end: f64,
}

/// Value type of a comparison matcher. Datetime values are epoch milliseconds and compare
/// numerically.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum DataType {
    Number,
    Datetime,
}

/// One traffic partition: a treatment and the percentage of the bucket space it owns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PartitionWire {
    pub treatment: Str,
    pub size: i64,
}

/// Response format of the `/segmentChanges/{name}` endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SegmentChanges {
    pub name: Str,
    pub since: i64,
    pub till: i64,
    #[serde(default)]
    pub added: Vec<Str>,
    #[serde(default)]
    pub removed: Vec<Str>,
}

/// Response format of the `/mySegments/{key}` endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[allow(missing_docs)]
pub struct MySegmentsResponse {
    #[serde(rename = "mySegments")]
    pub my_segments: Vec<MySegmentWire>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[allow(missing_docs)]
pub struct MySegmentWire {
    pub name: Str,
}
