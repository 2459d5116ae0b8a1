use crate::Str;

/// The identity a treatment is computed for.
///
/// The matching key is used for membership checks (whitelists, segments) and impression
/// reporting; the bucketing key feeds the hash-based traffic allocation. When no bucketing key is
/// given, the matching key is used for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    matching: Str,
    bucketing: Option<Str>,
}

impl Key {
    pub fn new(matching: impl Into<Str>) -> Key {
        Key {
            matching: matching.into(),
            bucketing: None,
        }
    }

    pub fn with_bucketing(matching: impl Into<Str>, bucketing: impl Into<Str>) -> Key {
        Key {
            matching: matching.into(),
            bucketing: Some(bucketing.into()),
        }
    }

    pub fn matching(&self) -> &str {
        &self.matching
    }

    /// The key used for hashing; defaults to the matching key.
    pub fn bucketing(&self) -> &str {
        self.bucketing.as_deref().unwrap_or(&self.matching)
    }

    pub(crate) fn matching_str(&self) -> &Str {
        &self.matching
    }

    pub(crate) fn bucketing_str(&self) -> Option<&Str> {
        self.bucketing.as_ref()
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Key {
        Key::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Key {
        Key::new(value)
    }
}

impl From<Str> for Key {
    fn from(value: Str) -> Key {
        Key::new(value)
    }
}
