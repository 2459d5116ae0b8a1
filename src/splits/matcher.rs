use std::collections::HashSet;

use crate::{eval::Key, snapshot::Snapshot, Attributes, Str};

/// A compiled matcher kind plus the data it was parameterized with.
///
/// The wire tag is open-ended; anything this SDK does not recognize lands in `Unsupported`, the
/// explicit default arm that never matches.
#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    AllKeys,
    Whitelist(HashSet<Str>),
    InSegment(Str),
    EqualTo(f64),
    GreaterThanOrEqualTo(f64),
    LessThanOrEqualTo(f64),
    Between { start: f64, end: f64 },
    ContainsAnyOfSet(Vec<Str>),
    ContainsAllOfSet(Vec<Str>),
    StartsWith(Vec<Str>),
    EndsWith(Vec<Str>),
    Unsupported,
}

/// A matcher ready for evaluation: the kind, the negate flag, and which value it reads (the
/// matching key itself, or a named attribute).
#[derive(Debug, Clone)]
pub(crate) struct CompiledMatcher {
    pub kind: Matcher,
    pub negate: bool,
    pub attribute: Option<Str>,
}

impl CompiledMatcher {
    /// A matcher that never matches, used for malformed or unrecognized definitions.
    pub(crate) fn never() -> CompiledMatcher {
        CompiledMatcher {
            kind: Matcher::Unsupported,
            negate: false,
            attribute: None,
        }
    }

    /// Evaluate the matcher against the given key and attributes.
    ///
    /// This is the fail-safe boundary of the engine: an unsupported kind, a missing attribute, or
    /// a type mismatch evaluates to `false` (even under `negate`) instead of surfacing an error,
    /// so the evaluator can fall through to the next condition or the split's default treatment.
    pub(crate) fn eval(&self, key: &Key, attributes: &Attributes, snapshot: &Snapshot) -> bool {
        match self.try_eval(key, attributes, snapshot) {
            Some(outcome) => outcome != self.negate,
            // Indeterminate results stay false regardless of negation.
            None => false,
        }
    }

    fn try_eval(&self, key: &Key, attributes: &Attributes, snapshot: &Snapshot) -> Option<bool> {
        match &self.kind {
            Matcher::AllKeys => Some(true),

            Matcher::Whitelist(whitelist) => {
                let value = self.string_value(key, attributes)?;
                Some(whitelist.contains(value))
            }

            // Membership always tests the matching key. A segment absent from the snapshot is
            // treated as empty, not as an error.
            Matcher::InSegment(segment_name) => Some(
                snapshot
                    .segment(segment_name)
                    .is_some_and(|segment| segment.contains(key.matching())),
            ),

            Matcher::EqualTo(expected) => {
                let value = self.number_value(key, attributes)?;
                Some(value == *expected)
            }
            Matcher::GreaterThanOrEqualTo(limit) => {
                let value = self.number_value(key, attributes)?;
                Some(value >= *limit)
            }
            Matcher::LessThanOrEqualTo(limit) => {
                let value = self.number_value(key, attributes)?;
                Some(value <= *limit)
            }
            Matcher::Between { start, end } => {
                let value = self.number_value(key, attributes)?;
                Some(*start <= value && value <= *end)
            }

            Matcher::ContainsAnyOfSet(candidates) => {
                let values = self.list_value(attributes)?;
                Some(
                    candidates
                        .iter()
                        .any(|c| values.iter().any(|v| v == c.as_ref())),
                )
            }
            Matcher::ContainsAllOfSet(candidates) => {
                let values = self.list_value(attributes)?;
                Some(
                    candidates
                        .iter()
                        .all(|c| values.iter().any(|v| v == c.as_ref())),
                )
            }

            Matcher::StartsWith(prefixes) => {
                let value = self.string_value(key, attributes)?;
                Some(prefixes.iter().any(|p| value.starts_with(p.as_ref())))
            }
            Matcher::EndsWith(suffixes) => {
                let value = self.string_value(key, attributes)?;
                Some(suffixes.iter().any(|s| value.ends_with(s.as_ref())))
            }

            Matcher::Unsupported => None,
        }
    }

    fn string_value<'a>(&self, key: &'a Key, attributes: &'a Attributes) -> Option<&'a str> {
        match &self.attribute {
            None => Some(key.matching()),
            Some(attribute) => attributes.get(attribute.as_ref())?.as_str(),
        }
    }

    fn number_value(&self, key: &Key, attributes: &Attributes) -> Option<f64> {
        match &self.attribute {
            None => key.matching().parse().ok(),
            Some(attribute) => attributes.get(attribute.as_ref())?.as_number(),
        }
    }

    fn list_value<'a>(&self, attributes: &'a Attributes) -> Option<&'a [String]> {
        let attribute = self.attribute.as_ref()?;
        attributes.get(attribute.as_ref())?.as_list()
    }
}
