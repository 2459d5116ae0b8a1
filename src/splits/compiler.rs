use std::collections::{HashMap, HashSet};

use super::matcher::{CompiledMatcher, Matcher};
use super::models::{Algorithm, Combiner, ConditionWire, MatcherWire, SplitWire};
use crate::Str;

/// A split definition compiled into an executable form: an ordered list of conditions plus the
/// set of segment names the definition references.
///
/// Compiled splits are immutable; updates replace them wholesale in the snapshot.
#[derive(Debug)]
pub(crate) struct CompiledSplit {
    pub seed: i64,
    pub algo: Algorithm,
    pub killed: bool,
    pub default_treatment: Str,
    pub change_number: i64,
    pub conditions: Vec<CompiledCondition>,
    /// Segments referenced by `IN_SEGMENT` matchers, deduplicated. The store syncs only segments
    /// that appear in some compiled split.
    pub referenced_segments: HashSet<Str>,
    pub configurations: HashMap<Str, String>,
}

/// One compiled condition: AND-combined matchers and the partition table applied on match.
#[derive(Debug)]
pub(crate) struct CompiledCondition {
    pub matchers: Vec<CompiledMatcher>,
    pub partitions: Vec<Partition>,
}

impl CompiledCondition {
    /// A condition that never matches. Malformed wire conditions compile to this, pushing
    /// evaluation to the next condition or the split's default treatment.
    fn never() -> CompiledCondition {
        CompiledCondition {
            matchers: vec![CompiledMatcher::never()],
            partitions: Vec::new(),
        }
    }
}

/// A partition with its size clamped to the valid percentage range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Partition {
    pub treatment: Str,
    pub size: u8,
}

/// Compile a wire split into its executable form.
///
/// Compilation never fails: unrecognized matcher kinds and malformed conditions degrade to
/// never-matching pieces so that the rest of the definition keeps working.
pub(crate) fn compile_split(wire: SplitWire) -> CompiledSplit {
    let mut referenced_segments = HashSet::new();

    let conditions = wire
        .conditions
        .into_iter()
        .map(|condition| compile_condition(&wire.name, condition, &mut referenced_segments))
        .collect();

    CompiledSplit {
        seed: wire.seed,
        algo: wire.algo,
        killed: wire.killed,
        default_treatment: wire.default_treatment,
        change_number: wire.change_number,
        conditions,
        referenced_segments,
        configurations: wire.configurations.unwrap_or_default(),
    }
}

fn compile_condition(
    split_name: &Str,
    wire: ConditionWire,
    referenced_segments: &mut HashSet<Str>,
) -> CompiledCondition {
    let Some(group) = wire.matcher_group else {
        log::warn!(target: "splitio", split_name; "condition without matcher group never matches");
        return CompiledCondition::never();
    };

    if group.combiner != Combiner::And {
        // OR and future combiners are representable but unsupported.
        log::warn!(target: "splitio", split_name; "unsupported combiner, condition never matches");
        return CompiledCondition::never();
    }

    if group.matchers.is_empty() || wire.partitions.is_empty() {
        log::warn!(target: "splitio", split_name; "degenerate condition never matches");
        return CompiledCondition::never();
    }

    let matchers = group
        .matchers
        .into_iter()
        .map(|matcher| compile_matcher(split_name, matcher, referenced_segments))
        .collect();

    let partitions = wire
        .partitions
        .into_iter()
        .map(|partition| Partition {
            treatment: partition.treatment,
            size: partition.size.clamp(0, 100) as u8,
        })
        .collect();

    CompiledCondition {
        matchers,
        partitions,
    }
}

fn compile_matcher(
    split_name: &Str,
    wire: MatcherWire,
    referenced_segments: &mut HashSet<Str>,
) -> CompiledMatcher {
    let attribute = wire.key_selector.and_then(|selector| selector.attribute);

    let kind = match wire.matcher_type.as_ref() {
        "ALL_KEYS" => Matcher::AllKeys,

        "WHITELIST" => match wire.whitelist_matcher_data {
            Some(data) => Matcher::Whitelist(data.whitelist.into_iter().collect()),
            None => Matcher::Unsupported,
        },

        "IN_SEGMENT" => match wire.user_defined_segment_matcher_data {
            Some(data) => {
                referenced_segments.insert(data.segment_name.clone());
                Matcher::InSegment(data.segment_name)
            }
            None => Matcher::Unsupported,
        },

        "EQUAL_TO" => match wire.unary_numeric_matcher_data {
            Some(data) => Matcher::EqualTo(data.value),
            None => Matcher::Unsupported,
        },
        "GREATER_THAN_OR_EQUAL_TO" => match wire.unary_numeric_matcher_data {
            Some(data) => Matcher::GreaterThanOrEqualTo(data.value),
            None => Matcher::Unsupported,
        },
        "LESS_THAN_OR_EQUAL_TO" => match wire.unary_numeric_matcher_data {
            Some(data) => Matcher::LessThanOrEqualTo(data.value),
            None => Matcher::Unsupported,
        },
        "BETWEEN" => match wire.between_matcher_data {
            Some(data) => Matcher::Between {
                start: data.start,
                end: data.end,
            },
            None => Matcher::Unsupported,
        },

        "CONTAINS_ANY_OF_SET" => match wire.whitelist_matcher_data {
            Some(data) => Matcher::ContainsAnyOfSet(data.whitelist),
            None => Matcher::Unsupported,
        },
        "CONTAINS_ALL_OF_SET" => match wire.whitelist_matcher_data {
            Some(data) => Matcher::ContainsAllOfSet(data.whitelist),
            None => Matcher::Unsupported,
        },
        "STARTS_WITH" => match wire.whitelist_matcher_data {
            Some(data) => Matcher::StartsWith(data.whitelist),
            None => Matcher::Unsupported,
        },
        "ENDS_WITH" => match wire.whitelist_matcher_data {
            Some(data) => Matcher::EndsWith(data.whitelist),
            None => Matcher::Unsupported,
        },

        other => {
            log::debug!(target: "splitio", split_name, matcher_type = other; "unrecognized matcher kind never matches");
            Matcher::Unsupported
        }
    };

    CompiledMatcher {
        kind,
        negate: wire.negate,
        attribute,
    }
}
