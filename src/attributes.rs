use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Type alias for a HashMap representing key-value pairs of attributes.
///
/// Keys are strings representing attribute names.
///
/// # Examples
/// ```
/// # use splitio::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("username".to_owned(), "john_doe".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, AttributeValue>;

/// Enum representing possible values of an attribute supplied at evaluation time.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, `bool`, and
/// `Vec<String>` types.
#[derive(Debug, Serialize, Deserialize, PartialEq, PartialOrd, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value. Datetime attributes are numbers holding epoch milliseconds.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A list of strings, used by the set matchers.
    List(Vec<String>),
    /// A null value or absence of value.
    Null,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        if let AttributeValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Extract a numeric value. Numeric strings are accepted as numbers, so hosts that only have
    /// string attributes (e.g., parsed query parameters) can still use comparison matchers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        if let AttributeValue::List(values) = self {
            Some(values)
        } else {
            None
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
