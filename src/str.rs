//! Some string type helpers.
//!
//! Moved into a separate module, so we could experiment with different representations.

use std::borrow::Borrow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// `Str` is a string that can be cloned cheaply.
///
/// Split names, treatments, and segment names are shared between the snapshot, impressions, and
/// evaluation results, so cloning them must not copy the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Str(Arc<str>);

impl std::fmt::Display for Str {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<T: Into<Arc<str>>> From<T> for Str {
    fn from(value: T) -> Str {
        Str(value.into())
    }
}

impl AsRef<str> for Str {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Str {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Str {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl log::kv::ToValue for Str {
    fn to_value(&self) -> log::kv::Value {
        log::kv::Value::from_display(self)
    }
}
