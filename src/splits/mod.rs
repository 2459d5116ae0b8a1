//! Split definitions: wire model, matcher library, and compiler.
pub(crate) mod compiler;
pub(crate) mod matcher;
mod models;

pub use models::*;
