//! Treatment evaluation.
mod deferred;
mod eval_treatment;
mod evaluator;
mod key;

pub use deferred::MaybeDeferred;
pub use eval_treatment::{get_treatment, get_treatments, Evaluation, Label, CONTROL};
pub use evaluator::Evaluator;
pub use key::Key;
