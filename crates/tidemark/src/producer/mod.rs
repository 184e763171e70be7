mod generator;
mod task;

pub use generator::*;
pub use task::*;

/// An item tagged with the producer step that generated it.
///
/// The consumer checks the tag against the step it is combining, so producers
/// that drift apart are caught instead of silently misaligning records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamped<T> {
    pub step: u64,
    pub item: T,
}
