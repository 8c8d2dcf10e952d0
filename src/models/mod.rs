//! Domain records fetched from the review API.
//!
//! Everything here is tolerant of partial payloads: missing metadata,
//! missing annotations and malformed timestamps all decode to "no value"
//! rather than failing the whole response.

mod annotation;
mod id;
mod queue;
mod run;
mod timestamp;

pub use annotation::{Annotation, Judgement};
pub use id::{QueueId, RecordId, RunId};
pub use queue::{FilterData, NamedRef, QueueDetail, QueueSummary, QueuesListing};
pub use run::Run;
pub use timestamp::parse_timestamp;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Error returned when parsing one of the closed string enums
/// (judgements, filter values, sort keys).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'. Must be one of: {expected}")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl ParseValueError {
    pub(crate) fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected,
        }
    }
}

/// Decode `null` the same way as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
