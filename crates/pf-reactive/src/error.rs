//! Error types for reactive producers.

use thiserror::Error;

/// Result type for fallible producers.
pub type ReactiveResult<T> = Result<T, ReactiveError>;

/// Failure reported by a producer feeding a [`Fallible`](crate::Fallible) stream.
///
/// Errors never escape the graph: they are consumed by the fallback attached
/// where the fallible stream joins the infallible part of the graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReactiveError {
    /// The producer could not deliver a value.
    #[error("Producer '{source_name}' failed: {what}")]
    Producer { source_name: String, what: String },

    /// An upstream stream terminated.
    #[error("Upstream terminated: {what}")]
    Terminated { what: String },
}

impl ReactiveError {
    pub fn producer(source_name: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Producer {
            source_name: source_name.into(),
            what: what.into(),
        }
    }
}
