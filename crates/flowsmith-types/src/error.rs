use thiserror::Error;

/// Errors from mutating an `ExecutionState`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("output for node '{0}' was already recorded")]
    OutputAlreadyRecorded(String),
}
