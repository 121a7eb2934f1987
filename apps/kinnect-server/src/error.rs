//! Errors surfaced by workflow operations.
//!
//! Ordinary consent outcomes (already responded, not a participant, invalid
//! magic link) are not errors. They are variants of each operation's return
//! type. Only lookups of missing records, rejected input and storage failures
//! end up here.

use kinnect_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Map a store lookup so that `NotFound` names the missing record.
pub(crate) trait NotFoundAs<T> {
    fn not_found_as(self, what: &'static str) -> Result<T, EngineError>;
}

impl<T> NotFoundAs<T> for Result<T, StoreError> {
    fn not_found_as(self, what: &'static str) -> Result<T, EngineError> {
        self.map_err(|e| match e {
            StoreError::NotFound => EngineError::NotFound(what),
            other => EngineError::Store(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_record() {
        let res: Result<(), StoreError> = Err(StoreError::NotFound);
        let err = res.not_found_as("referral").unwrap_err();
        assert_eq!(err.to_string(), "referral not found");
    }

    #[test]
    fn other_store_errors_pass_through() {
        let res: Result<(), StoreError> = Err(StoreError::Backend("locked".into()));
        let err = res.not_found_as("referral").unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
    }
}
