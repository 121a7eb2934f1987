//! Storage abstraction for kinnect.
//!
//! Backend crates (e.g., kinnect-store-sqlite) implement [`Store`] so the
//! workflow engine doesn't depend on any specific database engine or schema.
//! The engine only needs atomic single-row reads, conditional single-row
//! writes, and equality lookups.

mod store;
mod types;

pub use store::*;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result of a conditional state update.
///
/// `Applied` carries the row exactly as the update left it. `Unchanged`
/// carries the current row when the guard rejected the write (the record
/// was already past the state the caller expected).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition<T> {
    Applied(T),
    Unchanged(T),
}

impl<T> Transition<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Transition::Applied(t) | Transition::Unchanged(t) => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        assert_eq!(StoreError::NotFound.to_string(), "not found");
        assert_eq!(StoreError::AlreadyExists.to_string(), "already exists");
        assert_eq!(
            StoreError::Backend("disk full".into()).to_string(),
            "backend error: disk full"
        );
    }

    #[test]
    fn transition_accessors() {
        let applied = Transition::Applied(7);
        assert!(applied.is_applied());
        assert_eq!(applied.into_inner(), 7);

        let unchanged = Transition::Unchanged("x");
        assert!(!unchanged.is_applied());
        assert_eq!(unchanged.into_inner(), "x");
    }
}
