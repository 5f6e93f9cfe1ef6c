//! Store error types.
//!
//! Defined in `studytrack-core` so the engine and every backend share one
//! taxonomy, and callers can classify failures for retry decisions without
//! string matching.

use thiserror::Error;

/// Errors that can occur when reading or writing a student profile.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The student id is empty, too long, or not safe to use as a document key.
    #[error("invalid student id: {0:?}")]
    InvalidStudentId(String),

    /// A mutation tried to shrink or rewrite append-only profile state.
    #[error("profile update rejected for '{student_id}': {reason}")]
    Rejected { student_id: String, reason: String },

    /// Optimistic commits kept losing to concurrent writers.
    #[error("write conflict on '{student_id}' after {attempts} attempts")]
    Conflict { student_id: String, attempts: u32 },

    /// A persisted document could not be decoded into a profile.
    #[error("corrupt profile document '{student_id}': {source}")]
    Corrupt {
        student_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Profile could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is not reachable or not initialized.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Unavailable(_))
    }

    pub fn rejected(student_id: &str, reason: impl Into<String>) -> Self {
        StoreError::Rejected {
            student_id: student_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(StoreError::Conflict {
            student_id: "s".into(),
            attempts: 3
        }
        .is_retryable());
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(!StoreError::InvalidStudentId(String::new()).is_retryable());
        assert!(!StoreError::rejected("s", "xp decreased").is_retryable());
    }

    #[test]
    fn conflict_message_names_student() {
        let err = StoreError::Conflict {
            student_id: "alice".into(),
            attempts: 5,
        };
        assert_eq!(err.to_string(), "write conflict on 'alice' after 5 attempts");
    }
}
