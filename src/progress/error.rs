// src/progress/error.rs

use thiserror::Error;

/// Errors raised while merging an event into a progress record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Maximum attempts ({max_attempts}) reached for quiz {quiz_id}")]
    AttemptsExceeded { quiz_id: i64, max_attempts: i32 },

    #[error("{0}")]
    Validation(String),
}
