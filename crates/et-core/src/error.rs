//! # AppError
//!
//! Centralized error handling for the EventThreads core.
//! Every failed precondition surfaces as one of these kinds and aborts the
//! operation before any state is committed.

use thiserror::Error;

/// The primary error type for all et-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Resource not found, or a thread that has already expired
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., blank title, unsupported duration)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Role or ownership check failed (e.g., non-creator editing a thread)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Membership state machine precondition violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure inside a store or provider
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn thread_not_found(id: impl ToString) -> Self {
        AppError::NotFound("Thread".to_string(), id.to_string())
    }

    pub fn user_not_found(id: impl ToString) -> Self {
        AppError::NotFound("User".to_string(), id.to_string())
    }
}

/// A specialized Result type for EventThreads logic.
pub type Result<T> = std::result::Result<T, AppError>;
