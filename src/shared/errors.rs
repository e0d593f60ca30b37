//! Error taxonomy shared by every layer.

use thiserror::Error;

use crate::domain::booking::BookingStatus;

/// Stable, client-visible classification of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    InvalidTransition,
    Store,
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Conflict => "ConflictError",
            Self::NotFound => "NotFoundError",
            Self::InvalidTransition => "InvalidTransition",
            Self::Store => "StoreError",
            Self::DeadlineExceeded => "DeadlineExceeded",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Store error: {0}")]
    Store(String),

    /// The operation ran out of time. A write may or may not have been applied.
    #[error("Deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),
}

impl DomainError {
    pub fn booking_not_found(id: i32) -> Self {
        Self::NotFound {
            entity: "Booking",
            field: "id",
            value: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Store(_) => ErrorKind::Store,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried. An exceeded deadline is not:
    /// the time budget is spent and a write may already have landed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Store(e.to_string())
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
