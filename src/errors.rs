use chrono::NaiveDate;
use sea_orm::error::DbErr;
use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::models::causation::SourceDocumentKind;

/// Coarse error taxonomy exposed to callers of the ledger core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidRange,
    InvariantViolation,
    HasLedgerDependencies,
    ExternalServiceFailure,
    Conflict,
    Forbidden,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Lot not found: {0}")]
    LotNotFound(i32),

    #[error("{kind} {id} not found")]
    DocumentNotFound { kind: SourceDocumentKind, id: i32 },

    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Resulting stock for product {product_id} would be zero; weighted cost is undefined")]
    ZeroResultingStock { product_id: String },

    #[error("{kind} {id} has {count} warehouse transaction(s) and cannot be deleted")]
    HasLedgerDependencies {
        kind: SourceDocumentKind,
        id: i32,
        count: usize,
    },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Operation disabled: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Helper for `.map_err(ServiceError::db_error)` at query sites.
    pub fn db_error(error: impl Into<DbErr>) -> Self {
        ServiceError::DatabaseError(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::ProductNotFound(_)
            | ServiceError::LotNotFound(_)
            | ServiceError::DocumentNotFound { .. } => ErrorKind::NotFound,
            ServiceError::InvalidRange { .. } => ErrorKind::InvalidRange,
            ServiceError::InvariantViolation(_)
            | ServiceError::ZeroResultingStock { .. }
            | ServiceError::ValidationError(_) => ErrorKind::InvariantViolation,
            ServiceError::HasLedgerDependencies { .. } => ErrorKind::HasLedgerDependencies,
            ServiceError::ExternalServiceError(_) => ErrorKind::ExternalServiceFailure,
            ServiceError::ConcurrentModification(_) => ErrorKind::Conflict,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::DatabaseError(_)
            | ServiceError::InternalError(_)
            | ServiceError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Conflicts are the only failures worth replaying from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrentModification(_))
    }
}
