//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, invariants, stock rules).
/// Storage and transaction failures live in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. a non-positive reservation amount).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A state transition would break a record invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The targeted record does not exist.
    #[error("not found")]
    NotFound,

    /// The operation collides with existing state (duplicate key, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Not enough stock to satisfy a decrease or a reservation.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A release asked for more units than are currently reserved.
    #[error("invalid release: requested {requested}, reserved {reserved}")]
    InvalidRelease { requested: i64, reserved: i64 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invalid_release(requested: i64, reserved: i64) -> Self {
        Self::InvalidRelease {
            requested,
            reserved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_errors_render_amounts() {
        let err = DomainError::insufficient_stock(21, 20);
        assert_eq!(err.to_string(), "insufficient stock: requested 21, available 20");

        let err = DomainError::invalid_release(15, 10);
        assert_eq!(err.to_string(), "invalid release: requested 15, reserved 10");
    }
}
