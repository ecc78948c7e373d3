//! Errors raised by domain types themselves.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures of the domain model.
///
/// Storage, queue and provider failures are owned by the layers that talk to them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The folder tree or another structural rule does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A string could not be parsed into the named identifier type.
    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },

    /// A stored status or search method has no matching variant.
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl DomainError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(kind: &'static str, reason: impl ToString) -> Self {
        Self::InvalidId {
            kind,
            reason: reason.to_string(),
        }
    }

    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
