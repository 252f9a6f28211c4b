//! Domain error model.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing references, settlement rules). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A request failed field-level validation. Nothing was applied.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced customer, account, package or purchase does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The account balance does not cover the package price.
    #[error("{0}")]
    InsufficientFunds(String),

    /// The package is currently not purchasable.
    #[error("{0}")]
    PurchaseNotPossible(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn not_found(entity: &str, id: impl core::fmt::Display) -> Self {
        Self::NotFound(format!("No {entity} found with this id: {id}"))
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    pub fn purchase_not_possible(msg: impl Into<String>) -> Self {
        Self::PurchaseNotPossible(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Single-field validation failure.
    pub fn validation(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, code, message))
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(value: validator::ValidationErrors) -> Self {
        Self::Validation(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = DomainError::not_found("account", "abc");
        assert_eq!(err.to_string(), "No account found with this id: abc");
    }

    #[test]
    fn validation_error_display_lists_fields() {
        let err = DomainError::validation("email", "email", "must be a well-formed email address");
        assert_eq!(
            err.to_string(),
            "validation failed: email must be a well-formed email address"
        );
    }
}
