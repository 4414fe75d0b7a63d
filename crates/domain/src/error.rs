//! Domain error types.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::InventoryError;
use crate::ordering::OrderError;
use crate::ports::RepositoryError;

/// Per-field validation messages collected before an operation is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection holding a single field message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Records a message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Merges another collection as is.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    /// Merges another collection, prefixing its field names.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.fields {
            let key = format!("{prefix}.{field}");
            self.fields.entry(key).or_default().extend(messages);
        }
    }

    /// Returns true if no field has a message.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the messages keyed by field name.
    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// Returns `Ok(())` when empty, otherwise the collected errors.
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request conflicts with existing state (duplicates, stale state).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The requester is authenticated but not allowed to perform the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Email/password did not match an active account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An inventory invariant would be violated.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// An error occurred in the repository backend.
    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    /// Password hashing failed.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a validation error on a single field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => DomainError::Conflict(msg),
            other => DomainError::Repository(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "must not be empty");
        errors.add("email", "must contain an @ symbol");
        errors.add("password", "too short");

        assert_eq!(errors.fields().len(), 2);
        assert_eq!(errors.fields()["email"].len(), 2);
        assert_eq!(
            errors.to_string(),
            "email: must not be empty; email: must contain an @ symbol; password: too short"
        );
    }

    #[test]
    fn merge_prefixed_namespaces_fields() {
        let mut outer = ValidationErrors::new();
        outer.merge_prefixed("items[0]", ValidationErrors::single("quantity", "must be > 0"));
        assert!(outer.fields().contains_key("items[0].quantity"));
    }

    #[test]
    fn empty_errors_into_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(ValidationErrors::single("a", "b").into_result().is_err());
    }

    #[test]
    fn repository_conflict_becomes_domain_conflict() {
        let err: DomainError = RepositoryError::Conflict("email taken".into()).into();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err: DomainError = RepositoryError::Backend("down".into()).into();
        assert!(matches!(err, DomainError::Repository(_)));
    }
}
