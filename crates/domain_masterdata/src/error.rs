//! Master data domain errors
//!
//! Three domain error kinds cross the repository boundary: validation
//! failures, missing entities, and invariant conflicts. Each carries the
//! entity kind and the offending field or identifier so callers can
//! render a precise message. Storage failures propagate as a separate
//! kind and are never folded into the domain taxonomy.

use core_kernel::AhvNumberError;
use thiserror::Error;

/// Errors that can occur in the master data domain
#[derive(Debug, Error)]
pub enum MasterdataError {
    /// Malformed or missing required input
    #[error("{entity} validation failed on {field}: {message}")]
    Validation {
        entity: &'static str,
        field: &'static str,
        message: String,
    },

    /// Lookup found nothing
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Uniqueness or structural invariant violated
    #[error("{entity} conflict on {field}: '{value}'")]
    Conflict {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Failure in the underlying storage engine
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MasterdataError {
    /// Creates a Validation error
    pub fn validation(
        entity: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        MasterdataError::Validation {
            entity,
            field,
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        MasterdataError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(
        entity: &'static str,
        field: &'static str,
        value: impl std::fmt::Display,
    ) -> Self {
        MasterdataError::Conflict {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Creates a Storage error from any underlying error
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        MasterdataError::Storage {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Checks if this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, MasterdataError::Validation { .. })
    }

    /// Checks if this error indicates a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, MasterdataError::NotFound { .. })
    }

    /// Checks if this error is an invariant conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, MasterdataError::Conflict { .. })
    }
}

impl From<AhvNumberError> for MasterdataError {
    fn from(err: AhvNumberError) -> Self {
        MasterdataError::Validation {
            entity: "Person",
            field: "ahv_nr",
            message: err.to_string(),
        }
    }
}
