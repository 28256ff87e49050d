//! Database error types
//!
//! Maps SQLx and PostgreSQL failures onto the error taxonomy the domain
//! layer understands, so constraint violations surface as `Conflict`
//! and everything else as storage failures.

use domain_masterdata::MasterdataError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Pool exhaustion, no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Maps SQLx errors onto specific variants by PostgreSQL error code
///
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => {
                            DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                        }
                        "23514" => {
                            DatabaseError::ConstraintViolation(db_err.message().to_string())
                        }
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

/// The second layer of the uniqueness enforcement: a `23505` becomes
/// the same `Conflict` the service-level pre-check produces, tagged
/// with the entity and field whose constraint was violated.
pub(crate) fn map_save_error(
    error: sqlx::Error,
    entity: &'static str,
    field: &'static str,
) -> MasterdataError {
    let mapped = DatabaseError::from(error);
    match &mapped {
        DatabaseError::DuplicateEntry(message) => MasterdataError::conflict(entity, field, message),
        _ => MasterdataError::storage(mapped),
    }
}

/// Maps a read-path failure onto a storage error
pub(crate) fn map_query_error(error: sqlx::Error) -> MasterdataError {
    MasterdataError::storage(DatabaseError::from(error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let mapped = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(mapped.is_connection_error());
    }

    #[test]
    fn test_constraint_predicate() {
        assert!(DatabaseError::DuplicateEntry("x".to_string()).is_constraint_violation());
        assert!(!DatabaseError::QueryFailed("x".to_string()).is_constraint_violation());
    }
}
