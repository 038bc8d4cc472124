//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL Error (sqlx::Error)      Rule violation (CoreError)        │
//! │       │                                   │ raised inside a transaction │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (apps/api) ← JSON failure envelope                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Frontend displays a toast                                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bookon_core::CoreError;
use thiserror::Error;

/// PostgreSQL SQLSTATE for unique violations.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for foreign key violations.
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL SQLSTATE for check constraint violations.
const PG_CHECK_VIOLATION: &str = "23514";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_optional` returned no row for an id the caller needs
    /// - A row is outside the caller's tenant
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Payment reference collision (retried by the TFC repository)
    /// - Second register for the same session
    /// - Second ledger row for one booking
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. a credit spent past its amount).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// A business rule rejected the change inside a transaction.
    ///
    /// The transaction is rolled back when this is returned.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the text carries driver or SQL detail that must stay in logs.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            DbError::Core(_) | DbError::NotFound { .. } | DbError::UniqueViolation { .. }
        )
    }

    /// Text that can be returned to a client.
    ///
    /// Rule, lookup and duplicate errors keep their message. Everything else
    /// collapses to a generic line.
    pub fn public_message(&self) -> String {
        match self {
            DbError::Core(_) | DbError::NotFound { .. } | DbError::UniqueViolation { .. } => {
                self.to_string()
            }
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                "Request violates a data constraint".to_string()
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                "Database unavailable".to_string()
            }
            DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                "Internal error".to_string()
            }
        }
    }

    /// True for a unique violation on the named constraint.
    pub fn is_unique_violation_on(&self, constraint: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == constraint)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound        → DbError::NotFound
/// sqlx::Error::Database 23505     → DbError::UniqueViolation (constraint name)
/// sqlx::Error::Database 23503     → DbError::ForeignKeyViolation
/// sqlx::Error::Database 23514     → DbError::CheckViolation
/// sqlx::Error::PoolTimedOut       → DbError::PoolExhausted
/// Other                           → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                let message = db_err.message().to_string();

                match db_err.code().as_deref() {
                    Some(PG_UNIQUE_VIOLATION) => DbError::UniqueViolation {
                        field: constraint,
                        value: "unknown".to_string(),
                    },
                    Some(PG_FOREIGN_KEY_VIOLATION) => DbError::ForeignKeyViolation { message },
                    Some(PG_CHECK_VIOLATION) => DbError::CheckViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<bookon_core::ValidationError> for DbError {
    fn from(err: bookon_core::ValidationError) -> Self {
        DbError::Core(err.into())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_pool_timeout_maps_to_exhausted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
    }

    #[test]
    fn test_core_error_passes_through() {
        let err: DbError = CoreError::invalid_amount("too small").into();
        assert_eq!(err.to_string(), "Invalid amount: too small");
    }

    #[test]
    fn test_public_message_hides_driver_detail() {
        let err = DbError::QueryFailed("relation \"tfc_bookings\" does not exist".into());
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "Internal error");

        let err = DbError::CheckViolation {
            message: "new row violates check constraint \"credits_remaining_check\"".into(),
        };
        assert_eq!(err.public_message(), "Request violates a data constraint");

        let err = DbError::not_found("TFC booking", "t-1");
        assert!(!err.is_internal());
        assert_eq!(err.public_message(), "TFC booking not found: t-1");
    }

    #[test]
    fn test_unique_violation_on() {
        let err = DbError::duplicate("tfc_bookings_payment_reference_key", "TFC-00000000");
        assert!(err.is_unique_violation_on("tfc_bookings_payment_reference_key"));
        assert!(!err.is_unique_violation_on("registers_activity_id_date_key"));
    }
}
