//! Database-specific error types and conversions.

use onboard_core::error::OnboardError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {collection} with key {key}")]
    NotFound { collection: String, key: String },

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<DbError> for OnboardError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { collection, key } => OnboardError::NotFound {
                entity: collection,
                id: key,
            },
            other => OnboardError::Database(other.to_string()),
        }
    }
}
