//! Database-specific error types and conversions.

use tms_core::error::TmsError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored data: {0}")]
    Data(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl DbError {
    /// Classify an error returned by `Response::check`.
    ///
    /// Unique index violations become [`DbError::AlreadyExists`].
    pub fn from_check(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            DbError::AlreadyExists {
                entity: entity.to_string(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for TmsError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TmsError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => TmsError::AlreadyExists { entity },
            other => TmsError::Database(other.to_string()),
        }
    }
}

/// Parse a UUID stored as a string.
pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(value).map_err(|e| DbError::Data(format!("invalid {field} UUID: {e}")))
}
