/// Storage-specific errors
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored value could not be decoded
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Injected or backend-specific write failure
    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<StorageError> for cast_core::CastError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => cast_core::CastError::not_found(entity, id),
            other => cast_core::CastError::storage(other.to_string()),
        }
    }
}
