use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] libsql::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
