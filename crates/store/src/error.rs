use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found")]
    NotFound,
    #[error("Query error: {0}")]
    QueryError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Store operation failed: {0}")]
    OperationFailed(String),
}
