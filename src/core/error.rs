use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Document '{id}' not found in '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
