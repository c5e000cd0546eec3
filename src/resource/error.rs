use crate::core::StoreError;
use thiserror::Error;

pub type ResourceResult<T> = Result<T, ResourceError>;

/// Failure of a resource operation. Each variant maps to exactly one HTTP
/// status; see `web`.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// 404. Also used when an add is declined by policy.
    #[error("resource not found")]
    NotFound,

    /// 400 with a human-readable message.
    #[error("{0}")]
    BadRequest(String),

    /// 401. A declined delete.
    #[error("not authorized to perform this operation")]
    Unauthorized,

    /// 409. The store detected a uniqueness or write conflict on insert.
    #[error("the resource conflicts with an existing resource")]
    Conflict,

    /// 500. Never shown to the caller verbatim.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl ResourceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}
