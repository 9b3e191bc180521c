use graphdock_protocol::{ErrorPayload, codes};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    /// Referenced connection id has no stored parameters.
    #[error("no stored connection with id '{0}'")]
    NotFound(String),

    /// The downstream query or database operation itself failed.
    #[error("query failed: {0}")]
    Execution(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl HostError {
    /// Maps this error onto the wire taxonomy. The message survives intact so
    /// the surface can render it.
    pub fn to_payload(&self) -> ErrorPayload {
        let code = match self {
            HostError::NotFound(_) => codes::NOT_FOUND,
            HostError::Execution(_) => codes::EXECUTION_ERROR,
            HostError::Storage(_) | HostError::Io(_) | HostError::Serde(_) => codes::STORAGE_ERROR,
        };
        ErrorPayload::new(code, self.to_string())
    }
}
