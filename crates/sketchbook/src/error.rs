use entropic_protocol::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SketchbookError>;

#[derive(Error, Debug)]
pub enum SketchbookError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("{0}")]
    Other(String),
}

impl SketchbookError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SketchbookError::NotFound(_) => ErrorCode::NotFound,
            SketchbookError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            SketchbookError::Conflict(_) => ErrorCode::Conflict,
            SketchbookError::InvalidName(_) => ErrorCode::InvalidName,
            SketchbookError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            SketchbookError::IoError(_) | SketchbookError::LockError(_) => ErrorCode::IoError,
            SketchbookError::SerializationError(_) | SketchbookError::Other(_) => {
                ErrorCode::Internal
            }
        }
    }
}
