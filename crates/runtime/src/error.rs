use entropic_protocol::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Toolchain missing: {0}")]
    ToolchainMissing(String),

    #[error("Compilation failed{}", exit_suffix(.exit_code))]
    CompileFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Runtime failure: {0}")]
    RuntimeFailure(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

impl RuntimeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::ToolchainMissing(_) => ErrorCode::ExternalToolMissing,
            RuntimeError::CompileFailure { .. } => ErrorCode::CompileFailure,
            RuntimeError::RuntimeFailure(_) => ErrorCode::RuntimeFailure,
            RuntimeError::IoError(_) => ErrorCode::IoError,
            RuntimeError::Other(_) => ErrorCode::Internal,
        }
    }
}
