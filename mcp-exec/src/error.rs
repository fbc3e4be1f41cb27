//! Failures that stop a request before it can produce an
//! [`ExecutionOutcome`](crate::ExecutionOutcome) at all. A non-zero exit, a
//! timeout, or a memory-limit kill are not errors here: they are outcomes
//! with full stdout/stderr attached, classified by
//! [`crate::sandbox::ExecStatus`].

use mcp_core::error::AppError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("failed to spawn sandbox process: {0}")]
    SpawnFailed(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ExecError> for AppError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::UnsupportedLanguage(lang) => {
                AppError::invalid(format!("unsupported language: {lang}"))
            }
            ExecError::ValidationFailed(reason) => AppError::invalid(reason),
            ExecError::SpawnFailed(reason) => AppError::Internal(format!("spawn failed: {reason}")),
            ExecError::Internal(reason) => AppError::Internal(reason),
        }
    }
}
